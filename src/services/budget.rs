//! Fits the serialized sample under the prompt character budget by shrinking the
//! sampling knobs, finest first: per-post limit, then total limit, then content length.

use log::{debug, info};
use serde::Serialize;

use crate::models::{CommentRecord, ContentIndex, SampledComment};
use crate::services::sampler::{sample_comments, SamplingLimits};

pub const PER_POST_FLOOR: usize = 2;
pub const TOTAL_FLOOR: usize = 60;
pub const CONTENT_LEN_FLOOR: usize = 180;
const TOTAL_STEP: usize = 30;
const CONTENT_LEN_STEP: usize = 20;

#[derive(Debug, Clone)]
pub struct BudgetedPayload {
    /// JSON handed to the prompt template.
    pub payload: String,
    pub sample: Vec<SampledComment>,
    pub limits: SamplingLimits,
    pub within_budget: bool,
}

#[derive(Serialize)]
struct PayloadBody<'a> {
    #[serde(rename = "comments.jsonl")]
    comments: &'a [SampledComment],
    #[serde(rename = "contents_index.json")]
    contents_index: &'a ContentIndex,
}

pub fn serialize_payload(
    sample: &[SampledComment],
    index: &ContentIndex,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&PayloadBody {
        comments: sample,
        contents_index: index,
    })
}

/// Next, smaller set of limits, or `None` once every knob sits at its floor.
pub fn shrink(limits: SamplingLimits) -> Option<SamplingLimits> {
    let mut next = limits;
    if limits.per_post_limit > PER_POST_FLOOR {
        next.per_post_limit -= 1;
    } else if limits.total_limit > TOTAL_FLOOR {
        next.total_limit = limits.total_limit.saturating_sub(TOTAL_STEP).max(TOTAL_FLOOR);
    } else if limits.content_max_len > CONTENT_LEN_FLOOR {
        next.content_max_len = limits
            .content_max_len
            .saturating_sub(CONTENT_LEN_STEP)
            .max(CONTENT_LEN_FLOOR);
    } else {
        return None;
    }
    Some(next)
}

/// Re-sample until the payload fits in `max_chars` characters. When every floor is
/// reached the last (oversized) payload is returned with `within_budget == false`.
pub fn fit_to_budget(
    records: &[CommentRecord],
    index: &ContentIndex,
    initial: SamplingLimits,
    max_chars: usize,
) -> Result<BudgetedPayload, serde_json::Error> {
    let mut limits = initial;
    loop {
        let sample = sample_comments(records, limits);
        let payload = serialize_payload(&sample, index)?;
        let len = payload.chars().count();
        if len <= max_chars {
            debug!("payload {len} chars fits budget {max_chars} with {limits:?}");
            return Ok(BudgetedPayload {
                payload,
                sample,
                limits,
                within_budget: true,
            });
        }
        match shrink(limits) {
            Some(next) => {
                debug!("payload {len} chars over budget {max_chars}, shrinking to {next:?}");
                limits = next;
            }
            None => {
                info!("payload {len} chars still over budget {max_chars} at floor limits, sending as is");
                return Ok(BudgetedPayload {
                    payload,
                    sample,
                    limits,
                    within_budget: false,
                });
            }
        }
    }
}
