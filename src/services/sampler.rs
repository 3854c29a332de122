//! Comment sampling shared by the offline and model-backed report paths.
//!
//! Every post first contributes its highest-ranked comments (by likes, then
//! timestamp), then any remaining room is filled from the global ranking.

use std::collections::{HashMap, HashSet};

use crate::models::{CommentRecord, SampledComment};
use crate::utils::normalize_count;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingLimits {
    pub total_limit: usize,
    pub per_post_limit: usize,
    pub content_max_len: usize,
}

impl SamplingLimits {
    pub fn new(total_limit: usize, per_post_limit: usize, content_max_len: usize) -> Self {
        Self {
            total_limit,
            per_post_limit,
            content_max_len,
        }
    }
}

pub fn sample_comments(records: &[CommentRecord], limits: SamplingLimits) -> Vec<SampledComment> {
    if limits.total_limit == 0 || records.is_empty() {
        return Vec::new();
    }

    let keys: Vec<(u64, &str)> = records
        .iter()
        .map(|r| (normalize_count(&r.like_count), r.created_at.as_str()))
        .collect();
    let rank_desc = |ids: &mut Vec<usize>| ids.sort_by(|&a, &b| keys[b].cmp(&keys[a]));

    // Groups in first-seen order; comments without a post share the "" group.
    let mut group_pos: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (i, record) in records.iter().enumerate() {
        let pos = *group_pos.entry(record.note_id.as_str()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[pos].push(i);
    }
    for group in groups.iter_mut() {
        rank_desc(group);
    }

    let mut picked: Vec<usize> = Vec::with_capacity(limits.total_limit);
    let mut is_picked = vec![false; records.len()];

    'groups: for group in &groups {
        for &i in group.iter().take(limits.per_post_limit) {
            if picked.len() >= limits.total_limit {
                break 'groups;
            }
            picked.push(i);
            is_picked[i] = true;
        }
    }

    if picked.len() < limits.total_limit {
        let mut rest: Vec<usize> = groups.iter().flatten().copied().collect();
        rank_desc(&mut rest);
        for i in rest {
            if picked.len() >= limits.total_limit {
                break;
            }
            if !is_picked[i] {
                picked.push(i);
                is_picked[i] = true;
            }
        }
    }

    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(picked.len());
    for i in picked {
        let record = &records[i];
        let cid = record.comment_id.as_str();
        if !cid.is_empty() && !seen_ids.insert(cid) {
            continue;
        }
        out.push(minify(record, keys[i].0, limits.content_max_len));
    }
    out
}

fn minify(record: &CommentRecord, like_count: u64, content_max_len: usize) -> SampledComment {
    SampledComment {
        comment_id: non_empty(&record.comment_id),
        note_id: non_empty(&record.note_id),
        content: record.text().chars().take(content_max_len).collect(),
        created_at_iso: record.created_at.clone(),
        like_count,
        source_url: record.source_url.clone(),
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
