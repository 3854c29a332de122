use log::{debug, warn};
use serde_json::Value as JsonValue;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::models::JsonObject;

/// Read up to `limit` JSON objects from an NDJSON file.
///
/// Blank lines, unparsable lines and non-object values are skipped. A missing or
/// unreadable file yields whatever was read so far (usually nothing).
pub async fn read_jsonl(path: &Path, limit: usize) -> Vec<JsonObject> {
    let mut items = Vec::new();
    if limit == 0 {
        return items;
    }

    let file = match File::open(path).await {
        Ok(f) => f,
        Err(e) => {
            debug!("cannot open {}: {e}", path.display());
            return items;
        }
    };
    // Raw segments so a line with invalid UTF-8 is skipped instead of ending the read.
    let mut lines = BufReader::new(file).split(b'\n');
    let mut skipped = 0usize;

    loop {
        let raw = match lines.next_segment().await {
            Ok(Some(raw)) => raw,
            Ok(None) => break,
            Err(e) => {
                warn!("stopped reading {} after {} records: {e}", path.display(), items.len());
                break;
            }
        };
        let line = match std::str::from_utf8(&raw) {
            Ok(line) => line,
            Err(e) => {
                debug!("skipping non-utf8 line in {}: {e}", path.display());
                skipped += 1;
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JsonValue>(line) {
            Ok(JsonValue::Object(obj)) => {
                items.push(obj);
                if items.len() >= limit {
                    break;
                }
            }
            Ok(_) => skipped += 1,
            Err(e) => {
                debug!("skipping malformed line in {}: {e}", path.display());
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        debug!("{}: loaded {} records, skipped {}", path.display(), items.len(), skipped);
    }
    items
}
