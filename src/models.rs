use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

pub type JsonObject = Map<String, JsonValue>;

/// note_id -> display metadata used to cite posts in a report.
pub type ContentIndex = BTreeMap<String, ContentMeta>;

/// One scraped comment. Field names vary between crawler versions, so records are
/// read from raw JSON objects rather than a fixed schema.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentRecord {
    pub comment_id: String,
    pub note_id: String,
    pub content: String,
    pub content_norm: String,
    pub created_at: String,
    pub like_count: JsonValue,
    pub source_url: String,
}

impl CommentRecord {
    pub fn from_object(obj: &JsonObject) -> Self {
        Self {
            comment_id: first_str(obj, &["comment_id", "id"]),
            note_id: first_str(obj, &["note_id", "noteId", "note_id_str"]),
            content: first_str(obj, &["content"]),
            content_norm: first_str(obj, &["content_norm"]),
            created_at: first_str(obj, &["created_at_iso", "created_at", "time_iso", "time"]),
            like_count: obj.get("like_count").cloned().unwrap_or(JsonValue::Null),
            source_url: first_str(obj, &["source_url", "note_url"]),
        }
    }

    /// Text handed to the model: the normalized form when the crawler produced one.
    pub fn text(&self) -> &str {
        if self.content_norm.is_empty() {
            &self.content
        } else {
            &self.content_norm
        }
    }
}

/// One scraped post.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRecord {
    pub note_id: String,
    pub note_url: String,
    pub title: String,
    pub nickname: String,
    pub time_iso: String,
}

impl ContentRecord {
    pub fn from_object(obj: &JsonObject) -> Self {
        Self {
            note_id: first_str(obj, &["note_id"]).trim().to_string(),
            note_url: first_str(obj, &["note_url"]),
            title: first_str(obj, &["title", "desc"]),
            nickname: first_str(obj, &["nickname"]),
            time_iso: first_str(obj, &["time_iso"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentMeta {
    pub note_url: String,
    pub title: String,
    pub nickname: String,
    pub time_iso: String,
}

/// Minimized comment projection that goes into a report sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampledComment {
    pub comment_id: Option<String>,
    pub note_id: Option<String>,
    pub content: String,
    pub created_at_iso: String,
    pub like_count: u64,
    pub source_url: String,
}

/// First non-empty value among `keys`, numbers rendered as strings.
fn first_str(obj: &JsonObject, keys: &[&str]) -> String {
    for key in keys {
        match obj.get(*key) {
            Some(JsonValue::String(s)) if !s.is_empty() => return s.clone(),
            Some(JsonValue::Number(n)) => return n.to_string(),
            _ => {}
        }
    }
    String::new()
}
