use crate::models::{ContentIndex, ContentMeta, ContentRecord};

/// Index posts by `note_id`. The first record for an id wins; records without an id
/// are dropped.
pub fn build_content_index(contents: &[ContentRecord]) -> ContentIndex {
    let mut index = ContentIndex::new();
    for record in contents {
        if record.note_id.is_empty() || index.contains_key(&record.note_id) {
            continue;
        }
        index.insert(
            record.note_id.clone(),
            ContentMeta {
                note_url: record.note_url.clone(),
                title: record.title.clone(),
                nickname: record.nickname.clone(),
                time_iso: record.time_iso.clone(),
            },
        );
    }
    index
}
