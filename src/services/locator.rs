//! Discovery of the comments/contents file pair that make up one crawl batch.
//!
//! Crawler versions have written batches under three naming schemes:
//! - `<prefix>_comments.jsonl` / `<prefix>_contents.jsonl`
//! - `<crawler_type>_comments_<suffix>.jsonl` / `<crawler_type>_contents_<suffix>.jsonl`
//! - `comments.jsonl` / `contents.jsonl` inside a per-batch directory
//!
//! When no shared batch key exists the locator still pairs the most recent file of
//! each kind. That pairing may join unrelated batches; it is kept because callers
//! rely on getting a report for whatever was crawled last.

use log::{debug, warn};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

pub const COMMENTS_FILE: &str = "comments.jsonl";
pub const CONTENTS_FILE: &str = "contents.jsonl";
const COMMENTS_SUFFIX: &str = "_comments.jsonl";
const CONTENTS_SUFFIX: &str = "_contents.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Comments,
    Contents,
}

impl Kind {
    fn label(self) -> &'static str {
        match self {
            Kind::Comments => "comments",
            Kind::Contents => "contents",
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Kind::Comments => COMMENTS_SUFFIX,
            Kind::Contents => CONTENTS_SUFFIX,
        }
    }

    fn flat_name(self) -> &'static str {
        match self {
            Kind::Comments => COMMENTS_FILE,
            Kind::Contents => CONTENTS_FILE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum BatchKey {
    /// New scheme, shared filename prefix.
    Prefix(String),
    /// Legacy scheme, `<crawler_type>_<suffix>`.
    Legacy(String),
    /// Flat scheme, the directory holding both files.
    Dir(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pairing {
    /// Exact `comments.jsonl`/`contents.jsonl` in the target directory.
    Exact,
    /// Both files share a batch key.
    Matched(BatchKey),
    /// Independently most recent files; may belong to different batches.
    MostRecent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPair {
    pub comments: PathBuf,
    pub contents: PathBuf,
    pub pairing: Pairing,
}

#[derive(Debug, Clone)]
struct Candidate {
    path: PathBuf,
    key: BatchKey,
    modified: SystemTime,
}

pub fn locate_batch(dir: &Path, crawler_type: &str) -> Option<BatchPair> {
    let comments = dir.join(COMMENTS_FILE);
    let contents = dir.join(CONTENTS_FILE);
    if comments.is_file() && contents.is_file() {
        return Some(BatchPair {
            comments,
            contents,
            pairing: Pairing::Exact,
        });
    }
    find_latest_pair(dir, crawler_type)
}

/// Recursive search used when the exact file names are absent.
pub fn find_latest_pair(dir: &Path, crawler_type: &str) -> Option<BatchPair> {
    let classifier = Classifier::new(crawler_type);
    let mut comments = Vec::new();
    let mut contents = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("skipping unreadable entry under {}: {e}", dir.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if !file_name.to_lowercase().ends_with(".jsonl") {
            continue;
        }
        let modified = match entry.metadata().ok().and_then(|m| m.modified().ok()) {
            Some(t) => t,
            None => continue,
        };
        for kind in [Kind::Comments, Kind::Contents] {
            if let Some(key) = classifier.batch_key(entry.path(), &file_name, kind) {
                let candidate = Candidate {
                    path: entry.path().to_path_buf(),
                    key,
                    modified,
                };
                match kind {
                    Kind::Comments => comments.push(candidate),
                    Kind::Contents => contents.push(candidate),
                }
            }
        }
    }

    if comments.is_empty() || contents.is_empty() {
        debug!(
            "no batch under {}: {} comments / {} contents candidates",
            dir.display(),
            comments.len(),
            contents.len()
        );
        return None;
    }

    let comments_by_key = latest_by_key(&comments);
    let contents_by_key = latest_by_key(&contents);

    // BTreeMap order keeps ties on modification time deterministic.
    let mut best: Option<(&BatchKey, &Candidate, &Candidate, SystemTime)> = None;
    for (key, cm) in &comments_by_key {
        let Some(ct) = contents_by_key.get(key) else {
            continue;
        };
        let newest = cm.modified.max(ct.modified);
        if best.map_or(true, |b| newest > b.3) {
            best = Some((key, *cm, *ct, newest));
        }
    }

    if let Some((key, cm, ct, _)) = best {
        return Some(BatchPair {
            comments: cm.path.clone(),
            contents: ct.path.clone(),
            pairing: Pairing::Matched(key.clone()),
        });
    }

    let cm = most_recent(&comments)?;
    let ct = most_recent(&contents)?;
    warn!(
        "no shared batch key under {}; pairing most recent files {} and {}",
        dir.display(),
        cm.path.display(),
        ct.path.display()
    );
    Some(BatchPair {
        comments: cm.path.clone(),
        contents: ct.path.clone(),
        pairing: Pairing::MostRecent,
    })
}

/// Batch prefix encoded in a new-scheme file name, e.g. `kw_10-30_05-01` for
/// `kw_10-30_05-01_comments.jsonl`.
pub fn prefix_from_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    name.strip_suffix(COMMENTS_SUFFIX)
        .or_else(|| name.strip_suffix(CONTENTS_SUFFIX))
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

struct Classifier {
    crawler_type: String,
    legacy_comments: Option<Regex>,
    legacy_contents: Option<Regex>,
}

impl Classifier {
    fn new(crawler_type: &str) -> Self {
        let legacy = |kind: Kind| {
            let pattern = format!(
                r"^{}_{}_(.*)\.jsonl$",
                regex::escape(crawler_type),
                kind.label()
            );
            Regex::new(&pattern).ok()
        };
        Self {
            crawler_type: crawler_type.to_string(),
            legacy_comments: legacy(Kind::Comments),
            legacy_contents: legacy(Kind::Contents),
        }
    }

    fn batch_key(&self, path: &Path, file_name: &str, kind: Kind) -> Option<BatchKey> {
        if let Some(prefix) = file_name.strip_suffix(kind.suffix()) {
            return Some(BatchKey::Prefix(prefix.to_string()));
        }
        if file_name == kind.flat_name() {
            let parent = path.parent().unwrap_or_else(|| Path::new(""));
            return Some(BatchKey::Dir(parent.to_path_buf()));
        }
        let legacy = match kind {
            Kind::Comments => self.legacy_comments.as_ref(),
            Kind::Contents => self.legacy_contents.as_ref(),
        }?;
        let caps = legacy.captures(file_name)?;
        let suffix = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        Some(BatchKey::Legacy(format!("{}_{}", self.crawler_type, suffix)))
    }
}

/// One candidate per key; the most recently modified file wins a duplicate key.
fn latest_by_key(candidates: &[Candidate]) -> BTreeMap<BatchKey, &Candidate> {
    let mut map: BTreeMap<BatchKey, &Candidate> = BTreeMap::new();
    for c in candidates {
        match map.get(&c.key) {
            Some(existing) if existing.modified >= c.modified => {}
            _ => {
                map.insert(c.key.clone(), c);
            }
        }
    }
    map
}

fn most_recent(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates.iter().fold(None, |best: Option<&Candidate>, c| match best {
        Some(b) if b.modified >= c.modified => Some(b),
        _ => Some(c),
    })
}
