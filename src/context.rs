use chrono::{DateTime, Local};

/// Per-run request data threaded through locating, path derivation and prefixing.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub keyword: Option<String>,
    pub started_at: DateTime<Local>,
}

impl RunContext {
    pub fn new(keyword: Option<String>) -> Self {
        Self {
            keyword,
            started_at: Local::now(),
        }
    }

    pub fn with_start(keyword: Option<String>, started_at: DateTime<Local>) -> Self {
        Self { keyword, started_at }
    }

    /// Keyword reduced to characters that are safe in a directory or file name.
    pub fn safe_keyword(&self) -> Option<String> {
        self.keyword
            .as_deref()
            .map(sanitize_keyword)
            .filter(|s| !s.is_empty())
    }

    /// `<keyword or "generic">_<YYYYMMDDHHMM>`, used when the batch files carry no prefix.
    pub fn fallback_prefix(&self) -> String {
        prefix_for(self.safe_keyword().as_deref(), self)
    }

    pub fn timestamp_tag(&self) -> String {
        self.started_at.format("%Y%m%d%H%M").to_string()
    }
}

pub fn prefix_for(keyword: Option<&str>, ctx: &RunContext) -> String {
    let kw = keyword
        .map(sanitize_keyword)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "generic".to_string());
    format!("{}_{}", kw, ctx.timestamp_tag())
}

pub fn sanitize_keyword(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}
