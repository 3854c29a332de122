use log::debug;
use std::path::Path;

use crate::settings::Settings;

/// Placeholder replaced by the serialized sample payload.
pub const PAYLOAD_MARKER: &str = "{{用户反馈文本}}";

pub const DEFAULT_PROMPT: &str = include_str!("default_prompt.md");

/// Prompt template to use: the one saved in settings, else a non-blank prompt file,
/// else the built-in default.
pub fn resolve_template(settings: &Settings, prompt_file: &Path) -> String {
    if let Some(custom) = settings.custom_prompt() {
        return custom.to_string();
    }
    match std::fs::read_to_string(prompt_file) {
        Ok(text) if !text.trim().is_empty() => return text,
        Ok(_) => debug!("prompt file {} is blank", prompt_file.display()),
        Err(e) => debug!("no prompt file at {}: {e}", prompt_file.display()),
    }
    DEFAULT_PROMPT.to_string()
}

pub fn render(template: &str, payload: &str) -> String {
    template.replace(PAYLOAD_MARKER, payload)
}
