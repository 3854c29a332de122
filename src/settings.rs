use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_API_BASE: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

const PLACEHOLDER_MARKERS: [&str; 2] = ["dummy", "test"];

/// Persisted user settings. Unknown sections (account, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub lm: LmSettings,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmSettings {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for LmSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields defaults; anything unreadable
    /// or malformed is an error.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("no settings file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(SettingsError::Io(path.to_path_buf(), e)),
        };
        let settings = Self::parse(path, &raw)?;
        settings.validate()?;
        Ok(settings)
    }

    fn parse(path: &Path, raw: &str) -> Result<Self, SettingsError> {
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        if is_toml {
            toml::from_str(raw)
                .map_err(|e| SettingsError::Malformed(path.to_path_buf(), e.to_string()))
        } else {
            serde_json::from_str(raw)
                .map_err(|e| SettingsError::Malformed(path.to_path_buf(), e.to_string()))
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(0.0..=2.0).contains(&self.lm.temperature) {
            return Err(SettingsError::Invalid(format!(
                "lm.temperature must be within 0.0..=2.0, got {}",
                self.lm.temperature
            )));
        }
        if !(1..=8192).contains(&self.lm.max_tokens) {
            return Err(SettingsError::Invalid(format!(
                "lm.max_tokens must be within 1..=8192, got {}",
                self.lm.max_tokens
            )));
        }
        Ok(())
    }

    /// The model credential, or `None` when it is absent or an obvious placeholder.
    pub fn usable_api_key(&self) -> Option<&str> {
        let key = self.lm.api_key.trim();
        if key.is_empty() {
            return None;
        }
        let lowered = key.to_lowercase();
        if PLACEHOLDER_MARKERS.iter().any(|m| lowered.contains(m)) {
            return None;
        }
        Some(key)
    }

    pub fn custom_prompt(&self) -> Option<&str> {
        Some(self.prompt.as_str()).filter(|p| !p.trim().is_empty())
    }
}

impl LmSettings {
    pub fn base_url(&self) -> &str {
        let base = self.api_base.trim();
        if base.is_empty() {
            DEFAULT_API_BASE
        } else {
            base
        }
    }

    pub fn model_name(&self) -> &str {
        let model = self.model.trim();
        if model.is_empty() {
            DEFAULT_MODEL
        } else {
            model
        }
    }
}

pub fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}****{tail}")
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Cannot read settings file {0}: {1}")]
    Io(PathBuf, #[source] io::Error),

    #[error("Malformed settings file {0}: {1}")]
    Malformed(PathBuf, String),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}
