use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PROMPT_MAX_CHARS: usize = 80_000;
pub const DEFAULT_LM_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_ANALYSIS_MAX_LINES: usize = 2000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root of the crawler output tree, `<data_root>/<platform>/{jsonl,reports}`.
    pub data_root: PathBuf,
    pub settings_path: PathBuf,
    pub prompt_max_chars: usize,
    pub lm_timeout: Duration,
    pub analysis_max_lines: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_root = PathBuf::from("data");
        Self {
            settings_path: data_root.join("system").join("settings.json"),
            data_root,
            prompt_max_chars: DEFAULT_PROMPT_MAX_CHARS,
            lm_timeout: Duration::from_secs(DEFAULT_LM_TIMEOUT_SECS),
            analysis_max_lines: DEFAULT_ANALYSIS_MAX_LINES,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_root = lookup("DATA_ROOT")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));
        let settings_path = lookup("SETTINGS_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| data_root.join("system").join("settings.json"));

        let prompt_max_chars = parse_var(&lookup, "PROMPT_MAX_CHARS", DEFAULT_PROMPT_MAX_CHARS)?;
        let lm_timeout_secs = parse_var(&lookup, "LM_TIMEOUT", DEFAULT_LM_TIMEOUT_SECS)?;
        let analysis_max_lines =
            parse_var(&lookup, "ANALYSIS_MAX_LINES", DEFAULT_ANALYSIS_MAX_LINES)?;

        let config = Self {
            data_root,
            settings_path,
            prompt_max_chars,
            lm_timeout: Duration::from_secs(lm_timeout_secs),
            analysis_max_lines,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prompt_max_chars == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PROMPT_MAX_CHARS".to_string(),
                "must be greater than 0".to_string(),
            ));
        }
        if self.lm_timeout.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "LM_TIMEOUT".to_string(),
                "must be greater than 0".to_string(),
            ));
        }
        if self.analysis_max_lines == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "ANALYSIS_MAX_LINES".to_string(),
                "must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn platform_dir(&self, platform: &str) -> PathBuf {
        self.data_root.join(platform)
    }

    pub fn prompt_file(&self) -> PathBuf {
        self.data_root.join("system").join("prompt.md")
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        _ => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.data_root, PathBuf::from("data"));
        assert_eq!(config.settings_path, PathBuf::from("data/system/settings.json"));
        assert_eq!(config.prompt_max_chars, 80_000);
        assert_eq!(config.lm_timeout, Duration::from_secs(60));
        assert_eq!(config.analysis_max_lines, 2000);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATA_ROOT", "/srv/crawl"),
            ("PROMPT_MAX_CHARS", " 12000 "),
            ("LM_TIMEOUT", "5"),
            ("ANALYSIS_MAX_LINES", "300"),
        ]))
        .unwrap();
        assert_eq!(config.settings_path, PathBuf::from("/srv/crawl/system/settings.json"));
        assert_eq!(config.platform_dir("xhs"), PathBuf::from("/srv/crawl/xhs"));
        assert_eq!(config.prompt_max_chars, 12_000);
        assert_eq!(config.lm_timeout, Duration::from_secs(5));
        assert_eq!(config.analysis_max_lines, 300);
    }

    #[test]
    fn test_malformed_values_fail() {
        assert!(AppConfig::from_lookup(lookup(&[("PROMPT_MAX_CHARS", "lots")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("LM_TIMEOUT", "-1")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("ANALYSIS_MAX_LINES", "0")])).is_err());
    }
}
