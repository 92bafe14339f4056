//! Configuration loading, validation, and management for ctxpack.
//!
//! Loads configuration from `~/.ctxpack/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use ctxpack_core::config::ContextConfig;
use ctxpack_core::metrics::QualityThreshold;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.ctxpack/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Relevance, staleness and budget reservation rules
    #[serde(default)]
    pub context: ContextConfig,

    /// Orchestrator behaviour (timeouts, quality retry)
    #[serde(default)]
    pub engine: EngineConfig,

    /// Rendering options
    #[serde(default)]
    pub output: OutputConfig,

    /// Controls for the external experience log
    #[serde(default)]
    pub privacy: PrivacyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-collector deadline in milliseconds.
    #[serde(default = "default_collector_timeout_ms")]
    pub collector_timeout_ms: u64,

    /// Budget used when the caller does not give one.
    #[serde(default = "default_token_budget")]
    pub default_token_budget: usize,

    /// Re-run once with a wider scope when quality is low.
    #[serde(default = "default_true")]
    pub quality_retry: bool,

    #[serde(default = "default_min_quality_relevance")]
    pub min_quality_relevance: f64,

    #[serde(default = "default_min_quality_coverage")]
    pub min_quality_coverage: f64,
}

fn default_collector_timeout_ms() -> u64 {
    10_000
}
fn default_token_budget() -> usize {
    8000
}
fn default_min_quality_relevance() -> f64 {
    0.5
}
fn default_min_quality_coverage() -> f64 {
    1.0
}
fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            collector_timeout_ms: default_collector_timeout_ms(),
            default_token_budget: default_token_budget(),
            quality_retry: true,
            min_quality_relevance: default_min_quality_relevance(),
            min_quality_coverage: default_min_quality_coverage(),
        }
    }
}

impl EngineConfig {
    pub fn collector_timeout(&self) -> Duration {
        Duration::from_millis(self.collector_timeout_ms)
    }

    pub fn quality_threshold(&self) -> QualityThreshold {
        QualityThreshold {
            min_relevance: self.min_quality_relevance,
            min_coverage: self.min_quality_coverage,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Render template with `{task}` and `{sections}` placeholders.
    /// `None` uses the built-in layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// Settings for the experience log written by callers after a run.
/// The pipeline itself never reads these.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrivacyConfig {
    #[serde(default)]
    pub record_experience: bool,
}

impl AppConfig {
    /// Load configuration from the default path (~/.ctxpack/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `CTXPACK_TOKEN_BUDGET`
    /// - `CTXPACK_MIN_RELEVANCE`
    /// - `CTXPACK_COLLECTOR_TIMEOUT_MS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("CTXPACK_TOKEN_BUDGET") {
            self.engine.default_token_budget = parse_override("CTXPACK_TOKEN_BUDGET", &raw)?;
        }
        if let Some(raw) = lookup("CTXPACK_MIN_RELEVANCE") {
            self.context.min_relevance_threshold = parse_override("CTXPACK_MIN_RELEVANCE", &raw)?;
        }
        if let Some(raw) = lookup("CTXPACK_COLLECTOR_TIMEOUT_MS") {
            self.engine.collector_timeout_ms =
                parse_override("CTXPACK_COLLECTOR_TIMEOUT_MS", &raw)?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ctxpack")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.context
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.engine.collector_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "collector_timeout_ms must be > 0".into(),
            ));
        }

        if self.engine.default_token_budget == 0 {
            return Err(ConfigError::ValidationError(
                "default_token_budget must be > 0".into(),
            ));
        }

        for (name, value) in [
            ("min_quality_relevance", self.engine.min_quality_relevance),
            ("min_quality_coverage", self.engine.min_quality_coverage),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 0.0 and 1.0"
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::EnvError {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid value in {key}: {reason}")]
    EnvError { key: String, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.collector_timeout_ms, 10_000);
        assert!(config.engine.quality_retry);
        assert!(!config.privacy.record_experience);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = AppConfig::default();
        config.engine.collector_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_context_threshold_rejected() {
        let mut config = AppConfig::default();
        config.context.min_relevance_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert_eq!(result.unwrap(), AppConfig::default());
    }

    #[test]
    fn partial_file_is_merged_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[context]
min_relevance_threshold = 0.4
required_aspects = ["error", "task"]

[engine]
collector_timeout_ms = 500

[output]
template = "{sections}\n\nTask: {task}"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.context.min_relevance_threshold, 0.4);
        assert_eq!(config.context.required_aspects.len(), 2);
        assert_eq!(config.context.reserved_budget_ratio, 0.3);
        assert_eq!(config.engine.collector_timeout(), Duration::from_millis(500));
        assert_eq!(config.engine.default_token_budget, 8000);
        assert!(config.output.template.unwrap().contains("{sections}"));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[engine\ncollector_timeout_ms = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn overrides_apply_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CTXPACK_TOKEN_BUDGET", "1200"),
            ("CTXPACK_MIN_RELEVANCE", "0.45"),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.engine.default_token_budget, 1200);
        assert_eq!(config.context.min_relevance_threshold, 0.45);
        assert_eq!(config.engine.collector_timeout_ms, 10_000);
    }

    #[test]
    fn unparseable_override_is_reported() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(|k| (k == "CTXPACK_TOKEN_BUDGET").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("CTXPACK_TOKEN_BUDGET"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("collector_timeout_ms"));
        assert!(toml_str.contains("min_relevance_threshold"));
    }
}
