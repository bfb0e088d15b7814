//! Runtime configuration: TOML file plus environment overrides.
//!
//! Every section is optional and falls back to defaults, so an empty file (or
//! no file at all) yields a working configuration. Unknown keys are rejected.
//!
//! ```toml
//! database_url = "series_cache.db"
//!
//! [upstream]
//! base_url = "https://api.opendata.esett.com"
//! page_span_days = 7
//! max_attempts = 4
//! base_delay_ms = 250
//! max_delay_ms = 5000
//! request_timeout_secs = 30
//! requests_per_second = 5
//!
//! [sync]
//! fetch_deadline_secs = 120
//! default_page_size = 1000
//! max_page_size = 10000
//! ```
//!
//! Environment overrides: `SERIES_CACHE_DATABASE_URL`, `ESETT_BASE_URL`.

use std::{path::Path, time::Duration};

use esett_ingestor::providers::esett_rest::{EsettSettings, RetryPolicy, provider::DEFAULT_BASE_URL};
use serde::Deserialize;
use shared_utils::env::env_override;
use thiserror::Error;

use crate::synchronizer::SyncSettings;

/// Environment variable overriding [`Config::database_url`].
pub const DATABASE_URL_ENV: &str = "SERIES_CACHE_DATABASE_URL";
/// Environment variable overriding [`UpstreamConfig::base_url`].
pub const BASE_URL_ENV: &str = "ESETT_BASE_URL";

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// I/O error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// SQLite path or `sqlite:` URL.
    pub database_url: String,
    /// Upstream client settings.
    pub upstream: UpstreamConfig,
    /// Synchronizer settings.
    pub sync: SyncConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "series_cache.db".to_string(),
            upstream: UpstreamConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

/// `[upstream]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct UpstreamConfig {
    /// API root, without a dataset path.
    pub base_url: String,
    /// Widest window per HTTP request, in days.
    pub page_span_days: u32,
    /// Attempts per page including the first.
    pub max_attempts: u32,
    /// First retry delay in milliseconds; doubles per attempt.
    pub base_delay_ms: u64,
    /// Retry delay ceiling in milliseconds.
    pub max_delay_ms: u64,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Client-side request rate limit.
    pub requests_per_second: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_span_days: 7,
            max_attempts: retry.max_attempts,
            base_delay_ms: retry.base_delay.as_millis() as u64,
            max_delay_ms: retry.max_delay.as_millis() as u64,
            request_timeout_secs: 30,
            requests_per_second: 5,
        }
    }
}

impl UpstreamConfig {
    /// Provider settings for this section.
    pub fn to_settings(&self) -> EsettSettings {
        EsettSettings {
            base_url: self.base_url.clone(),
            page_span: chrono::Duration::days(i64::from(self.page_span_days)),
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                base_delay: Duration::from_millis(self.base_delay_ms),
                max_delay: Duration::from_millis(self.max_delay_ms),
            },
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            requests_per_second: self.requests_per_second,
        }
    }
}

/// `[sync]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SyncConfig {
    /// Deadline for one gap fetch, in seconds.
    pub fetch_deadline_secs: u64,
    /// Page size when a query gives none.
    pub default_page_size: usize,
    /// Largest accepted page size.
    pub max_page_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let s = SyncSettings::default();
        Self {
            fetch_deadline_secs: s.fetch_deadline.as_secs(),
            default_page_size: s.default_page_size,
            max_page_size: s.max_page_size,
        }
    }
}

impl SyncConfig {
    /// Synchronizer settings for this section.
    pub fn to_settings(&self) -> SyncSettings {
        SyncSettings {
            fetch_deadline: Duration::from_secs(self.fetch_deadline_secs),
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
        }
    }
}

impl Config {
    /// Parse and validate a TOML document. Does not read the environment.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` (or defaults when `None`), then apply environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Replace values with non-blank environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = env_override(DATABASE_URL_ENV) {
            self.database_url = url;
        }
        if let Some(url) = env_override(BASE_URL_ENV) {
            self.upstream.base_url = url;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.page_span_days == 0 {
            return Err(ConfigError::Invalid("upstream.page_span_days must be > 0".into()));
        }
        if self.sync.max_page_size == 0 {
            return Err(ConfigError::Invalid("sync.max_page_size must be > 0".into()));
        }
        if self.sync.default_page_size == 0 || self.sync.default_page_size > self.sync.max_page_size {
            return Err(ConfigError::Invalid(format!(
                "sync.default_page_size must be between 1 and {}",
                self.sync.max_page_size
            )));
        }
        if self.sync.fetch_deadline_secs == 0 {
            return Err(ConfigError::Invalid("sync.fetch_deadline_secs must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            database_url = "/var/lib/cache.db"

            [sync]
            max_page_size = 500
            default_page_size = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.database_url, "/var/lib/cache.db");
        assert_eq!(config.sync.max_page_size, 500);
        assert_eq!(config.sync.fetch_deadline_secs, 120);
        assert_eq!(config.upstream, UpstreamConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml_str("[upstream]\napi_key = \"x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn default_page_size_must_fit_max() {
        let err = Config::from_toml_str("[sync]\ndefault_page_size = 20000\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn upstream_settings_conversion() {
        let settings = UpstreamConfig::default().to_settings();
        assert_eq!(settings.page_span, chrono::Duration::days(7));
        assert_eq!(settings.retry, RetryPolicy::default());
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
    }

    #[test]
    #[serial]
    fn env_overrides_win() {
        // SAFETY: serialized with every other env-touching test.
        unsafe {
            std::env::set_var(DATABASE_URL_ENV, "sqlite:/tmp/override.db");
            std::env::set_var(BASE_URL_ENV, "  ");
        }
        let config = Config::load(None).unwrap();
        unsafe {
            std::env::remove_var(DATABASE_URL_ENV);
            std::env::remove_var(BASE_URL_ENV);
        }
        assert_eq!(config.database_url, "sqlite:/tmp/override.db");
        assert_eq!(config.upstream.base_url, DEFAULT_BASE_URL);
    }
}
