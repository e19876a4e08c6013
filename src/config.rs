//! Configuration for psyframe.
//!
//! Engine-wide settings come from `PSYFRAME_*` environment variables (a `.env`
//! file is honored). Per-framework policy comes from an optional TOML file
//! named by `PSYFRAME_FRAMEWORKS_FILE`; see [`FrameworksFile`].

mod frameworks;

pub use frameworks::{FrameworkConfig, FrameworksFile};

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::frameworks::{FrameworkKind, LanguageHint};

/// Main configuration for the engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub analysis: AnalysisConfig,
    pub frameworks: FrameworksFile,
    /// Where `frameworks` was loaded from, used by reload.
    pub frameworks_file: Option<PathBuf>,
    /// Emit JSON log lines instead of human-readable ones.
    pub log_json: bool,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let frameworks_file = optional_env("PSYFRAME_FRAMEWORKS_FILE")?.map(PathBuf::from);
        let mut frameworks = match &frameworks_file {
            Some(path) => FrameworksFile::load_from_path(path)?,
            None => FrameworksFile::default(),
        };

        // A quick kill switch that does not require editing the policy file.
        if let Some(list) = optional_env("PSYFRAME_DISABLED_FRAMEWORKS")? {
            for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let framework: FrameworkKind = name.parse()?;
                let config = frameworks.config_for(framework)?.disabled();
                frameworks.set(framework, config);
            }
        }

        Ok(Self {
            analysis: AnalysisConfig::from_env()?,
            frameworks,
            frameworks_file,
            log_json: parse_bool_env("PSYFRAME_LOG_JSON", false)?,
        })
    }
}

/// Stage-2 and orchestration settings shared by all frameworks.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Budget for a single text-generation call.
    pub timeout: Duration,
    /// Base delay before the single retry.
    pub retry_backoff: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Default model hint; a framework's own hint wins.
    pub model_hint: Option<String>,
    /// Degraded confidence added per stage-1 hit.
    pub degraded_per_hit: f32,
    /// Upper bound on degraded confidence.
    pub degraded_ceiling: f32,
    /// Frameworks analyzed concurrently within one turn.
    pub max_concurrency: usize,
    pub language: LanguageHint,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retry_backoff: Duration::from_millis(250),
            max_tokens: 800,
            temperature: 0.2,
            model_hint: None,
            degraded_per_hit: 0.1,
            degraded_ceiling: 0.5,
            max_concurrency: 5,
            language: LanguageHint::Auto,
        }
    }
}

impl AnalysisConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            timeout: Duration::from_millis(parse_optional_env(
                "PSYFRAME_ANALYSIS_TIMEOUT_MS",
                defaults.timeout.as_millis() as u64,
            )?),
            retry_backoff: Duration::from_millis(parse_optional_env(
                "PSYFRAME_RETRY_BACKOFF_MS",
                defaults.retry_backoff.as_millis() as u64,
            )?),
            max_tokens: parse_optional_env("PSYFRAME_MAX_TOKENS", defaults.max_tokens)?,
            temperature: parse_optional_env("PSYFRAME_TEMPERATURE", defaults.temperature)?,
            model_hint: optional_env("PSYFRAME_MODEL_HINT")?,
            degraded_per_hit: parse_optional_env(
                "PSYFRAME_DEGRADED_PER_HIT",
                defaults.degraded_per_hit,
            )?,
            degraded_ceiling: parse_optional_env(
                "PSYFRAME_DEGRADED_CEILING",
                defaults.degraded_ceiling,
            )?,
            max_concurrency: parse_optional_env(
                "PSYFRAME_MAX_CONCURRENCY",
                defaults.max_concurrency,
            )?,
            language: parse_optional_env("PSYFRAME_LANGUAGE", defaults.language)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "PSYFRAME_ANALYSIS_TIMEOUT_MS".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        for (key, value) in [
            ("PSYFRAME_DEGRADED_PER_HIT", self.degraded_per_hit),
            ("PSYFRAME_DEGRADED_CEILING", self.degraded_ceiling),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("{value} is outside [0, 1]"),
                });
            }
        }
        if !(1..=FrameworkKind::ALL.len()).contains(&self.max_concurrency) {
            return Err(ConfigError::InvalidValue {
                key: "PSYFRAME_MAX_CONCURRENCY".to_string(),
                message: format!("must be between 1 and {}", FrameworkKind::ALL.len()),
            });
        }
        Ok(())
    }
}

pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.is_empty() => Ok(None),
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::ParseError(format!(
            "failed to read {key}: {e}"
        ))),
    }
}

pub(crate) fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)?
        .map(|s| {
            s.parse().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{e}"),
            })
        })
        .transpose()
        .map(|opt| opt.unwrap_or(default))
}

pub(crate) fn parse_bool_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    optional_env(key)?
        .map(|s| s.parse())
        .transpose()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be 'true' or 'false': {e}"),
        })
        .map(|opt| opt.unwrap_or(default))
}
