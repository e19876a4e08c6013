//! Per-framework policy: enabled flag, trigger interval, threshold and window.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::frameworks::FrameworkKind;

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u32 {
    1
}

fn default_threshold() -> f32 {
    0.3
}

fn default_window() -> usize {
    6
}

/// Tunable policy for one framework.
///
/// Loaded at startup and on explicit reload; the engine never mutates it on
/// its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameworkConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Analyze every N messages (>= 1).
    #[serde(default = "default_interval")]
    pub analysis_interval: u32,
    /// Minimum confidence for a result to count this turn.
    #[serde(default = "default_threshold")]
    pub confidence_threshold: f32,
    /// Number of trailing messages scanned and quoted (>= 1).
    #[serde(default = "default_window")]
    pub window_size: usize,
    /// Model hint forwarded to the text-generation capability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_hint: Option<String>,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            analysis_interval: default_interval(),
            confidence_threshold: default_threshold(),
            window_size: default_window(),
            model_hint: None,
        }
    }
}

impl FrameworkConfig {
    pub fn with_interval(mut self, interval: u32) -> Self {
        self.analysis_interval = interval;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_window(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_model_hint(mut self, model_hint: impl Into<String>) -> Self {
        self.model_hint = Some(model_hint.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Reject values outside their documented ranges.
    pub fn validate(&self, framework: FrameworkKind) -> Result<(), ConfigError> {
        if self.analysis_interval == 0 {
            return Err(ConfigError::InvalidValue {
                key: format!("{framework}.analysis_interval"),
                message: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::InvalidValue {
                key: format!("{framework}.confidence_threshold"),
                message: format!("{} is outside [0, 1]", self.confidence_threshold),
            });
        }
        if self.window_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: format!("{framework}.window_size"),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// On-disk framework policy file.
///
/// ```toml
/// [frameworks.cognitive_behavioral]
/// analysis_interval = 2
/// confidence_threshold = 0.4
///
/// [frameworks.archetypal]
/// enabled = false
/// ```
///
/// Frameworks missing from the file keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameworksFile {
    #[serde(default)]
    pub frameworks: BTreeMap<String, FrameworkConfig>,
}

impl FrameworksFile {
    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: FrameworksFile =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        file.resolve()?;
        Ok(file)
    }

    /// Load and validate a policy file.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError(reason) => {
                ConfigError::ParseError(format!("{}: {reason}", path.display()))
            }
            other => other,
        })
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn set(&mut self, framework: FrameworkKind, config: FrameworkConfig) {
        self.frameworks.insert(framework.as_str().to_string(), config);
    }

    /// Typed view with every key checked and every entry validated.
    pub fn resolve(&self) -> Result<BTreeMap<FrameworkKind, FrameworkConfig>, ConfigError> {
        let mut resolved = BTreeMap::new();
        for (name, config) in &self.frameworks {
            let framework: FrameworkKind = name.parse()?;
            config.validate(framework)?;
            resolved.insert(framework, config.clone());
        }
        Ok(resolved)
    }

    /// Config for one framework, falling back to defaults.
    pub fn config_for(&self, framework: FrameworkKind) -> Result<FrameworkConfig, ConfigError> {
        Ok(self
            .resolve()?
            .remove(&framework)
            .unwrap_or_default())
    }
}
