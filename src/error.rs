//! Error types for psyframe.

use std::time::Duration;

use crate::frameworks::FrameworkKind;

/// Top-level error type for the engine.
///
/// Only setup and configuration can fail. Per-turn analysis failures are
/// carried inside results as an [`AnalysisError`] category.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Framework error: {0}")]
    Framework(#[from] FrameworkError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Unknown framework in configuration: {0}")]
    UnknownFramework(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Registration and lookup errors raised by the framework manager.
#[derive(Debug, thiserror::Error)]
pub enum FrameworkError {
    #[error("Pattern compilation failed for {framework} ({pattern}): {reason}")]
    PatternCompilation {
        framework: FrameworkKind,
        pattern: String,
        reason: String,
    },

    #[error("Framework {0} is already registered")]
    Registration(FrameworkKind),

    #[error("Framework {0} is not registered")]
    NotRegistered(FrameworkKind),

    #[error("Framework {framework} is unavailable: {reason}")]
    Unavailable {
        framework: FrameworkKind,
        reason: String,
    },
}

/// Strict result-parsing errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("response contained no ELEMENT, INVALIDATE or NONE directive")]
    NoDirectives,

    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: unknown subtype '{subtype}' for {framework}")]
    UnknownSubtype {
        line: usize,
        framework: FrameworkKind,
        subtype: String,
    },

    #[error("line {line}: {field} '{value}' is not a number in [0, 1]")]
    InvalidScore {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: empty evidence")]
    EmptyEvidence { line: usize },

    #[error("NONE cannot be combined with ELEMENT directives")]
    ConflictingDirectives,

    #[error("response was cut off at the output token limit")]
    Truncated,
}

/// Stage-2 failure categories.
///
/// Every variant is recoverable through the pattern-only degrade path.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("text analysis timed out after {0:?}")]
    Timeout(Duration),

    #[error("text analysis rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("malformed analysis response: {0}")]
    MalformedResponse(#[from] ParseError),

    #[error("text analysis request failed: {0}")]
    RequestFailed(String),
}

impl AnalysisError {
    /// Short category label stored on degraded results.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::RateLimited { .. } => "rate_limited",
            Self::MalformedResponse(_) => "malformed_response",
            Self::RequestFailed(_) => "request_failed",
        }
    }

    /// Server-suggested wait before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<LlmError> for AnalysisError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::RateLimited { retry_after, .. } => Self::RateLimited { retry_after },
            LlmError::Timeout { after, .. } => Self::Timeout(after),
            other => Self::RequestFailed(other.to_string()),
        }
    }
}

/// Failure of a cross-framework combination rule.
#[derive(Debug, thiserror::Error)]
#[error("insight rule '{rule}' failed: {reason}")]
pub struct AggregationError {
    pub rule: &'static str,
    pub reason: String,
}

/// Errors reported by a text-generation provider.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Provider {provider} timed out after {after:?}")]
    Timeout { provider: String, after: Duration },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Snapshot store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Snapshot store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
