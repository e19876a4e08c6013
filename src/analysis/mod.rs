//! Stage-2 analysis and the verdict types it produces.

mod client;
pub mod confidence;
mod result;

pub use client::AnalysisClient;
pub use confidence::{ConfidencePolicy, MaxConfidencePolicy, degraded_confidence};
pub use result::{
    CrossFrameworkInsight, FrameworkAnalysisResult, MultiFrameworkAnalysis, PartsProjection,
};
