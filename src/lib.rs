//! psyframe: multi-framework psychology pattern detection for conversational
//! agents.
//!
//! Each turn runs up to five therapeutic frameworks (parts work,
//! cognitive-behavioral, archetypal, narrative, attachment) through a
//! two-stage pipeline: a cheap bilingual pattern scan, then a text-analysis
//! call for frameworks whose scan found evidence. Results are folded into a
//! cumulative per-conversation state that research views read back.
//!
//! ```no_run
//! # async fn run(llm: std::sync::Arc<dyn psyframe::LlmProvider>) -> Result<(), psyframe::Error> {
//! use std::sync::Arc;
//! use psyframe::{Engine, EngineConfig, InMemorySnapshotStore, conversation::from_user_texts};
//!
//! let engine = Engine::from_config(
//!     EngineConfig::from_env()?,
//!     llm,
//!     Arc::new(InMemorySnapshotStore::new()),
//! )
//! .await?;
//! let messages = from_user_texts(&["part of me wants to quit"]);
//! let analysis = engine.process_turn("conversation-1", &messages).await;
//! println!("{}", analysis.guidance());
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod frameworks;
pub mod llm;
pub mod manager;
pub mod observability;
pub mod orchestrator;
pub mod research;
pub mod state;

pub use analysis::{
    AnalysisClient, ConfidencePolicy, CrossFrameworkInsight, FrameworkAnalysisResult,
    MaxConfidencePolicy, MultiFrameworkAnalysis, PartsProjection,
};
pub use config::{AnalysisConfig, EngineConfig, FrameworkConfig, FrameworksFile};
pub use conversation::ConversationMessage;
pub use engine::Engine;
pub use error::{Error, Result};
pub use frameworks::{FrameworkDetector, FrameworkKind, TherapeuticElement};
pub use llm::{CompletionRequest, CompletionResponse, LlmProvider};
pub use manager::FrameworkManager;
pub use orchestrator::MultiFrameworkDetector;
pub use research::{DataCollector, ResearchExport, ResearchFilters};
pub use state::{ConversationState, InMemorySnapshotStore, SnapshotStore, StateManager};
