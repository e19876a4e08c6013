//! Text-generation capability consumed by stage-2 analysis.
//!
//! The engine never talks to a network service itself. Hosts plug in any
//! backend by implementing [`LlmProvider`]; provider choice, authentication
//! and billing stay outside this crate.

mod provider;

pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};
