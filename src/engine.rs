//! One-call entry point for the chat collaborator.

use std::path::PathBuf;
use std::sync::Arc;

use crate::analysis::{
    AnalysisClient, ConfidencePolicy, MaxConfidencePolicy, MultiFrameworkAnalysis,
};
use crate::config::{EngineConfig, FrameworksFile};
use crate::conversation::ConversationMessage;
use crate::error::Error;
use crate::llm::LlmProvider;
use crate::manager::FrameworkManager;
use crate::orchestrator::MultiFrameworkDetector;
use crate::research::DataCollector;
use crate::state::{ConversationState, SnapshotStore, StateManager};

/// Wires the framework manager, the orchestrator and the state manager.
///
/// `process_turn` is safe to call concurrently. Turns for the same
/// conversation are merged one at a time in completion order.
pub struct Engine {
    manager: Arc<FrameworkManager>,
    detector: MultiFrameworkDetector,
    states: Arc<StateManager>,
    frameworks_file: Option<PathBuf>,
}

impl Engine {
    pub async fn from_config(
        config: EngineConfig,
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self, Error> {
        Self::with_policy(config, llm, store, Arc::new(MaxConfidencePolicy)).await
    }

    /// Same as [`Self::from_config`] with a non-default confidence policy.
    pub async fn with_policy(
        config: EngineConfig,
        llm: Arc<dyn LlmProvider>,
        store: Arc<dyn SnapshotStore>,
        policy: Arc<dyn ConfidencePolicy>,
    ) -> Result<Self, Error> {
        config.analysis.validate()?;
        let manager = Arc::new(FrameworkManager::with_builtin(&config.frameworks).await?);
        let client = Arc::new(AnalysisClient::new(llm, config.analysis).with_policy(policy));

        tracing::info!(
            frameworks = manager.get_enabled().await.len(),
            policy_file = ?config.frameworks_file,
            confidence_policy = client.policy().name(),
            "Engine ready"
        );

        Ok(Self {
            detector: MultiFrameworkDetector::new(manager.clone(), client),
            manager,
            states: Arc::new(StateManager::new(store)),
            frameworks_file: config.frameworks_file,
        })
    }

    /// Analyze the latest message of `messages` and fold it into state.
    ///
    /// Never fails: per-framework problems are reported inside the result.
    pub async fn process_turn(
        &self,
        conversation_id: &str,
        messages: &[ConversationMessage],
    ) -> MultiFrameworkAnalysis {
        let before = self.states.current(conversation_id).await;
        let analysis = self.detector.detect(conversation_id, messages, &before).await;
        self.states.apply(&analysis).await;
        analysis
    }

    /// Re-read the framework policy file this engine was configured from.
    ///
    /// Without a file, every framework returns to its default policy.
    pub async fn reload_config(&self) -> Result<(), Error> {
        match &self.frameworks_file {
            Some(path) => self.manager.reload_from_path(path).await,
            None => self.manager.reload(&FrameworksFile::default()).await,
        }
    }

    pub fn manager(&self) -> &Arc<FrameworkManager> {
        &self.manager
    }

    pub fn states(&self) -> &Arc<StateManager> {
        &self.states
    }

    pub async fn state(&self, conversation_id: &str) -> ConversationState {
        self.states.current(conversation_id).await
    }

    pub fn data_collector(&self) -> DataCollector {
        DataCollector::new(self.states.store().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::conversation::from_user_texts;
    use crate::error::LlmError;
    use crate::frameworks::FrameworkKind;
    use crate::llm::{CompletionRequest, CompletionResponse};
    use crate::state::InMemorySnapshotStore;

    struct Unreachable;

    #[async_trait]
    impl LlmProvider for Unreachable {
        fn model_name(&self) -> &str {
            "unreachable"
        }

        async fn complete(&self, _: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::RequestFailed {
                provider: "unreachable".to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    async fn engine(config: EngineConfig) -> Engine {
        let mut config = config;
        config.analysis.retry_backoff = std::time::Duration::ZERO;
        Engine::from_config(
            config,
            Arc::new(Unreachable),
            Arc::new(InMemorySnapshotStore::new()),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn degraded_turn_is_still_merged() {
        let engine = engine(EngineConfig::default()).await;
        let messages = from_user_texts(&["I always think the worst will happen"]);
        let analysis = engine.process_turn("c1", &messages).await;

        let cbt = &analysis.frameworks[&FrameworkKind::CognitiveBehavioral];
        assert!(cbt.analyzed);
        assert!(!cbt.llm_used);
        assert_eq!(cbt.error.as_deref(), Some("request_failed"));

        let state = engine.state("c1").await;
        assert_eq!(state.analysis_count, 1);
        assert!(!state.elements_for(FrameworkKind::CognitiveBehavioral).is_empty());
    }

    #[tokio::test]
    async fn reload_without_file_restores_defaults() {
        let engine = engine(EngineConfig::default()).await;
        engine.manager().disable(FrameworkKind::Narrative).await.unwrap();
        assert_eq!(engine.manager().get_enabled().await.len(), 4);

        engine.reload_config().await.unwrap();
        assert_eq!(engine.manager().get_enabled().await.len(), 5);
    }

    #[tokio::test]
    async fn invalid_analysis_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.analysis.max_concurrency = 0;
        let result = Engine::from_config(
            config,
            Arc::new(Unreachable),
            Arc::new(InMemorySnapshotStore::new()),
        )
        .await;
        assert!(result.is_err());
    }
}
