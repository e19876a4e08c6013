//! Per-turn orchestration across frameworks.
//!
//! For each enabled framework: trigger check, stage-1 scan, and (when the
//! scan matched) stage-2 analysis. Triggered frameworks run concurrently on a
//! `JoinSet` bounded by a semaphore. Every failure, panics included, stops at
//! this boundary and becomes a well-typed result for that framework alone.

pub mod insights;
pub mod trigger;

pub use insights::{InsightRule, RULES, derive_insights};
pub use trigger::should_analyze;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::analysis::{AnalysisClient, FrameworkAnalysisResult, MultiFrameworkAnalysis};
use crate::conversation::{ConversationMessage, window};
use crate::frameworks::{FrameworkKind, TherapeuticElement, scan};
use crate::manager::{EnabledFramework, FrameworkManager};
use crate::state::ConversationState;

/// Runs every enabled framework for a turn and aggregates the verdicts.
pub struct MultiFrameworkDetector {
    manager: Arc<FrameworkManager>,
    client: Arc<AnalysisClient>,
}

impl MultiFrameworkDetector {
    pub fn new(manager: Arc<FrameworkManager>, client: Arc<AnalysisClient>) -> Self {
        Self { manager, client }
    }

    pub fn manager(&self) -> &Arc<FrameworkManager> {
        &self.manager
    }

    /// Analyze the latest turn of `messages`.
    ///
    /// `state` is the conversation's cumulative record before this turn; it
    /// decides first-time triggers and supplies pass-through elements. The
    /// returned analysis has exactly one result per framework enabled when
    /// the turn started.
    pub async fn detect(
        &self,
        conversation_id: &str,
        messages: &[ConversationMessage],
        state: &ConversationState,
    ) -> MultiFrameworkAnalysis {
        let message_count = messages.len();
        let message_id = messages.last().map(|m| m.id.clone()).unwrap_or_default();
        let enabled = self.manager.get_enabled().await;

        let mut results = BTreeMap::new();
        let mut pending = BTreeSet::new();
        let mut tasks = JoinSet::new();
        let permits = Arc::new(Semaphore::new(self.client.config().max_concurrency));

        for framework in &enabled {
            let kind = framework.kind();
            let carried = state.elements_for(kind);
            let triggered = should_analyze(
                message_count,
                framework.config.analysis_interval,
                state.last_analyzed_count(kind),
            );

            if !triggered {
                tracing::debug!(
                    conversation_id,
                    framework = %kind,
                    message_count,
                    "Framework not scheduled this turn"
                );
                results.insert(kind, FrameworkAnalysisResult::pass_through(kind, carried));
                continue;
            }

            pending.insert(kind);
            let span = tracing::debug_span!("framework", conversation_id, framework = %kind);
            tasks.spawn(
                run_framework(
                    framework.clone(),
                    window(messages, framework.config.window_size).to_vec(),
                    carried,
                    self.client.clone(),
                    permits.clone(),
                )
                .instrument(span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => {
                    pending.remove(&result.framework);
                    results.insert(result.framework, result);
                }
                Err(e) => {
                    // The framework is recovered from `pending` below.
                    tracing::warn!(conversation_id, error = %e, "Framework task failed");
                }
            }
        }
        for kind in pending {
            tracing::warn!(
                conversation_id,
                framework = %kind,
                "Framework analysis aborted, reporting failure"
            );
            results.insert(
                kind,
                FrameworkAnalysisResult::failed(kind, "framework analysis panicked"),
            );
        }

        self.aggregate(conversation_id, message_id, message_count, &enabled, results)
    }

    fn aggregate(
        &self,
        conversation_id: &str,
        message_id: String,
        message_count: usize,
        enabled: &[EnabledFramework],
        results: BTreeMap<FrameworkKind, FrameworkAnalysisResult>,
    ) -> MultiFrameworkAnalysis {
        let policy = self.client.policy();
        let above: Vec<FrameworkKind> = enabled
            .iter()
            .filter(|f| {
                results
                    .get(&f.kind())
                    .is_some_and(|r| r.exceeds_threshold(f.config.confidence_threshold))
            })
            .map(EnabledFramework::kind)
            .collect();
        let scores: Vec<f32> = above
            .iter()
            .filter_map(|kind| results.get(kind).map(|r| r.confidence_score))
            .collect();

        let mut analysis =
            MultiFrameworkAnalysis::new(conversation_id, message_id, message_count, results);
        analysis.total_confidence = policy.total_confidence(&scores);
        analysis.cross_framework_insights =
            derive_insights(conversation_id, &analysis.frameworks, &above, policy.as_ref());
        analysis.above_threshold = above;

        tracing::info!(
            conversation_id,
            message_count,
            frameworks = analysis.frameworks.len(),
            analyzed = analysis.analyzed_frameworks().count(),
            above_threshold = analysis.above_threshold.len(),
            insights = analysis.cross_framework_insights.len(),
            total_confidence = analysis.total_confidence,
            "Turn analyzed"
        );
        analysis
    }
}

/// Scan, then analyze when the scan matched.
async fn run_framework(
    framework: EnabledFramework,
    window: Vec<ConversationMessage>,
    carried: Vec<TherapeuticElement>,
    client: Arc<AnalysisClient>,
    permits: Arc<Semaphore>,
) -> FrameworkAnalysisResult {
    let kind = framework.kind();
    let Ok(_permit) = permits.acquire_owned().await else {
        return FrameworkAnalysisResult::failed(kind, "concurrency limiter closed");
    };

    let hits = scan(&window, framework.definition.library(), client.config().language);
    if !hits.matched {
        tracing::debug!(languages = ?hits.languages, "No pattern evidence");
        return if carried.is_empty() {
            FrameworkAnalysisResult::clean(kind)
        } else {
            FrameworkAnalysisResult::pass_through(kind, carried)
        };
    }

    tracing::debug!(hits = hits.hit_count(), "Pattern evidence found, running text analysis");
    let detector = framework.definition.detector();
    let prompt = detector.build_prompt(&window, &hits);
    client
        .analyze(
            detector.as_ref(),
            &prompt,
            &hits,
            framework.config.model_hint.as_deref(),
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tracing_test::traced_test;

    use crate::config::{AnalysisConfig, FrameworkConfig, FrameworksFile};
    use crate::conversation::from_user_texts;
    use crate::error::LlmError;
    use crate::frameworks::cognitive::CognitiveDetector;
    use crate::frameworks::{FrameworkDetector, PatternMatchResult, PatternSpec, Subtype};
    use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};

    /// Answers by framework metadata.
    struct ByFrameworkLlm {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmProvider for ByFrameworkLlm {
        fn model_name(&self) -> &str {
            "by-framework"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let answer = match request.metadata.get("framework").map(String::as_str) {
                Some("cognitive_behavioral") => {
                    "ELEMENT|catastrophizing|0.8|0.9|I always think the worst will happen"
                }
                Some("parts_work") => "ELEMENT|manager|0.6|0.7|part of me reacts very differently",
                _ => "NONE",
            };
            Ok(CompletionResponse::text(answer))
        }
    }

    /// Cognitive detector whose prompt builder panics.
    struct PanickingDetector;

    impl FrameworkDetector for PanickingDetector {
        fn kind(&self) -> FrameworkKind {
            FrameworkKind::CognitiveBehavioral
        }

        fn vocabulary(&self) -> &'static [Subtype] {
            CognitiveDetector.vocabulary()
        }

        fn get_patterns(&self) -> &'static [PatternSpec] {
            CognitiveDetector.get_patterns()
        }

        fn build_prompt(&self, _: &[ConversationMessage], _: &PatternMatchResult) -> String {
            panic!("prompt template exploded")
        }
    }

    async fn detector(llm: Arc<ByFrameworkLlm>) -> MultiFrameworkDetector {
        let manager = FrameworkManager::with_builtin(&FrameworksFile::default())
            .await
            .unwrap();
        let config = AnalysisConfig {
            timeout: Duration::from_millis(200),
            retry_backoff: Duration::ZERO,
            ..AnalysisConfig::default()
        };
        MultiFrameworkDetector::new(Arc::new(manager), Arc::new(AnalysisClient::new(llm, config)))
    }

    fn llm() -> Arc<ByFrameworkLlm> {
        Arc::new(ByFrameworkLlm {
            calls: AtomicUsize::new(0),
        })
    }

    fn scenario_messages() -> Vec<ConversationMessage> {
        from_user_texts(&[
            "I always think the worst will happen",
            "part of me reacts very differently to stress",
        ])
    }

    #[tokio::test]
    async fn one_result_per_enabled_framework() {
        let detector = detector(llm()).await;
        detector
            .manager()
            .disable(FrameworkKind::Narrative)
            .await
            .unwrap();
        let analysis = detector
            .detect("c1", &scenario_messages(), &ConversationState::default())
            .await;
        let kinds: Vec<_> = analysis.frameworks.keys().copied().collect();
        assert_eq!(
            kinds,
            vec![
                FrameworkKind::PartsWork,
                FrameworkKind::CognitiveBehavioral,
                FrameworkKind::Archetypal,
                FrameworkKind::Attachment,
            ]
        );
        assert_eq!(analysis.message_count, 2);
        assert_eq!(analysis.message_id, "m2");
    }

    #[tokio::test]
    async fn matched_frameworks_are_analyzed_and_aggregated() {
        let llm = llm();
        let detector = detector(llm.clone()).await;
        let analysis = detector
            .detect("c1", &scenario_messages(), &ConversationState::default())
            .await;

        let cbt = &analysis.frameworks[&FrameworkKind::CognitiveBehavioral];
        assert!(cbt.llm_used);
        assert_eq!(cbt.elements[0].kind, "catastrophizing");
        let parts = &analysis.frameworks[&FrameworkKind::PartsWork];
        assert_eq!(parts.elements[0].kind, "manager");

        // Only the two frameworks with pattern evidence reached the model.
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            analysis.above_threshold,
            vec![FrameworkKind::PartsWork, FrameworkKind::CognitiveBehavioral]
        );
        assert!((analysis.total_confidence - 0.9).abs() < 1e-6);
        assert_eq!(analysis.cross_framework_insights.len(), 1);
        assert!(analysis.legacy.analyzed);
        assert_eq!(analysis.legacy.parts.len(), 1);
    }

    #[tokio::test]
    async fn untriggered_framework_passes_state_through() {
        let detector = detector(llm()).await;
        detector
            .manager()
            .set_config(
                FrameworkKind::CognitiveBehavioral,
                FrameworkConfig::default().with_interval(3),
            )
            .await
            .unwrap();

        let mut state = ConversationState::new("c1");
        let first = detector
            .detect(
                "c1",
                &from_user_texts(&["hi", "hello", "I always think the worst will happen"]),
                &state,
            )
            .await;
        state = crate::state::merge(state, &first);
        assert!(first.frameworks[&FrameworkKind::CognitiveBehavioral].analyzed);

        let messages = from_user_texts(&["hi", "hello", "I always think the worst", "ok"]);
        let second = detector.detect("c1", &messages, &state).await;
        let cbt = &second.frameworks[&FrameworkKind::CognitiveBehavioral];
        assert!(!cbt.analyzed);
        assert_eq!(cbt.confidence_score, 0.0);
        assert_eq!(cbt.elements.len(), 1);
        assert!(!second.above_threshold.contains(&FrameworkKind::CognitiveBehavioral));
    }

    #[tokio::test]
    #[traced_test]
    async fn panicking_framework_is_isolated() {
        let detector = detector(llm()).await;
        detector
            .manager()
            .register_with_override(Arc::new(PanickingDetector), FrameworkConfig::default())
            .await
            .unwrap();

        let analysis = detector
            .detect("c1", &scenario_messages(), &ConversationState::default())
            .await;

        let cbt = &analysis.frameworks[&FrameworkKind::CognitiveBehavioral];
        assert!(!cbt.analyzed);
        assert!(cbt.error.is_some());
        let parts = &analysis.frameworks[&FrameworkKind::PartsWork];
        assert!(parts.llm_used);
        assert_eq!(parts.elements[0].kind, "manager");
        assert!(analysis.cross_framework_insights.is_empty());
        assert!(logs_contain("Framework analysis aborted"));
    }

    #[tokio::test]
    async fn clean_turn_reports_clean_verdicts() {
        let llm = llm();
        let detector = detector(llm.clone()).await;
        let analysis = detector
            .detect(
                "c1",
                &from_user_texts(&["what's the weather today"]),
                &ConversationState::default(),
            )
            .await;
        assert_eq!(analysis.frameworks.len(), 5);
        for result in analysis.frameworks.values() {
            assert!(result.analyzed, "{}", result.framework);
            assert!(result.elements.is_empty());
            assert_eq!(result.confidence_score, 0.0);
        }
        assert!(analysis.cross_framework_insights.is_empty());
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }
}
