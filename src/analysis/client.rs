//! Stage-2 text analysis with timeout, one retry and pattern-only fallback.
//!
//! [`AnalysisClient::analyze`] never fails: after the retry is spent the
//! framework degrades to a verdict built from the stage-1 hits alone, with
//! `llm_used = false` and the failure category in `error`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::analysis::confidence::{ConfidencePolicy, MaxConfidencePolicy, degraded_confidence};
use crate::analysis::result::FrameworkAnalysisResult;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, ParseError};
use crate::frameworks::{
    FrameworkDetector, ParsedAnalysis, PatternMatchResult, TherapeuticElement, fallback_text,
};
use crate::llm::{ChatMessage, CompletionRequest, FinishReason, LlmProvider};

/// Floor for a non-zero retry delay.
const MIN_BACKOFF: Duration = Duration::from_millis(100);

/// Exponential backoff with 25% jitter.
///
/// `base * 2^attempt`, jittered uniformly in [-25%, +25%], never below
/// [`MIN_BACKOFF`] unless `base` is zero.
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let base_ms = base.as_millis() as u64;
    if base_ms == 0 {
        return Duration::ZERO;
    }
    let exp_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));

    let jitter_range = exp_ms / 4;
    let jitter = if jitter_range > 0 {
        let offset = rand::thread_rng().gen_range(0..=jitter_range.saturating_mul(2));
        offset as i64 - jitter_range as i64
    } else {
        0
    };
    let delay_ms = (exp_ms as i64 + jitter).max(MIN_BACKOFF.as_millis() as i64) as u64;
    Duration::from_millis(delay_ms)
}

/// Seam over the text-generation capability.
pub struct AnalysisClient {
    llm: Arc<dyn LlmProvider>,
    config: AnalysisConfig,
    policy: Arc<dyn ConfidencePolicy>,
}

impl AnalysisClient {
    pub fn new(llm: Arc<dyn LlmProvider>, config: AnalysisConfig) -> Self {
        Self {
            llm,
            config,
            policy: Arc::new(MaxConfidencePolicy),
        }
    }

    /// Replace the confidence policy.
    pub fn with_policy(mut self, policy: Arc<dyn ConfidencePolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn policy(&self) -> &Arc<dyn ConfidencePolicy> {
        &self.policy
    }

    /// Run stage 2 for one framework.
    ///
    /// `hits` is only used for the degraded verdict; the prompt already
    /// carries them.
    pub async fn analyze(
        &self,
        detector: &dyn FrameworkDetector,
        prompt: &str,
        hits: &PatternMatchResult,
        model_hint: Option<&str>,
    ) -> FrameworkAnalysisResult {
        let framework = detector.kind();
        let budget = self.config.timeout;

        let err = match self.attempt(detector, prompt, model_hint).await {
            Ok(parsed) => return self.verdict(detector, parsed),
            Err(err) => err,
        };

        // Rate-limit hints are honored but never beyond one call's budget.
        let delay = match err.retry_after() {
            Some(suggested) => {
                let capped = suggested.min(budget);
                if capped < suggested {
                    tracing::warn!(
                        framework = %framework,
                        suggested_ms = suggested.as_millis() as u64,
                        budget_ms = budget.as_millis() as u64,
                        "Rate-limit retry_after capped to analysis budget"
                    );
                }
                capped
            }
            None => backoff_delay(self.config.retry_backoff, 0),
        };

        tracing::warn!(
            framework = %framework,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying text analysis after failure"
        );
        tokio::time::sleep(delay).await;

        match self.attempt(detector, prompt, model_hint).await {
            Ok(parsed) => self.verdict(detector, parsed),
            Err(err) => {
                tracing::warn!(
                    framework = %framework,
                    category = err.category(),
                    error = %err,
                    "Text analysis failed twice, degrading to pattern-only result"
                );
                self.degraded(detector, hits, &err)
            }
        }
    }

    async fn attempt(
        &self,
        detector: &dyn FrameworkDetector,
        prompt: &str,
        model_hint: Option<&str>,
    ) -> Result<ParsedAnalysis, AnalysisError> {
        let budget = self.config.timeout;
        let request = CompletionRequest::new(vec![ChatMessage::user(prompt)])
            .with_model_hint(
                model_hint
                    .map(str::to_string)
                    .or_else(|| self.config.model_hint.clone()),
            )
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature)
            .with_timeout(budget)
            .with_metadata("framework", detector.kind().as_str());

        let started = Instant::now();
        let response = match tokio::time::timeout(budget, self.llm.complete(request)).await {
            Ok(result) => result?,
            Err(_) => return Err(AnalysisError::Timeout(budget)),
        };
        tracing::debug!(
            framework = %detector.kind(),
            model = self.llm.model_name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            output_tokens = response.output_tokens,
            "Text analysis response received"
        );

        // A cut-off answer can still parse, minus its last directives.
        if response.finish_reason == FinishReason::Length {
            return Err(ParseError::Truncated.into());
        }
        Ok(detector.parse_result(&response.content)?)
    }

    fn verdict(&self, detector: &dyn FrameworkDetector, parsed: ParsedAnalysis) -> FrameworkAnalysisResult {
        let confidence_score = self.policy.framework_confidence(&parsed.elements);
        FrameworkAnalysisResult {
            framework: detector.kind(),
            analyzed: true,
            llm_used: true,
            confidence_score,
            evidence_summary: FrameworkAnalysisResult::summarize(&parsed.elements),
            elements: parsed.elements,
            error: None,
            invalidated: parsed.invalidated,
        }
    }

    /// Pattern-only verdict: one element per matched subtype category.
    ///
    /// Generic cue categories raise confidence but never become elements.
    fn degraded(
        &self,
        detector: &dyn FrameworkDetector,
        hits: &PatternMatchResult,
        err: &AnalysisError,
    ) -> FrameworkAnalysisResult {
        let framework = detector.kind();
        let confidence = degraded_confidence(
            hits.hit_count(),
            self.config.degraded_per_hit,
            self.config.degraded_ceiling,
        );

        let elements: Vec<TherapeuticElement> = hits
            .categories()
            .filter_map(|category| {
                detector
                    .vocabulary()
                    .iter()
                    .find(|s| s.name == category)
            })
            .map(|subtype| {
                TherapeuticElement::new(
                    framework,
                    subtype.name,
                    fallback_text(framework, subtype.name),
                    confidence,
                    confidence,
                )
            })
            .collect();

        let evidence_summary = if elements.is_empty() {
            fallback_text(framework, "").to_string()
        } else {
            elements
                .iter()
                .map(|e| e.evidence.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        };

        FrameworkAnalysisResult {
            framework,
            analyzed: true,
            llm_used: false,
            confidence_score: confidence,
            elements,
            evidence_summary,
            error: Some(err.category().to_string()),
            invalidated: Vec::new(),
        }
    }
}
