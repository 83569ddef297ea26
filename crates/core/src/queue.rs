//! The analysis orchestrator.
//!
//! Builds the prompt, drives an [`AnalysisBackend`] through a bounded
//! validation retry loop, and normalises the raw reply into an
//! [`AnalysisOutcome`]. Validation retries here are distinct from the
//! transport-level timeout retry inside the AI request client: this loop
//! re-asks the same question when the model answers with something
//! unusable.

use crate::error::{AnalysisError, AnalysisResult};
use crate::normalize::{parse_structured, strip_code_fence, AnalysisOutcome};
use crate::prompt::build_prompt;
use serde_json::Value;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Q&A replies at or below this trimmed length (in characters, not bytes)
/// are treated as incomplete and retried.
pub const MIN_QNA_CHARS: usize = 50;

/// A request handed to the AI backend. The prompt never mutates between
/// retry attempts.
#[derive(Clone, Debug)]
pub struct AnalysisRequest {
    pub prompt: String,
    pub model: String,
    pub patient_id: Option<String>,
    /// Optional context resource forwarded alongside the prompt.
    pub context: Option<Value>,
}

/// Something that can answer an [`AnalysisRequest`], typically the HTTP AI
/// request client. Test code substitutes a scripted fake.
pub trait AnalysisBackend {
    fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> impl Future<Output = AnalysisResult<Value>> + Send;
}

/// Orchestrator tuning knobs.
#[derive(Clone, Debug)]
pub struct AnalysisSettings {
    pub model: String,
    /// Total validation attempts (not extra retries).
    pub max_attempts: NonZeroU32,
    /// Fixed delay between validation attempts.
    pub retry_delay: Duration,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            max_attempts: NonZeroU32::new(3).expect("non-zero"),
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Advisory cancellation flag.
///
/// Cancelling does not abort an in-flight backend call; it only suppresses
/// application of whatever reply eventually arrives. The only transport-level
/// abort is the per-request timeout inside the AI client.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Run a full analysis for a patient.
///
/// Mode selection: templated questions present means Q&A mode, otherwise
/// structured mode. Transport errors from the backend terminate immediately;
/// structurally invalid replies are retried up to
/// `settings.max_attempts` times with `settings.retry_delay` between
/// attempts, asking the identical prompt each time.
pub async fn run_analysis<B: AnalysisBackend>(
    backend: &B,
    settings: &AnalysisSettings,
    patient_id: Option<&str>,
    questions: &[String],
    cancel: &CancelFlag,
) -> AnalysisResult<AnalysisOutcome> {
    let request = AnalysisRequest {
        prompt: build_prompt(patient_id, questions),
        model: settings.model.clone(),
        patient_id: patient_id.map(str::to_string),
        context: None,
    };
    let structured_mode = questions.is_empty();
    let max_attempts = settings.max_attempts.get();

    for attempt in 1..=max_attempts {
        tracing::debug!(attempt, max_attempts, structured_mode, "requesting analysis");

        let reply = backend.analyze(&request).await?;

        if cancel.is_cancelled() {
            tracing::info!("analysis cancelled; discarding reply");
            return Err(AnalysisError::Cancelled);
        }

        let content = reply_text(&reply);
        let stripped = strip_code_fence(content);

        if structured_mode {
            if let Some(analysis) = parse_structured(stripped) {
                return Ok(AnalysisOutcome::Structured(analysis));
            }
            tracing::warn!(attempt, "model reply was not parseable JSON");
        } else if stripped.chars().count() > MIN_QNA_CHARS {
            return Ok(AnalysisOutcome::Narrative(stripped.to_string()));
        } else {
            tracing::warn!(
                attempt,
                length = stripped.chars().count(),
                "incomplete Q&A reply"
            );
        }

        if attempt < max_attempts {
            tokio::time::sleep(settings.retry_delay).await;
        }
    }

    if structured_mode {
        Err(AnalysisError::InvalidJson(settings.max_attempts))
    } else {
        Err(AnalysisError::IncompleteAnswer(settings.max_attempts))
    }
}

/// The textual payload of a backend reply: `result.content` when the backend
/// wraps its text, otherwise the raw string.
fn reply_text(reply: &Value) -> &str {
    reply
        .get("content")
        .and_then(Value::as_str)
        .or_else(|| reply.as_str())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Scripted backend: pops replies front-to-back, recording each prompt.
    struct ScriptedBackend {
        replies: Mutex<Vec<AnalysisResult<Value>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<AnalysisResult<Value>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl AnalysisBackend for ScriptedBackend {
        async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult<Value> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            self.replies.lock().unwrap().remove(0)
        }
    }

    fn valid_reply() -> Value {
        json!({ "content": "```json\n{ \"summaryText\": \"Stable.\" }\n```" })
    }

    fn settings() -> AnalysisSettings {
        AnalysisSettings {
            retry_delay: Duration::from_millis(1),
            ..AnalysisSettings::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn structured_success_on_first_attempt() {
        let backend = ScriptedBackend::new(vec![Ok(valid_reply())]);
        let outcome = run_analysis(&backend, &settings(), Some("p1"), &[], &CancelFlag::new())
            .await
            .expect("analysis");
        match outcome {
            AnalysisOutcome::Structured(analysis) => {
                assert_eq!(analysis.summary_text, "Stable.")
            }
            other => panic!("expected structured, got {other:?}"),
        }
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_json_exhausts_exactly_three_attempts() {
        let bad = || Ok(json!({ "content": "sorry, no JSON today" }));
        let backend = ScriptedBackend::new(vec![bad(), bad(), bad()]);
        let err = run_analysis(&backend, &settings(), Some("p1"), &[], &CancelFlag::new())
            .await
            .expect_err("should fail");
        assert_eq!(
            err.to_string(),
            "The AI returned invalid JSON after 3 attempts."
        );
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_does_not_mutate_between_attempts() {
        let backend = ScriptedBackend::new(vec![
            Ok(json!({ "content": "not json" })),
            Ok(valid_reply()),
        ]);
        run_analysis(&backend, &settings(), Some("p1"), &[], &CancelFlag::new())
            .await
            .expect("analysis");
        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], prompts[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn qna_short_reply_retries_then_accepts() {
        let questions = vec!["Does the patient smoke?".to_string()];
        let long_answer = "### Does the patient smoke?\nNo documentation of tobacco use was found in the available records.";
        let backend = ScriptedBackend::new(vec![
            Ok(json!({ "content": "too short" })),
            Ok(json!({ "content": long_answer })),
        ]);
        let outcome = run_analysis(
            &backend,
            &settings(),
            Some("p1"),
            &questions,
            &CancelFlag::new(),
        )
        .await
        .expect("analysis");
        assert_eq!(outcome, AnalysisOutcome::Narrative(long_answer.to_string()));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn qna_threshold_counts_characters_not_bytes() {
        // 30 characters but 60 bytes; still an incomplete answer.
        let questions = vec!["Does the patient smoke?".to_string()];
        let short_answer = "é".repeat(30);
        assert!(short_answer.len() > MIN_QNA_CHARS);
        assert!(short_answer.chars().count() <= MIN_QNA_CHARS);
        let long_answer = "### Does the patient smoke?\nNo documentation of tobacco use was found in the available records.";
        let backend = ScriptedBackend::new(vec![
            Ok(json!({ "content": short_answer })),
            Ok(json!({ "content": long_answer })),
        ]);
        let outcome = run_analysis(
            &backend,
            &settings(),
            Some("p1"),
            &questions,
            &CancelFlag::new(),
        )
        .await
        .expect("analysis");
        assert_eq!(outcome, AnalysisOutcome::Narrative(long_answer.to_string()));
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn qna_substantive_reply_accepted_first_time() {
        let questions = vec!["Any allergies?".to_string()];
        let answer = "### Any allergies?\nPenicillin allergy recorded in AllergyIntolerance/a1, noted during 2024 admission.";
        assert!(answer.len() > MIN_QNA_CHARS);
        let backend = ScriptedBackend::new(vec![Ok(json!({ "content": answer }))]);
        run_analysis(
            &backend,
            &settings(),
            None,
            &questions,
            &CancelFlag::new(),
        )
        .await
        .expect("analysis");
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_terminates_without_validation_retry() {
        let backend = ScriptedBackend::new(vec![Err(AnalysisError::TimedOut)]);
        let err = run_analysis(&backend, &settings(), Some("p1"), &[], &CancelFlag::new())
            .await
            .expect_err("should fail");
        assert!(matches!(err, AnalysisError::TimedOut));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_reply() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let backend = ScriptedBackend::new(vec![Ok(valid_reply())]);
        let err = run_analysis(&backend, &settings(), Some("p1"), &[], &cancel)
            .await
            .expect_err("should cancel");
        assert!(matches!(err, AnalysisError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn raw_string_reply_is_accepted() {
        let backend =
            ScriptedBackend::new(vec![Ok(json!("{ \"summaryText\": \"Plain string reply.\" }"))]);
        let outcome = run_analysis(&backend, &settings(), None, &[], &CancelFlag::new())
            .await
            .expect("analysis");
        match outcome {
            AnalysisOutcome::Structured(analysis) => {
                assert_eq!(analysis.summary_text, "Plain string reply.")
            }
            other => panic!("expected structured, got {other:?}"),
        }
    }
}
