//! The AI request client.
//!
//! POSTs a prompt plus patient context to the backend analysis endpoint.
//! Each attempt runs under its own timeout; a timed-out attempt is retried
//! with a fresh window until the retry budget is exhausted, which surfaces
//! as `Request timed out.`. Non-timeout failures are never retried here.
//!
//! This client does not inspect the *shape* of a successful reply; shape
//! validation (and its own retry loop) belongs to the orchestrator in
//! `insights-core`.

use insights_core::{AnalysisBackend, AnalysisError, AnalysisRequest, AnalysisResult};
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
/// Default retry budget on timeout (total attempts = retries + 1).
pub const DEFAULT_RETRIES: u32 = 2;

#[derive(Clone, Debug)]
pub struct AiRequestClient {
    http: reqwest::Client,
    backend_url: String,
    token: Option<String>,
    timeout: Duration,
    retries: u32,
}

impl AiRequestClient {
    pub fn new(backend_url: impl Into<String>, token: Option<String>) -> AnalysisResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AnalysisError::Backend(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            backend_url: backend_url.into(),
            token,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
        })
    }

    /// Override the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the timeout retry budget.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Send one analysis request, retrying timeouts.
    pub async fn send(&self, request: &AnalysisRequest) -> AnalysisResult<Value> {
        retry_on_timeout(self.retries, self.timeout, || self.send_once(request)).await
    }

    async fn send_once(&self, request: &AnalysisRequest) -> AnalysisResult<Value> {
        let body = json!({
            "prompt": request.prompt,
            "item": request.context,
            "patientId": request.patient_id,
            "model": request.model,
            "max_tokens": 1024,
            "temperature": 0.7,
            "top_p": 0.95,
        });

        let mut builder = self.http.post(&self.backend_url).json(&body);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AnalysisError::Backend(format!("Unexpected error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Backend(format!(
                "Server error: {status} - {text}"
            )));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::Backend(format!("Unexpected error: {e}")))?;

        // The backend either wraps its payload in `result` or returns it bare.
        Ok(data.get("result").cloned().unwrap_or(data))
    }
}

impl AnalysisBackend for AiRequestClient {
    async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult<Value> {
        self.send(request).await
    }
}

/// Run `op` under `timeout`, retrying only timed-out attempts.
///
/// `retries` is the number of retries after the first attempt; every attempt
/// gets a fresh timeout window. Exhausting the budget yields
/// [`AnalysisError::TimedOut`]; any other error stops immediately.
async fn retry_on_timeout<T, F, Fut>(
    retries: u32,
    timeout: Duration,
    mut op: F,
) -> AnalysisResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AnalysisResult<T>>,
{
    for attempt in 0..=retries {
        match tokio::time::timeout(timeout, op()).await {
            Ok(result) => return result,
            Err(_) => {
                if attempt < retries {
                    tracing::warn!(attempt = attempt + 1, "AI request timed out, retrying");
                }
            }
        }
    }
    Err(AnalysisError::TimedOut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn exhausted_timeouts_surface_as_timed_out() {
        let calls = AtomicU32::new(0);
        let err = retry_on_timeout(2, Duration::from_secs(15), || {
            calls.fetch_add(1, Ordering::Relaxed);
            std::future::pending::<AnalysisResult<()>>()
        })
        .await
        .expect_err("should time out");

        assert!(matches!(err, AnalysisError::TimedOut));
        assert_eq!(err.to_string(), "Request timed out.");
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_timeout_is_returned() {
        let calls = AtomicU32::new(0);
        let result = retry_on_timeout(2, Duration::from_secs(15), || {
            let attempt = calls.fetch_add(1, Ordering::Relaxed);
            async move {
                if attempt == 0 {
                    std::future::pending::<()>().await;
                }
                Ok(attempt)
            }
        })
        .await
        .expect("should succeed");

        assert_eq!(result, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_timeout_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let err = retry_on_timeout(2, Duration::from_secs(15), || {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Err::<(), _>(AnalysisError::Backend("Server error: 500 - boom".into())) }
        })
        .await
        .expect_err("should fail");

        assert!(matches!(err, AnalysisError::Backend(_)));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }
}
