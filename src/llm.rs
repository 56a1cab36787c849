//! Completion service abstraction
//!
//! The relay only ever needs one operation from a model: given the running
//! conversation, produce the next assistant message.

mod error;
mod gemini;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use gemini::{GeminiService, DEFAULT_MODEL};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// A text-generation backend
#[async_trait]
pub trait LlmService: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    fn model_id(&self) -> &str;
}

/// Decorator recording every completion call: request size, latency and
/// token usage on success, classification on failure
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let model = self.inner.model_id();
        tracing::debug!(
            model,
            system_parts = request.system.len(),
            messages = request.messages.len(),
            "Submitting conversation"
        );

        let started = Instant::now();
        let result = self.inner.complete(request).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &result {
            Ok(response) => tracing::info!(
                model,
                duration_ms,
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                "Completion succeeded"
            ),
            Err(e) => tracing::error!(
                model,
                duration_ms,
                kind = %e.kind,
                transient = e.kind.is_transient(),
                error = %e.message,
                "Completion failed"
            ),
        }

        result
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(Result<&'static str, LlmErrorKind>);

    #[async_trait]
    impl LlmService for Canned {
        async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
            match self.0 {
                Ok(text) => Ok(LlmResponse {
                    text: text.to_string(),
                    usage: Usage::default(),
                }),
                Err(kind) => Err(LlmError::new(kind, "canned failure")),
            }
        }

        fn model_id(&self) -> &str {
            "canned-model"
        }
    }

    #[tokio::test]
    async fn test_logging_service_is_transparent() {
        let ok = LoggingService::new(Arc::new(Canned(Ok("Revenue was $90B."))));
        assert_eq!(ok.model_id(), "canned-model");
        let response = ok.complete(&LlmRequest::default()).await.unwrap();
        assert_eq!(response.text, "Revenue was $90B.");

        let failing = LoggingService::new(Arc::new(Canned(Err(LlmErrorKind::RateLimit))));
        let err = failing.complete(&LlmRequest::default()).await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::RateLimit);
    }
}
