//! LLM provider abstraction
//!
//! Provides a common interface for the completion provider and the
//! thread-level adapter the orchestrator talks to.

mod adapter;
mod anthropic;
mod error;
mod types;

pub use adapter::{CatalogModelClient, ModelReply};
pub use anthropic::{AnthropicModel, AnthropicService};
pub use error::LlmError;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Make a completion request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = std::time::Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    messages = request.messages.len(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    cache_read_tokens = response.usage.cache_read_tokens,
                    cache_creation_tokens = response.usage.cache_creation_tokens,
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    kind = e.kind.as_str(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    retry_after_ms = e.retry_after.map(|d| d.as_millis()),
                    "LLM request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Build the configured provider, wrapped for logging
pub fn build_service(
    api_key: Option<&str>,
    gateway: Option<&str>,
    model_id: &str,
) -> Result<Arc<dyn LlmService>, LlmError> {
    let model = AnthropicModel::from_model_id(model_id)
        .ok_or_else(|| LlmError::invalid_request(format!("Unknown model: {model_id}")))?;

    // Gateway mode authenticates upstream; the key is a placeholder there
    let key = match (api_key, gateway) {
        (Some(key), _) => key.to_string(),
        (None, Some(_)) => "implicit".to_string(),
        (None, None) => {
            return Err(LlmError::auth(
                "ANTHROPIC_API_KEY is not set and no LLM_GATEWAY is configured",
            ))
        }
    };

    let service = AnthropicService::new(key, model, gateway)?;
    Ok(Arc::new(LoggingService::new(Arc::new(service))))
}
