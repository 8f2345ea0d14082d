//! Model client: one prompt in, raw text out.

use std::sync::Arc;

use crate::error::CoachError;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};

/// Fixed system instruction sent with every validation prompt.
pub const SYSTEM_INSTRUCTION: &str = "You are an expert 8D quality coach. Return ONLY valid JSON.";

/// Sends prompts to a provider with fixed generation parameters.
///
/// Every provider failure, including the outer timeout, comes back as
/// [`CoachError::BackendUnavailable`].
#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
}

impl std::fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClient")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish()
    }
}

impl ModelClient {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn health_check(&self) -> bool {
        self.provider.health_check().await
    }

    pub async fn complete(&self, prompt: &str) -> Result<String, CoachError> {
        let messages = vec![
            ChatMessage::system(SYSTEM_INSTRUCTION),
            ChatMessage::user(prompt),
        ];

        let call = self.provider.complete(messages, &self.config);
        let response = match tokio::time::timeout(self.config.timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(provider = self.provider.name(), error = %e, "Model call failed");
                return Err(unavailable(e));
            }
            Err(_) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    timeout = ?self.config.timeout,
                    "Model call timed out"
                );
                return Err(unavailable(ProviderError::Timeout(self.config.timeout)));
            }
        };

        tracing::info!(
            provider = self.provider.name(),
            model = %response.model,
            tokens = response.usage.total(),
            stop_reason = ?response.stop_reason,
            "Model responded"
        );
        Ok(response.content)
    }
}

fn unavailable(err: ProviderError) -> CoachError {
    CoachError::BackendUnavailable(err.to_string())
}
