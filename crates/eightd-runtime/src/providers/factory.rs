//! Provider registry keyed by the `model.provider` config value.
//!
//! ```ignore
//! let registry = ProviderRegistry::with_defaults();
//! let provider = registry.create("openai", &json!({"api_key": key}))?;
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{LlmProvider, ProviderError};

/// Creates providers of one type from JSON configuration.
pub trait ProviderFactory: Send + Sync {
    /// Identifier matched against `model.provider`, e.g. `"openai"`.
    fn provider_type(&self) -> &'static str;

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError>;

    /// Check configuration without building a client.
    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError>;

    /// Settings used when the config leaves them out.
    fn default_config(&self) -> JsonValue {
        serde_json::json!({})
    }

    fn description(&self) -> &'static str {
        "LLM Provider"
    }
}

/// A registered provider type, as listed by `eightd providers`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderInfo {
    pub provider_type: String,
    pub description: String,
    pub default_config: JsonValue,
}

/// Registered provider factories by type name.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any factory of the same type.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories
            .insert(factory.provider_type().to_string(), factory);
    }

    pub fn create(
        &self,
        provider_type: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.factory(provider_type)?.create(config)
    }

    pub fn validate(&self, provider_type: &str, config: &JsonValue) -> Result<(), ProviderError> {
        self.factory(provider_type)?.validate_config(config)
    }

    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_provider(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    /// Every registered provider type with its description and defaults.
    pub fn describe(&self) -> Vec<ProviderInfo> {
        self.factories
            .values()
            .map(|f| ProviderInfo {
                provider_type: f.provider_type().to_string(),
                description: f.description().to_string(),
                default_config: f.default_config(),
            })
            .collect()
    }

    fn factory(&self, provider_type: &str) -> Result<&Arc<dyn ProviderFactory>, ProviderError> {
        self.factories.get(provider_type).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Unknown provider type: '{}'. Available: {:?}",
                provider_type,
                self.available_types()
            ))
        })
    }

    /// A registry with every built-in provider.
    #[cfg(feature = "openai")]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::OpenAiProviderFactory));
        registry
    }

    /// A registry with every built-in provider.
    #[cfg(not(feature = "openai"))]
    pub fn with_defaults() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, CompletionConfig, CompletionResponse, TokenUsage};
    use async_trait::async_trait;

    struct EchoProvider {
        name: String,
    }

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse {
                content: messages.last().map(|m| m.content.clone()).unwrap_or_default(),
                usage: TokenUsage::default(),
                model: "echo".to_string(),
                stop_reason: Some("stop".to_string()),
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    struct EchoFactory;

    impl ProviderFactory for EchoFactory {
        fn provider_type(&self) -> &'static str {
            "echo"
        }

        fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
            let name = config["name"].as_str().unwrap_or("echo").to_string();
            Ok(Arc::new(EchoProvider { name }))
        }

        fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
            if config["name"].as_str() == Some("") {
                return Err(ProviderError::NotConfigured("name cannot be empty".to_string()));
            }
            Ok(())
        }

        fn description(&self) -> &'static str {
            "Echoes the last message"
        }
    }

    #[test]
    fn test_register_and_create() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoFactory));

        assert!(registry.has_provider("echo"));
        let provider = registry
            .create("echo", &serde_json::json!({"name": "echo-1"}))
            .unwrap();
        assert_eq!(provider.name(), "echo-1");
        assert!(registry.validate("echo", &serde_json::json!({})).is_ok());
        assert!(matches!(
            registry.validate("echo", &serde_json::json!({"name": ""})),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_describe_lists_factories() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoFactory));

        let described = registry.describe();
        assert_eq!(described.len(), 1);
        assert_eq!(described[0].provider_type, "echo");
        assert_eq!(described[0].description, "Echoes the last message");
        assert_eq!(described[0].default_config, serde_json::json!({}));
    }

    #[test]
    fn test_unknown_provider() {
        let registry = ProviderRegistry::new();
        match registry.create("azure", &serde_json::json!({})) {
            Err(ProviderError::NotConfigured(msg)) => {
                assert!(msg.contains("Unknown provider type: 'azure'"))
            }
            _ => panic!("Expected NotConfigured error"),
        }
    }

    #[cfg(feature = "openai")]
    #[test]
    fn test_defaults_include_openai() {
        let registry = ProviderRegistry::with_defaults();
        assert_eq!(registry.available_types(), vec!["openai"]);
        assert!(registry.has_provider("openai"));

        let described = registry.describe();
        assert_eq!(described[0].description, "OpenAI chat completions with JSON mode");
        assert!(described[0].default_config["base_url"].is_string());
    }
}
