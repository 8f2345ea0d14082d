//! Model-backed validation.
//!
//! [`ModelCoach`] runs the remote path end to end: fetch coaching text,
//! build the prompt, call the model, parse the verdict.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use eightd_core::{
    ComplaintContext, PromptBuilder, PromptError, PromptInput, ResponseParser, StepData,
    ValidationTarget, Verdict,
};

use crate::config::RuntimeConfig;
use crate::error::CoachError;
use crate::knowledge::{DirectoryKnowledgeBase, KnowledgeBase, StaticKnowledgeBase};
use crate::model::ModelClient;
use crate::providers::{LlmProvider, ProviderRegistry};

/// What a validator needs to grade one step or section.
#[derive(Debug, Clone, Copy)]
pub struct ValidationRequest<'a> {
    pub target: &'a ValidationTarget,
    /// Human-readable section name, when validating a section.
    pub section_label: Option<&'a str>,
    /// The sliced section data, or the whole step document.
    pub data: &'a StepData,
    pub complaint: &'a ComplaintContext,
}

/// Produces a verdict for a step or section.
#[async_trait]
pub trait StepValidator: Send + Sync {
    async fn validate(&self, request: ValidationRequest<'_>) -> Result<Verdict, CoachError>;
}

/// Readiness of the coaching backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoachHealth {
    pub coaching_documents: usize,
    pub floor_rules_loaded: bool,
    pub provider: String,
    pub provider_healthy: bool,
}

impl CoachHealth {
    pub fn is_healthy(&self) -> bool {
        self.coaching_documents > 0 && self.provider_healthy
    }
}

/// The model-backed [`StepValidator`].
pub struct ModelCoach {
    knowledge: Arc<dyn KnowledgeBase>,
    client: ModelClient,
    prompts: PromptBuilder,
    parser: ResponseParser,
}

impl std::fmt::Debug for ModelCoach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCoach")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl ModelCoach {
    pub fn new(knowledge: Arc<dyn KnowledgeBase>, client: ModelClient) -> Self {
        Self {
            knowledge,
            client,
            prompts: PromptBuilder::new(),
            parser: ResponseParser::new(),
        }
    }

    /// Build the provider and knowledge base described by `config`.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, CoachError> {
        Self::from_registry(&ProviderRegistry::with_defaults(), config)
    }

    /// Like [`from_config`](Self::from_config), choosing the provider from `registry`.
    pub fn from_registry(registry: &ProviderRegistry, config: &RuntimeConfig) -> Result<Self, CoachError> {
        let provider_type = config.model.provider.as_str();
        if !registry.has_provider(provider_type) {
            return Err(CoachError::InvalidInput(format!(
                "unknown model provider '{}', available: {}",
                provider_type,
                registry.available_types().join(", ")
            )));
        }

        let settings = config.model.provider_json();
        registry
            .validate(provider_type, &settings)
            .map_err(|e| CoachError::BackendUnavailable(e.to_string()))?;
        let provider: Arc<dyn LlmProvider> = registry
            .create(provider_type, &settings)
            .map_err(|e| CoachError::BackendUnavailable(e.to_string()))?;
        tracing::info!(provider = %provider.name(), "Model provider ready");

        let knowledge: Arc<dyn KnowledgeBase> = match &config.knowledge.directory {
            Some(directory) => Arc::new(DirectoryKnowledgeBase::new(directory)),
            None => {
                tracing::warn!("No knowledge directory configured, every model validation will fail");
                Arc::new(StaticKnowledgeBase::default())
            }
        };

        Ok(Self::new(
            knowledge,
            ModelClient::new(provider, config.model.completion()),
        ))
    }

    /// Render the prompt for a request without calling the model.
    pub async fn prompt(&self, request: ValidationRequest<'_>) -> Result<String, CoachError> {
        let target = request.target;

        let coaching = self
            .knowledge
            .coaching(target)
            .await?
            .ok_or_else(|| CoachError::KnowledgeGap(target.knowledge_hint()))?;
        tracing::info!(validation = %target, chars = coaching.len(), "Coaching loaded");

        let floor_rules = if PromptBuilder::includes_floor_rules(target) {
            let rules = self.knowledge.floor_rules().await?;
            if rules.is_none() {
                tracing::warn!(validation = %target, "Floor rules not found, prompt built without them");
            }
            rules
        } else {
            None
        };

        if request.complaint.is_empty() {
            tracing::warn!(validation = %target, "No complaint context for prompt");
        }

        let input = PromptInput {
            target,
            section_label: request.section_label,
            coaching: &coaching,
            floor_rules: floor_rules.as_deref(),
            complaint: request.complaint,
            data: request.data,
        };

        self.prompts.build(&input).map_err(|e| match e {
            PromptError::EmptyCoaching(hint) => CoachError::KnowledgeGap(hint),
        })
    }

    pub async fn health(&self) -> Result<CoachHealth, CoachError> {
        Ok(CoachHealth {
            coaching_documents: self.knowledge.coaching_documents().await?,
            floor_rules_loaded: self.knowledge.floor_rules().await?.is_some(),
            provider: self.client.provider_name().to_string(),
            provider_healthy: self.client.health_check().await,
        })
    }
}

#[async_trait]
impl StepValidator for ModelCoach {
    async fn validate(&self, request: ValidationRequest<'_>) -> Result<Verdict, CoachError> {
        let prompt = self.prompt(request).await?;
        let raw = self.client.complete(&prompt).await?;
        let verdict = self.parser.parse(&raw)?;

        tracing::info!(
            validation = %request.target,
            decision = %verdict.decision,
            issues = verdict.issues().len(),
            "Model verdict parsed"
        );
        Ok(verdict)
    }
}
