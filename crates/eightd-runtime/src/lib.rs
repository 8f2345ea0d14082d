//! # eightd-runtime
//!
//! Model-backed coaching and the step orchestrator for eightd.
//!
//! `eightd-core` holds the deterministic pieces. This crate adds the parts
//! that need a network, a filesystem or an async runtime:
//! - LLM providers and the [`ModelClient`] wrapping them
//! - coaching retrieval through a [`KnowledgeBase`]
//! - the [`ModelCoach`], which turns a step or section into a verdict
//! - the [`StepOrchestrator`], which drives the step state machine over a
//!   [`WorkflowStore`](eightd_core::WorkflowStore)
//!
//! ## Example
//!
//! ```rust,ignore
//! use eightd_runtime::{MemoryStore, ModelCoach, RuntimeConfig, StepOrchestrator};
//!
//! let config = RuntimeConfig::load(Path::new("eightd.yaml"))?;
//! let coach = Arc::new(ModelCoach::from_config(&config)?);
//! let orchestrator = StepOrchestrator::new(MemoryStore::new(), coach);
//!
//! let opened = orchestrator.open_complaint(NewComplaint::new("Cracked housing")).await?;
//! let d2 = opened.steps[1].id;
//! orchestrator.save_progress(d2, payload).await?;
//! let outcome = orchestrator.submit_section(d2, "five_w_2h").await?;
//! ```

pub mod coach;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod memory;
pub mod model;
pub mod orchestrator;
pub mod providers;

pub use coach::{CoachHealth, ModelCoach, StepValidator, ValidationRequest};
pub use config::{ConfigError, KnowledgeSettings, ModelSettings, RuntimeConfig};
pub use error::{CoachError, Precondition};
pub use knowledge::{DirectoryKnowledgeBase, KnowledgeBase, StaticKnowledgeBase, FLOOR_RULES_HINT};
pub use memory::{MemoryError, MemoryStore};
pub use model::{ModelClient, SYSTEM_INSTRUCTION};
pub use orchestrator::{ReportProgress, SectionSubmission, StepOrchestrator, StepSubmission};
pub use providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, ProviderInfo,
    ProviderRegistry, TokenUsage,
};
