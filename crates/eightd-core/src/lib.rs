//! # eightd-core
//!
//! Deterministic engine for 8D step validation.
//!
//! This crate holds everything about validating an 8D step that does not
//! need a network or a clock-driven runtime:
//! - the section catalog and slicer
//! - the local D1 team rules
//! - the required-fields pre-check and the save-boundary schemas
//! - prompt building and response parsing for the model-backed path
//! - section aggregation and the storage trait
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: the D1 rules and the prompt builder are pure functions
//! 2. **No model calls**: talking to a model lives in `eightd-runtime`
//! 3. **One verdict shape**: local and model-backed validation return the same [`Verdict`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use eightd_core::{slice, SectionCatalog, StepCode, TeamValidator};
//!
//! let catalog = SectionCatalog::standard();
//! let fields = catalog.get_section_fields(StepCode::D2, "five_w_2h")?;
//! let section = slice(&step.data, fields);
//!
//! let verdict = TeamValidator::new().validate(&d1_step.data);
//! println!("{}: {}", verdict.decision, verdict.overall_assessment);
//! ```

pub mod aggregate;
pub mod catalog;
pub mod criteria;
pub mod parser;
pub mod prompt;
pub mod required;
pub mod schema;
pub mod store;
pub mod team;
pub mod types;
pub mod verdict;

// Re-export main types at crate root
pub use aggregate::{summarize, SectionProgress};
pub use catalog::{slice, CatalogError, SectionCatalog, SectionDef};
pub use parser::{ResponseError, ResponseParser};
pub use prompt::{PromptBuilder, PromptError, PromptInput};
pub use schema::SchemaError;
pub use store::{OpenedComplaint, SubmissionCommit, WorkflowStore};
pub use team::TeamValidator;
pub use types::{
    Complaint, ComplaintContext, ComplaintFilter, ComplaintId, ComplaintStatus, ComplaintUpdate,
    Decision, NewComplaint, Report, ReportId, SectionKey, Step, StepCode, StepData, StepId,
    StepStatus, ValidationTarget, DEFAULT_COMPLAINT_PAGE,
};
pub use verdict::{FieldImprovements, Verdict, VerdictRecord};
