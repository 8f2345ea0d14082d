//! Verdicts: the structured outcome of validating a step or a section.
//!
//! A [`Verdict`] has the same shape whether it comes from the local D1
//! rules or from the model-backed coach. A [`VerdictRecord`] is the form
//! it takes once stored against a step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::types::{Decision, SectionKey, StepId};

/// Suggested rewrites keyed by field name (or path, e.g. `team_members[2].role`).
pub type FieldImprovements = BTreeMap<String, JsonValue>;

/// Outcome of one validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub decision: Decision,
    #[serde(default)]
    pub missing_fields: Vec<String>,
    #[serde(default)]
    pub incomplete_fields: Vec<String>,
    #[serde(default)]
    pub quality_issues: Vec<String>,
    #[serde(default)]
    pub rules_violations: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub field_improvements: FieldImprovements,
    #[serde(default)]
    pub overall_assessment: String,
    #[serde(default)]
    pub language_detected: String,
}

impl Verdict {
    /// A verdict with the given decision and every other field empty.
    pub fn empty(decision: Decision) -> Self {
        Self {
            decision,
            missing_fields: Vec::new(),
            incomplete_fields: Vec::new(),
            quality_issues: Vec::new(),
            rules_violations: Vec::new(),
            suggestions: Vec::new(),
            field_improvements: FieldImprovements::new(),
            overall_assessment: String::new(),
            language_detected: String::new(),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.decision.is_pass()
    }

    /// Incomplete, quality and rule findings in storage order.
    pub fn issues(&self) -> Vec<String> {
        self.incomplete_fields
            .iter()
            .chain(&self.quality_issues)
            .chain(&self.rules_violations)
            .cloned()
            .collect()
    }
}

/// A verdict as persisted for a (step, section) pair.
///
/// `section == None` is the full-step row: either a direct full-step
/// validation or the summary synthesized once every section has passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub step_id: StepId,
    pub section: Option<SectionKey>,
    pub decision: Decision,
    pub missing: Vec<String>,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    /// JSON text of the field improvements map.
    pub professional_rewrite: String,
    pub notes: String,
    pub validated_at: DateTime<Utc>,
}

impl VerdictRecord {
    /// Build the stored form of a verdict, stamped now.
    pub fn from_verdict(step_id: StepId, section: Option<SectionKey>, verdict: &Verdict) -> Self {
        Self {
            step_id,
            section,
            decision: verdict.decision,
            missing: verdict.missing_fields.clone(),
            issues: verdict.issues(),
            suggestions: verdict.suggestions.clone(),
            professional_rewrite: improvements_to_text(&verdict.field_improvements),
            notes: verdict.overall_assessment.clone(),
            validated_at: Utc::now(),
        }
    }

    /// Decode the stored improvements blob. Unreadable text yields an empty map.
    pub fn field_improvements(&self) -> FieldImprovements {
        if self.professional_rewrite.trim().is_empty() {
            return FieldImprovements::new();
        }
        serde_json::from_str(&self.professional_rewrite).unwrap_or_default()
    }

    pub fn is_pass(&self) -> bool {
        self.decision.is_pass()
    }
}

fn improvements_to_text(improvements: &FieldImprovements) -> String {
    // A BTreeMap of JSON values always serializes.
    serde_json::to_string(improvements).unwrap_or_else(|_| "{}".to_string())
}
