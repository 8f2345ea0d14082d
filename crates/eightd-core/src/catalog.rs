//! Section catalog and slicer.
//!
//! Each step code (except D1) is split into named sections, each owning a
//! fixed, ordered list of fields of the step's JSON document. The catalog
//! is built once and never mutated; callers receive it by reference so
//! tests can substitute their own.

use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::types::{SectionKey, StepCode, StepData};

/// Errors from catalog lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("No sections configured for step '{0}'")]
    NoSections(StepCode),

    #[error("Unknown section '{section}' for step '{step}'. Valid sections: {}", .available.join(", "))]
    UnknownSection {
        step: StepCode,
        section: String,
        available: Vec<String>,
    },
}

/// A named view over part of a step's data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionDef {
    pub key: SectionKey,
    /// Human-readable name used in prompts.
    pub label: String,
    pub fields: Vec<String>,
}

/// Immutable mapping from step code to its sections.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SectionCatalog {
    steps: BTreeMap<StepCode, Vec<SectionDef>>,
}

impl SectionCatalog {
    pub fn builder() -> SectionCatalogBuilder {
        SectionCatalogBuilder::default()
    }

    /// The production section layout.
    pub fn standard() -> Self {
        use StepCode::*;

        Self::builder()
            .section(D2, "five_w_2h", "Problem Description (5W2H)", &["problem_description", "five_w_2h"])
            .section(
                D2,
                "deviation",
                "Deviation vs Standard",
                &["standard_applicable", "expected_situation", "observed_situation", "evidence_documents"],
            )
            .section(D2, "is_is_not", "IS / IS NOT Analysis", &["is_is_not_factors"])
            .section(D3, "defected_parts", "Defected Part Status", &["defected_part_status"])
            .section(
                D3,
                "suspected_parts",
                "Suspected Parts and Alert",
                &["suspected_parts_status", "alert_communicated_to", "alert_number"],
            )
            .section(D3, "restart", "Restart Production", &["restart_production", "containment_responsible"])
            .section(
                D4,
                "four_m_occurrence",
                "Root Cause for Occurrence",
                &["four_m_occurrence", "five_whys_occurrence", "root_cause_occurrence"],
            )
            .section(
                D4,
                "four_m_non_detection",
                "Root Cause for Non-Detection",
                &["four_m_non_detection", "five_whys_non_detection", "root_cause_non_detection"],
            )
            .section(D5, "corrective_occurrence", "Corrective Actions for Occurrence", &["corrective_actions_occurrence"])
            .section(D5, "corrective_detection", "Corrective Actions for Detection", &["corrective_actions_detection"])
            .section(
                D6,
                "implementation",
                "Implementation of Corrective Actions",
                &["corrective_actions_occurrence", "corrective_actions_detection"],
            )
            .section(
                D6,
                "monitoring_checklist",
                "Monitoring and Implementation Checklist",
                &["monitoring", "checklist", "audited_by", "audit_date", "num_shifts"],
            )
            .section(
                D7,
                "prevention",
                "Recurrence Risks and Replication",
                &["recurrence_risks", "replication_validations"],
            )
            .section(
                D7,
                "knowledge",
                "Knowledge Base and Long-Term Monitoring",
                &["knowledge_base_updates", "long_term_monitoring"],
            )
            .section(D7, "lessons_learned", "Lessons Learned", &["lesson_disseminations", "ll_conclusion"])
            .section(D8, "closure", "Closure and Signatures", &["closure_statement", "signatures"])
            .build()
    }

    /// Sections of a step, in configured order. Empty for D1.
    pub fn sections(&self, step: StepCode) -> &[SectionDef] {
        self.steps.get(&step).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_sections(&self, step: StepCode) -> bool {
        !self.sections(step).is_empty()
    }

    /// All section keys of a step, in configured order.
    pub fn section_keys(&self, step: StepCode) -> Vec<SectionKey> {
        self.sections(step).iter().map(|s| s.key.clone()).collect()
    }

    /// Look up one section.
    pub fn section(&self, step: StepCode, key: &str) -> Result<&SectionDef, CatalogError> {
        let sections = self.sections(step);
        if sections.is_empty() {
            return Err(CatalogError::NoSections(step));
        }
        sections
            .iter()
            .find(|s| s.key.as_str() == key)
            .ok_or_else(|| CatalogError::UnknownSection {
                step,
                section: key.to_string(),
                available: sections.iter().map(|s| s.key.to_string()).collect(),
            })
    }

    /// Ordered field names of a section.
    pub fn get_section_fields(&self, step: StepCode, key: &str) -> Result<&[String], CatalogError> {
        self.section(step, key).map(|s| s.fields.as_slice())
    }

    /// Iterate every (step, section) pair.
    pub fn iter(&self) -> impl Iterator<Item = (StepCode, &SectionDef)> {
        self.steps
            .iter()
            .flat_map(|(step, sections)| sections.iter().map(move |s| (*step, s)))
    }
}

/// Builder for [`SectionCatalog`].
#[derive(Debug, Default)]
pub struct SectionCatalogBuilder {
    steps: BTreeMap<StepCode, Vec<SectionDef>>,
}

impl SectionCatalogBuilder {
    /// Add a section. A repeated key replaces the earlier definition in place.
    pub fn section(mut self, step: StepCode, key: &str, label: &str, fields: &[&str]) -> Self {
        let def = SectionDef {
            key: SectionKey::new(key),
            label: label.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        };
        let sections = self.steps.entry(step).or_default();
        match sections.iter_mut().find(|s| s.key == def.key) {
            Some(existing) => *existing = def,
            None => sections.push(def),
        }
        self
    }

    pub fn build(self) -> SectionCatalog {
        SectionCatalog { steps: self.steps }
    }
}

/// Extract exactly `fields` from a step document, in order.
///
/// Absent fields are present as `null` so the result always carries the
/// same key set for a given section.
pub fn slice(data: &StepData, fields: &[String]) -> StepData {
    fields
        .iter()
        .map(|field| {
            let value = data.get(field).cloned().unwrap_or(JsonValue::Null);
            (field.clone(), value)
        })
        .collect()
}
