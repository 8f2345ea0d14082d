//! Typed step payloads, checked at the save boundary.
//!
//! Step data is stored as a free-form JSON document, but every save is
//! first deserialized into the typed shape of its step so malformed
//! payloads are rejected before they reach storage.
//!
//! [`normalize`] returns the document to merge: legacy key spellings are
//! rewritten to their canonical names, unknown top-level keys are dropped,
//! and only keys present in the payload are returned so a partial save
//! never blanks fields it did not mention.

use chrono::{DateTime, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::types::{StepCode, StepData};

/// Errors from payload validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Invalid data format for {step}: payload must be a JSON object")]
    NotAnObject { step: StepCode },

    #[error("Invalid data format for {step}: {message}")]
    Invalid { step: StepCode, message: String },
}

/// A typed step payload with its accepted top-level keys.
pub trait StepSchema: DeserializeOwned {
    const FIELDS: &'static [&'static str];
}

/// Top-level keys accepted for a step, in schema order.
pub fn fields(step: StepCode) -> &'static [&'static str] {
    match step {
        StepCode::D1 => D1Data::FIELDS,
        StepCode::D2 => D2Data::FIELDS,
        StepCode::D3 => D3Data::FIELDS,
        StepCode::D4 => D4Data::FIELDS,
        StepCode::D5 => D5Data::FIELDS,
        StepCode::D6 => D6Data::FIELDS,
        StepCode::D7 => D7Data::FIELDS,
        StepCode::D8 => D8Data::FIELDS,
    }
}

/// Validate a save payload and return the canonical document to merge.
pub fn normalize(step: StepCode, payload: JsonValue) -> Result<StepData, SchemaError> {
    let JsonValue::Object(payload) = payload else {
        return Err(SchemaError::NotAnObject { step });
    };

    let payload = canonicalize(payload);

    match step {
        StepCode::D1 => check::<D1Data>(step, &payload)?,
        StepCode::D2 => check::<D2Data>(step, &payload)?,
        StepCode::D3 => check::<D3Data>(step, &payload)?,
        StepCode::D4 => check::<D4Data>(step, &payload)?,
        StepCode::D5 => check::<D5Data>(step, &payload)?,
        StepCode::D6 => check::<D6Data>(step, &payload)?,
        StepCode::D7 => check::<D7Data>(step, &payload)?,
        StepCode::D8 => check::<D8Data>(step, &payload)?,
    }

    let known = fields(step);
    Ok(payload
        .into_iter()
        .filter(|(key, _)| {
            let keep = known.contains(&key.as_str());
            if !keep {
                tracing::debug!(step = %step, field = %key, "Dropping unknown field from save payload");
            }
            keep
        })
        .collect())
}

fn check<T: StepSchema>(step: StepCode, payload: &StepData) -> Result<(), SchemaError> {
    serde_json::from_value::<T>(JsonValue::Object(payload.clone()))
        .map(|_| ())
        .map_err(|e| SchemaError::Invalid {
            step,
            message: e.to_string(),
        })
}

const TOP_LEVEL_ALIASES: &[(&str, &str)] = &[
    ("four_w_2h", "five_w_2h"),
    ("suspected_parts_locations", "suspected_parts_status"),
    ("alert_communication", "alert_communicated_to"),
];

const DEFECTED_PART_ALIASES: &[(&str, &str)] = &[
    ("is_returned", "returned"),
    ("is_isolated", "isolated"),
    ("isolation_location", "isolated_location"),
    ("is_identified", "identified"),
    ("identification_method", "identified_method"),
];

const ACTION_ALIASES: &[(&str, &str)] = &[("implementation_date", "imp_date")];

/// Rewrite legacy spellings to canonical keys, top level and nested.
fn canonicalize(payload: StepData) -> StepData {
    rename_keys(payload, TOP_LEVEL_ALIASES)
        .into_iter()
        .map(|(key, value)| {
            let value = match (key.as_str(), value) {
                ("defected_part_status", JsonValue::Object(inner)) => {
                    JsonValue::Object(rename_keys(inner, DEFECTED_PART_ALIASES))
                }
                (
                    "corrective_actions_occurrence" | "corrective_actions_detection",
                    JsonValue::Array(rows),
                ) => JsonValue::Array(
                    rows.into_iter()
                        .map(|row| match row {
                            JsonValue::Object(row) => {
                                JsonValue::Object(rename_keys(row, ACTION_ALIASES))
                            }
                            other => other,
                        })
                        .collect(),
                ),
                (_, value) => value,
            };
            (key, value)
        })
        .collect()
}

/// Rename aliased keys in place. When both spellings are present the
/// canonical one wins.
fn rename_keys(map: Map<String, JsonValue>, aliases: &[(&str, &str)]) -> Map<String, JsonValue> {
    let canonical_present: Vec<&str> = aliases
        .iter()
        .filter(|(_, canonical)| map.contains_key(*canonical))
        .map(|(_, canonical)| *canonical)
        .collect();

    map.into_iter()
        .filter_map(|(key, value)| {
            match aliases.iter().find(|(alias, _)| *alias == key) {
                Some((_, canonical)) if canonical_present.contains(canonical) => None,
                Some((_, canonical)) => Some((canonical.to_string(), value)),
                None => Some((key, value)),
            }
        })
        .collect()
}

/// Dates arrive as `YYYY-MM-DD`, full RFC 3339 timestamps, or blank.
mod lenient_date {
    use super::*;
    use serde::de::Error as _;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid date '{}', expected YYYY-MM-DD", raw)))
    }
}

/// Free text that users sometimes type as a number (`"how_many": 12`).
mod lenient_text {
    use super::*;
    use serde::de::Error as _;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<JsonValue>::deserialize(deserializer)? {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::String(s)) => Ok(Some(s)),
            Some(JsonValue::Number(n)) => Ok(Some(n.to_string())),
            Some(JsonValue::Bool(b)) => Ok(Some(b.to_string())),
            Some(other) => Err(D::Error::custom(format!(
                "expected text, found {}",
                kind_of(&other)
            ))),
        }
    }

    fn kind_of(value: &JsonValue) -> &'static str {
        match value {
            JsonValue::Array(_) => "a list",
            JsonValue::Object(_) => "an object",
            _ => "a scalar",
        }
    }
}

// D1 - Establish the Team

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub name: String,
    pub function: String,
    pub department: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct D1Data {
    pub team_members: Option<Vec<TeamMember>>,
}

impl StepSchema for D1Data {
    const FIELDS: &'static [&'static str] = &["team_members"];
}

// D2 - Describe the Problem

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiveW2H {
    pub what: Option<String>,
    #[serde(rename = "where")]
    pub where_: Option<String>,
    #[serde(default, deserialize_with = "lenient_text::deserialize")]
    pub when: Option<String>,
    pub who: Option<String>,
    pub why: Option<String>,
    pub how: Option<String>,
    #[serde(default, deserialize_with = "lenient_text::deserialize")]
    pub how_many: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsIsNotFactor {
    pub factor: String,
    pub is_problem: Option<String>,
    pub is_not_problem: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct D2Data {
    pub problem_description: Option<String>,
    pub five_w_2h: Option<FiveW2H>,
    pub standard_applicable: Option<String>,
    pub expected_situation: Option<String>,
    pub observed_situation: Option<String>,
    pub evidence_documents: Option<String>,
    pub is_is_not_factors: Option<Vec<IsIsNotFactor>>,
    pub estimated_cost: Option<f64>,
    pub cost_currency: Option<String>,
    pub customer_impact: Option<String>,
    pub additional_notes: Option<String>,
}

impl StepSchema for D2Data {
    const FIELDS: &'static [&'static str] = &[
        "problem_description",
        "five_w_2h",
        "standard_applicable",
        "expected_situation",
        "observed_situation",
        "evidence_documents",
        "is_is_not_factors",
        "estimated_cost",
        "cost_currency",
        "customer_impact",
        "additional_notes",
    ];
}

// D3 - Develop Interim Containment Action

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefectedPartStatus {
    pub returned: Option<bool>,
    pub isolated: Option<bool>,
    pub isolated_location: Option<String>,
    pub identified: Option<bool>,
    pub identified_method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspectedPartsLocation {
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_text::deserialize")]
    pub inventory: Option<String>,
    pub actions: Option<String>,
    pub leader: Option<String>,
    pub results: Option<String>,
}

/// Who was alerted: checkbox flags, a list of recipients, or free text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlertRecipients {
    Flags(AlertFlags),
    List(Vec<String>),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertFlags {
    pub production_shift_leaders: Option<bool>,
    pub quality_control: Option<bool>,
    pub warehouse: Option<bool>,
    pub maintenance: Option<bool>,
    pub customer_contact: Option<bool>,
    pub production_planner: Option<bool>,
    pub alert_reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartProduction {
    #[serde(default, deserialize_with = "lenient_text::deserialize")]
    pub when: Option<String>,
    pub first_certified_lot: Option<String>,
    pub approved_by: Option<String>,
    pub method: Option<String>,
    pub identification_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct D3Data {
    pub defected_part_status: Option<DefectedPartStatus>,
    pub suspected_parts_status: Option<Vec<SuspectedPartsLocation>>,
    pub alert_communicated_to: Option<AlertRecipients>,
    #[serde(default, deserialize_with = "lenient_text::deserialize")]
    pub alert_number: Option<String>,
    pub restart_production: Option<RestartProduction>,
    pub containment_responsible: Option<String>,
}

impl StepSchema for D3Data {
    const FIELDS: &'static [&'static str] = &[
        "defected_part_status",
        "suspected_parts_status",
        "alert_communicated_to",
        "alert_number",
        "restart_production",
        "containment_responsible",
    ];
}

// D4 - Determine Root Cause

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FourMEnvironment {
    pub material: Option<Vec<String>>,
    pub method: Option<Vec<String>>,
    pub machine: Option<Vec<String>>,
    pub manpower: Option<Vec<String>>,
    pub environment: Option<Vec<String>>,
    pub selected_problem: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiveWhyItem {
    pub question: Option<String>,
    pub answer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiveWhys {
    pub why_1: Option<FiveWhyItem>,
    pub why_2: Option<FiveWhyItem>,
    pub why_3: Option<FiveWhyItem>,
    pub why_4: Option<FiveWhyItem>,
    pub why_5: Option<FiveWhyItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootCauseConclusion {
    pub root_cause: Option<String>,
    pub validation_method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct D4Data {
    pub four_m_occurrence: Option<FourMEnvironment>,
    pub five_whys_occurrence: Option<FiveWhys>,
    pub root_cause_occurrence: Option<RootCauseConclusion>,
    pub four_m_non_detection: Option<FourMEnvironment>,
    pub five_whys_non_detection: Option<FiveWhys>,
    pub root_cause_non_detection: Option<RootCauseConclusion>,
}

impl StepSchema for D4Data {
    const FIELDS: &'static [&'static str] = &[
        "four_m_occurrence",
        "five_whys_occurrence",
        "root_cause_occurrence",
        "four_m_non_detection",
        "five_whys_non_detection",
        "root_cause_non_detection",
    ];
}

// D5 - Choose and Verify Permanent Corrective Actions

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectiveAction {
    pub action: Option<String>,
    pub responsible: Option<String>,
    #[serde(default, deserialize_with = "lenient_date::deserialize")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date::deserialize")]
    pub imp_date: Option<NaiveDate>,
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct D5Data {
    pub corrective_actions_occurrence: Option<Vec<CorrectiveAction>>,
    pub corrective_actions_detection: Option<Vec<CorrectiveAction>>,
}

impl StepSchema for D5Data {
    const FIELDS: &'static [&'static str] =
        &["corrective_actions_occurrence", "corrective_actions_detection"];
}

// D6 - Implement Permanent Corrective Actions

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImplementationMonitoring {
    pub monitoring_interval: Option<String>,
    pub pieces_produced: Option<u64>,
    pub rejection_rate: Option<f64>,
    pub audited_by: Option<String>,
    #[serde(default, deserialize_with = "lenient_date::deserialize")]
    pub audit_date: Option<NaiveDate>,
    pub shift_1_data: Option<String>,
    pub shift_2_data: Option<String>,
    pub shift_3_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub question: Option<String>,
    pub checked: Option<bool>,
    pub shift_1: Option<bool>,
    pub shift_2: Option<bool>,
    pub shift_3: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct D6Data {
    pub corrective_actions_occurrence: Option<Vec<CorrectiveAction>>,
    pub corrective_actions_detection: Option<Vec<CorrectiveAction>>,
    pub monitoring: Option<ImplementationMonitoring>,
    pub checklist: Option<Vec<ChecklistItem>>,
    pub audited_by: Option<String>,
    #[serde(default, deserialize_with = "lenient_date::deserialize")]
    pub audit_date: Option<NaiveDate>,
    pub num_shifts: Option<u32>,
}

impl StepSchema for D6Data {
    const FIELDS: &'static [&'static str] = &[
        "corrective_actions_occurrence",
        "corrective_actions_detection",
        "monitoring",
        "checklist",
        "audited_by",
        "audit_date",
        "num_shifts",
    ];
}

// D7 - Prevent Recurrence

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceRisk {
    pub area_line_product: Option<String>,
    pub similar_risk_present: Option<String>,
    pub action_taken: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationValidation {
    pub line_site: Option<String>,
    pub action_replicated: Option<String>,
    pub confirmation_method: Option<String>,
    pub confirmed_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseUpdate {
    pub document_type: Option<String>,
    pub topic_reference: Option<String>,
    pub owner: Option<String>,
    pub location_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongTermMonitoring {
    pub checkpoint_type: Option<String>,
    pub frequency: Option<String>,
    pub owner: Option<String>,
    #[serde(default, deserialize_with = "lenient_date::deserialize")]
    pub start_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonDissemination {
    pub audience_team: Option<String>,
    pub method: Option<String>,
    #[serde(default, deserialize_with = "lenient_date::deserialize")]
    pub date: Option<NaiveDate>,
    pub owner: Option<String>,
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct D7Data {
    pub recurrence_risks: Option<Vec<RecurrenceRisk>>,
    pub replication_validations: Option<Vec<ReplicationValidation>>,
    pub knowledge_base_updates: Option<Vec<KnowledgeBaseUpdate>>,
    pub long_term_monitoring: Option<Vec<LongTermMonitoring>>,
    pub lesson_disseminations: Option<Vec<LessonDissemination>>,
    pub ll_conclusion: Option<String>,
}

impl StepSchema for D7Data {
    const FIELDS: &'static [&'static str] = &[
        "recurrence_risks",
        "replication_validations",
        "knowledge_base_updates",
        "long_term_monitoring",
        "lesson_disseminations",
        "ll_conclusion",
    ];
}

// D8 - Recognize Team and Individual Contributions

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosureSignature {
    pub closed_by: Option<String>,
    #[serde(default, deserialize_with = "lenient_date::deserialize")]
    pub closure_date: Option<NaiveDate>,
    pub approved_by: Option<String>,
    #[serde(default, deserialize_with = "lenient_date::deserialize")]
    pub approval_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct D8Data {
    pub closure_statement: Option<String>,
    pub signatures: Option<ClosureSignature>,
}

impl StepSchema for D8Data {
    const FIELDS: &'static [&'static str] = &["closure_statement", "signatures"];
}
