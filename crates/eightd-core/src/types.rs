//! Core types for the 8D workflow.
//!
//! These types mirror the entities a complaint investigation moves through:
//! a complaint owns one report, the report owns eight steps, and each step
//! carries a free-form JSON document plus a status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The JSON document stored on a step.
pub type StepData = Map<String, JsonValue>;

/// Error returned when parsing a step code, status or decision from text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: '{value}'")]
pub struct ParseError {
    kind: &'static str,
    value: String,
}

impl ParseError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// The eight disciplines, in investigation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StepCode {
    D1,
    D2,
    D3,
    D4,
    D5,
    D6,
    D7,
    D8,
}

impl StepCode {
    /// All step codes in order.
    pub fn all() -> [StepCode; 8] {
        use StepCode::*;
        [D1, D2, D3, D4, D5, D6, D7, D8]
    }

    /// Canonical title of the discipline.
    pub fn name(&self) -> &'static str {
        match self {
            StepCode::D1 => "Establish the Team",
            StepCode::D2 => "Describe the Problem",
            StepCode::D3 => "Develop Interim Containment Action",
            StepCode::D4 => "Determine Root Cause",
            StepCode::D5 => "Choose and Verify Permanent Corrective Actions",
            StepCode::D6 => "Implement Permanent Corrective Actions",
            StepCode::D7 => "Prevent Recurrence",
            StepCode::D8 => "Recognize Team and Individual Contributions",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepCode::D1 => "D1",
            StepCode::D2 => "D2",
            StepCode::D3 => "D3",
            StepCode::D4 => "D4",
            StepCode::D5 => "D5",
            StepCode::D6 => "D6",
            StepCode::D7 => "D7",
            StepCode::D8 => "D8",
        }
    }

    /// D1 is validated by local rules only and has no sections.
    pub fn is_local_only(&self) -> bool {
        matches!(self, StepCode::D1)
    }
}

impl fmt::Display for StepCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepCode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepCode::all()
            .into_iter()
            .find(|code| code.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseError::new("step code", s))
    }
}

/// Lifecycle status of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Draft,
    Submitted,
    Validated,
    Rejected,
}

impl StepStatus {
    /// Whether a full-step submission may start from this status.
    pub fn can_submit(&self) -> bool {
        matches!(self, StepStatus::Draft | StepStatus::Rejected)
    }

    /// Whether a section submission may start from this status.
    ///
    /// Looser than [`can_submit`](Self::can_submit): sections are iterated
    /// independently while the step sits in `submitted`.
    pub fn can_submit_section(&self) -> bool {
        matches!(
            self,
            StepStatus::Draft | StepStatus::Rejected | StepStatus::Submitted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Draft => "draft",
            StepStatus::Submitted => "submitted",
            StepStatus::Validated => "validated",
            StepStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary outcome of a validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Pass,
    Fail,
}

impl Decision {
    pub fn is_pass(&self) -> bool {
        matches!(self, Decision::Pass)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Pass => "pass",
            Decision::Fail => "fail",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = ParseError;

    /// Strict: only the exact strings `pass` and `fail` are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(Decision::Pass),
            "fail" => Ok(Decision::Fail),
            other => Err(ParseError::new("decision", other)),
        }
    }
}

/// Name of a section within a step (e.g. `five_w_2h`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionKey(String);

impl SectionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SectionKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SectionKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// What a validation is scoped to: a whole step, or one section of it.
///
/// Carried as a structured value through prompt building, knowledge
/// lookup and verdict storage. The only place it becomes a string is
/// [`knowledge_hint`](Self::knowledge_hint).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidationTarget {
    pub step: StepCode,
    pub section: Option<SectionKey>,
}

impl ValidationTarget {
    pub fn step(step: StepCode) -> Self {
        Self {
            step,
            section: None,
        }
    }

    pub fn section(step: StepCode, section: impl Into<SectionKey>) -> Self {
        Self {
            step,
            section: Some(section.into()),
        }
    }

    pub fn is_full_step(&self) -> bool {
        self.section.is_none()
    }

    /// Lookup key for the coaching document in the knowledge store.
    pub fn knowledge_hint(&self) -> String {
        match &self.section {
            Some(section) => format!("{}_{}_coaching_validation", self.step, section),
            None => format!("{}_coaching_validation", self.step),
        }
    }
}

impl fmt::Display for ValidationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.section {
            Some(section) => write!(f, "{} / {}", self.step, section),
            None => write!(f, "{}", self.step),
        }
    }
}

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a complaint.
    ComplaintId
);
id_type!(
    /// Identifier of an 8D report.
    ReportId
);
id_type!(
    /// Identifier of a report step.
    StepId
);

/// Status of a complaint.
///
/// Besides the lifecycle states, a complaint mirrors the furthest step
/// that has been fully validated (stored as the bare step code, e.g. `"D4"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ComplaintStatus {
    #[default]
    Open,
    InProgress,
    UnderReview,
    Resolved,
    Closed,
    Rejected,
    Reached(StepCode),
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplaintStatus::Open => f.write_str("open"),
            ComplaintStatus::InProgress => f.write_str("in_progress"),
            ComplaintStatus::UnderReview => f.write_str("under_review"),
            ComplaintStatus::Resolved => f.write_str("resolved"),
            ComplaintStatus::Closed => f.write_str("closed"),
            ComplaintStatus::Rejected => f.write_str("rejected"),
            ComplaintStatus::Reached(code) => write!(f, "{}", code),
        }
    }
}

impl FromStr for ComplaintStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ComplaintStatus::Open),
            "in_progress" => Ok(ComplaintStatus::InProgress),
            "under_review" => Ok(ComplaintStatus::UnderReview),
            "resolved" => Ok(ComplaintStatus::Resolved),
            "closed" => Ok(ComplaintStatus::Closed),
            "rejected" => Ok(ComplaintStatus::Rejected),
            other => other
                .parse::<StepCode>()
                .map(ComplaintStatus::Reached)
                .map_err(|_| ParseError::new("complaint status", other)),
        }
    }
}

impl TryFrom<String> for ComplaintStatus {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ComplaintStatus> for String {
    fn from(status: ComplaintStatus) -> Self {
        status.to_string()
    }
}

/// Fields supplied when filing a complaint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewComplaint {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub product_line: Option<String>,
    #[serde(default)]
    pub plant: Option<String>,
    #[serde(default)]
    pub defects: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
}

impl NewComplaint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A filed quality complaint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Complaint {
    pub id: ComplaintId,
    /// Human-facing reference, e.g. `C-00042`.
    pub reference_number: String,
    pub name: String,
    pub description: Option<String>,
    pub product_line: Option<String>,
    pub plant: Option<String>,
    pub defects: Option<String>,
    pub customer: Option<String>,
    pub status: ComplaintStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Complaint {
    /// The fixed-shape context record fed into prompts.
    pub fn context(&self) -> ComplaintContext {
        ComplaintContext {
            complaint_name: self.name.clone(),
            complaint_description: self.description.clone().unwrap_or_default(),
            product_line: self.product_line.clone().unwrap_or_default(),
            plant: self.plant.clone().unwrap_or_default(),
            defects: self.defects.clone().unwrap_or_default(),
        }
    }
}

/// Partial edit of a complaint. Only the fields that are set change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplaintUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub product_line: Option<String>,
    #[serde(default)]
    pub plant: Option<String>,
    #[serde(default)]
    pub defects: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub status: Option<ComplaintStatus>,
}

impl ComplaintUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.product_line.is_none()
            && self.plant.is_none()
            && self.defects.is_none()
            && self.customer.is_none()
            && self.status.is_none()
    }

    /// Copy the set fields onto `complaint`. Timestamps are left to the store.
    pub fn apply(self, complaint: &mut Complaint) {
        if let Some(name) = self.name {
            complaint.name = name;
        }
        if let Some(description) = self.description {
            complaint.description = Some(description);
        }
        if let Some(product_line) = self.product_line {
            complaint.product_line = Some(product_line);
        }
        if let Some(plant) = self.plant {
            complaint.plant = Some(plant);
        }
        if let Some(defects) = self.defects {
            complaint.defects = Some(defects);
        }
        if let Some(customer) = self.customer {
            complaint.customer = Some(customer);
        }
        if let Some(status) = self.status {
            complaint.status = status;
        }
    }
}

/// Default page size when listing complaints.
pub const DEFAULT_COMPLAINT_PAGE: usize = 50;

/// Filter and page for listing complaints, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintFilter {
    #[serde(default)]
    pub status: Option<ComplaintStatus>,
    #[serde(default)]
    pub product_line: Option<String>,
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_page")]
    pub limit: usize,
}

fn default_page() -> usize {
    DEFAULT_COMPLAINT_PAGE
}

impl Default for ComplaintFilter {
    fn default() -> Self {
        Self {
            status: None,
            product_line: None,
            skip: 0,
            limit: DEFAULT_COMPLAINT_PAGE,
        }
    }
}

impl ComplaintFilter {
    pub fn matches(&self, complaint: &Complaint) -> bool {
        self.status.map_or(true, |s| complaint.status == s)
            && self
                .product_line
                .as_deref()
                .map_or(true, |p| complaint.product_line.as_deref() == Some(p))
    }
}

/// Format a complaint reference number from its sequence.
pub fn reference_number(sequence: u64) -> String {
    format!("C-{:05}", sequence)
}

/// The 8D report owned by a complaint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub complaint_id: ComplaintId,
    /// `8D-YYYYMMDD-HHMMSS`
    pub report_number: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Report {
    pub fn number_for(at: DateTime<Utc>) -> String {
        at.format("8D-%Y%m%d-%H%M%S").to_string()
    }

    pub fn title_for(complaint: &Complaint) -> String {
        format!("8D Report - {}", complaint.name)
    }
}

/// One discipline of a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub report_id: ReportId,
    pub code: StepCode,
    pub status: StepStatus,
    pub data: StepData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Step {
    /// A fresh draft step with empty data.
    pub fn draft(id: StepId, report_id: ReportId, code: StepCode, at: DateTime<Utc>) -> Self {
        Self {
            id,
            report_id,
            code,
            status: StepStatus::Draft,
            data: StepData::new(),
            created_at: at,
            updated_at: at,
            completed_at: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.code.name()
    }

    /// Shallow merge: incoming top-level keys overwrite, others are untouched.
    pub fn merge_data(&mut self, incoming: StepData) {
        for (key, value) in incoming {
            self.data.insert(key, value);
        }
        self.updated_at = Utc::now();
    }
}

/// Complaint details surfaced to the model as grounding context.
///
/// Unset fields are empty strings; an all-empty context is tolerated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplaintContext {
    #[serde(default)]
    pub complaint_name: String,
    #[serde(default)]
    pub complaint_description: String,
    #[serde(default)]
    pub product_line: String,
    #[serde(default)]
    pub plant: String,
    #[serde(default)]
    pub defects: String,
}

impl ComplaintContext {
    pub fn is_empty(&self) -> bool {
        self.complaint_name.is_empty()
            && self.complaint_description.is_empty()
            && self.product_line.is_empty()
            && self.plant.is_empty()
            && self.defects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_code_roundtrip_and_order() {
        for code in StepCode::all() {
            assert_eq!(code.as_str().parse::<StepCode>().unwrap(), code);
        }
        assert!(StepCode::D1 < StepCode::D8);
        assert_eq!("d4".parse::<StepCode>().unwrap(), StepCode::D4);
        assert!("D9".parse::<StepCode>().is_err());
    }

    #[test]
    fn test_step_names() {
        assert_eq!(StepCode::D1.name(), "Establish the Team");
        assert_eq!(StepCode::D4.name(), "Determine Root Cause");
    }

    #[test]
    fn test_status_eligibility() {
        assert!(StepStatus::Draft.can_submit());
        assert!(StepStatus::Rejected.can_submit());
        assert!(!StepStatus::Submitted.can_submit());
        assert!(!StepStatus::Validated.can_submit());

        assert!(StepStatus::Submitted.can_submit_section());
        assert!(!StepStatus::Validated.can_submit_section());
    }

    #[test]
    fn test_decision_is_strict() {
        assert_eq!("pass".parse::<Decision>().unwrap(), Decision::Pass);
        assert!("PASS".parse::<Decision>().is_err());
        assert!("maybe".parse::<Decision>().is_err());
    }

    #[test]
    fn test_knowledge_hint() {
        let full = ValidationTarget::step(StepCode::D4);
        assert_eq!(full.knowledge_hint(), "D4_coaching_validation");

        let section = ValidationTarget::section(StepCode::D2, "five_w_2h");
        assert_eq!(section.knowledge_hint(), "D2_five_w_2h_coaching_validation");
        assert_eq!(section.to_string(), "D2 / five_w_2h");
    }

    #[test]
    fn test_complaint_status_serde() {
        let reached = ComplaintStatus::Reached(StepCode::D3);
        assert_eq!(serde_json::to_value(reached).unwrap(), "D3");

        let parsed: ComplaintStatus = serde_json::from_value("open".into()).unwrap();
        assert_eq!(parsed, ComplaintStatus::Open);

        let parsed: ComplaintStatus = serde_json::from_value("D8".into()).unwrap();
        assert_eq!(parsed, ComplaintStatus::Reached(StepCode::D8));

        assert!(serde_json::from_value::<ComplaintStatus>("bogus".into()).is_err());
    }

    #[test]
    fn test_reference_and_report_number() {
        assert_eq!(reference_number(42), "C-00042");

        let at = DateTime::parse_from_rfc3339("2024-03-05T07:08:09Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(Report::number_for(at), "8D-20240305-070809");
    }

    fn complaint(name: &str) -> Complaint {
        let now = Utc::now();
        Complaint {
            id: ComplaintId(1),
            reference_number: reference_number(1),
            name: name.to_string(),
            description: None,
            product_line: Some("Brush holders".to_string()),
            plant: Some("Plant 2".to_string()),
            defects: None,
            customer: None,
            status: ComplaintStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_complaint_update_touches_set_fields_only() {
        let mut target = complaint("Cracked housing");
        let update: ComplaintUpdate =
            serde_json::from_value(serde_json::json!({"plant": "Plant 5", "status": "closed"})).unwrap();
        assert!(!update.is_empty());
        update.apply(&mut target);

        assert_eq!(target.name, "Cracked housing");
        assert_eq!(target.plant.as_deref(), Some("Plant 5"));
        assert_eq!(target.product_line.as_deref(), Some("Brush holders"));
        assert_eq!(target.status, ComplaintStatus::Closed);
        assert!(ComplaintUpdate::default().is_empty());
    }

    #[test]
    fn test_complaint_filter() {
        let filter: ComplaintFilter = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(filter, ComplaintFilter::default());
        assert_eq!(filter.limit, DEFAULT_COMPLAINT_PAGE);

        let open = complaint("a");
        assert!(filter.matches(&open));

        let by_line = ComplaintFilter {
            product_line: Some("Rotors".to_string()),
            ..Default::default()
        };
        assert!(!by_line.matches(&open));

        let by_status = ComplaintFilter {
            status: Some(ComplaintStatus::Reached(StepCode::D2)),
            ..Default::default()
        };
        assert!(!by_status.matches(&open));
    }

    #[test]
    fn test_merge_data_is_shallow() {
        let mut step = Step::draft(StepId(1), ReportId(1), StepCode::D2, Utc::now());
        step.data.insert("a".into(), 1.into());
        step.data.insert("b".into(), serde_json::json!({"x": 1}));

        let mut incoming = StepData::new();
        incoming.insert("b".into(), serde_json::json!({"y": 2}));
        incoming.insert("c".into(), JsonValue::Null);
        step.merge_data(incoming);

        assert_eq!(step.data["a"], 1);
        assert_eq!(step.data["b"], serde_json::json!({"y": 2}));
        assert!(step.data["c"].is_null());
    }
}
