//! The `WorkflowStore` trait.
//!
//! Storage backends implement this; the step orchestrator depends on the
//! abstraction only. Each method is one atomic operation. Verdict rows are
//! unique per (step, section) and written with upsert semantics: the last
//! write for a pair wins.
//!
//! The outcome of a submission (step status, verdict rows, complaint
//! status) goes through [`WorkflowStore::commit_submission`] so a failure
//! part way never leaves a validated step without its verdict, or a
//! verdict without its status change.

use std::future::Future;

use crate::types::{
    Complaint, ComplaintFilter, ComplaintId, ComplaintStatus, ComplaintUpdate, NewComplaint,
    Report, ReportId, SectionKey, Step, StepId, StepStatus,
};
use crate::verdict::VerdictRecord;

/// A complaint together with the report and steps created with it.
#[derive(Debug, Clone)]
pub struct OpenedComplaint {
    pub complaint: Complaint,
    pub report: Report,
    /// One draft step per code, D1 first.
    pub steps: Vec<Step>,
}

/// Every write produced by one submission, applied all-or-nothing.
#[derive(Debug, Clone)]
pub struct SubmissionCommit {
    pub step_id: StepId,
    /// New step status; `None` leaves the step row untouched. Moving to
    /// `validated` stamps `completed_at`, any other status clears it.
    pub step_status: Option<StepStatus>,
    /// Verdict rows to upsert, keyed by `(step_id, section)`.
    pub verdicts: Vec<VerdictRecord>,
    pub complaint_status: Option<(ComplaintId, ComplaintStatus)>,
}

impl SubmissionCommit {
    pub fn new(step_id: StepId) -> Self {
        Self {
            step_id,
            step_status: None,
            verdicts: Vec::new(),
            complaint_status: None,
        }
    }

    pub fn with_status(mut self, status: StepStatus) -> Self {
        self.step_status = Some(status);
        self
    }

    pub fn with_verdict(mut self, record: VerdictRecord) -> Self {
        self.verdicts.push(record);
        self
    }

    pub fn with_complaint_status(mut self, id: ComplaintId, status: ComplaintStatus) -> Self {
        self.complaint_status = Some((id, status));
        self
    }
}

/// Abstraction over complaint, step and verdict storage.
///
/// All methods return `Send` futures so the trait can be used from a
/// multi-threaded runtime.
pub trait WorkflowStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    // ── Complaints ────────────────────────────────────────────────────────

    /// Persist a new complaint (status `open`), its report, and eight
    /// draft steps with empty data, all at once.
    fn create_complaint(
        &self,
        complaint: NewComplaint,
    ) -> impl Future<Output = Result<OpenedComplaint, Self::Error>> + Send + '_;

    fn get_complaint(
        &self,
        id: ComplaintId,
    ) -> impl Future<Output = Result<Option<Complaint>, Self::Error>> + Send + '_;

    /// Apply the set fields of `update`. `None` when the complaint does not exist.
    fn update_complaint(
        &self,
        id: ComplaintId,
        update: ComplaintUpdate,
    ) -> impl Future<Output = Result<Option<Complaint>, Self::Error>> + Send + '_;

    /// Complaints matching `filter`, newest first, paged by `skip`/`limit`.
    fn list_complaints(
        &self,
        filter: ComplaintFilter,
    ) -> impl Future<Output = Result<Vec<Complaint>, Self::Error>> + Send + '_;

    // ── Reports ───────────────────────────────────────────────────────────

    fn get_report(
        &self,
        id: ReportId,
    ) -> impl Future<Output = Result<Option<Report>, Self::Error>> + Send + '_;

    fn report_for_complaint(
        &self,
        complaint_id: ComplaintId,
    ) -> impl Future<Output = Result<Option<Report>, Self::Error>> + Send + '_;

    // ── Steps ─────────────────────────────────────────────────────────────

    fn get_step(
        &self,
        id: StepId,
    ) -> impl Future<Output = Result<Option<Step>, Self::Error>> + Send + '_;

    /// Steps of a report, ordered by code.
    fn list_steps(
        &self,
        report_id: ReportId,
    ) -> impl Future<Output = Result<Vec<Step>, Self::Error>> + Send + '_;

    /// Replace a stored step (data, status and timestamps).
    fn put_step(&self, step: Step) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

    // ── Verdicts ──────────────────────────────────────────────────────────

    /// Insert or replace the verdict for `(record.step_id, record.section)`.
    fn upsert_verdict(
        &self,
        record: VerdictRecord,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

    /// The verdict for a step section, or the full-step row when `section` is `None`.
    fn get_verdict(
        &self,
        step_id: StepId,
        section: Option<SectionKey>,
    ) -> impl Future<Output = Result<Option<VerdictRecord>, Self::Error>> + Send + '_;

    /// Every per-section verdict of a step (the full-step row excluded).
    fn section_verdicts(
        &self,
        step_id: StepId,
    ) -> impl Future<Output = Result<Vec<VerdictRecord>, Self::Error>> + Send + '_;

    // ── Submissions ───────────────────────────────────────────────────────

    /// Apply a [`SubmissionCommit`] as one unit. Every referenced step and
    /// complaint is checked before anything is written; on error nothing
    /// changes.
    fn commit_submission(
        &self,
        commit: SubmissionCommit,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
