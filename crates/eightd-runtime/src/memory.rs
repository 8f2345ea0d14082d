//! In-memory [`WorkflowStore`].
//!
//! One `RwLock` over the whole state makes every method atomic. Used by
//! the CLI and by tests; a relational backend implements the same trait.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use thiserror::Error;

use eightd_core::types::reference_number;
use eightd_core::{
    Complaint, ComplaintFilter, ComplaintId, ComplaintStatus, ComplaintUpdate, NewComplaint,
    OpenedComplaint, Report, ReportId, SectionKey, Step, StepCode, StepId, StepStatus,
    SubmissionCommit, VerdictRecord, WorkflowStore,
};

/// Errors from the in-memory store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("complaint {0} does not exist")]
    UnknownComplaint(ComplaintId),

    #[error("step {0} does not exist")]
    UnknownStep(StepId),

    #[error("step {step} belongs to report {actual}, not {expected}")]
    ReportMismatch {
        step: StepId,
        expected: ReportId,
        actual: ReportId,
    },
}

#[derive(Debug, Default)]
struct State {
    next_complaint: u64,
    next_report: u64,
    next_step: u64,
    complaints: BTreeMap<ComplaintId, Complaint>,
    reports: BTreeMap<ReportId, Report>,
    steps: BTreeMap<StepId, Step>,
    verdicts: BTreeMap<(StepId, Option<SectionKey>), VerdictRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored verdict rows.
    pub fn verdict_count(&self) -> usize {
        self.state.read().verdicts.len()
    }
}

impl WorkflowStore for MemoryStore {
    type Error = MemoryError;

    // ── Complaints ────────────────────────────────────────────────────────

    async fn create_complaint(&self, new: NewComplaint) -> Result<OpenedComplaint, MemoryError> {
        let now = Utc::now();
        let mut state = self.state.write();

        state.next_complaint += 1;
        let complaint = Complaint {
            id: ComplaintId(state.next_complaint),
            reference_number: reference_number(state.next_complaint),
            name: new.name,
            description: new.description,
            product_line: new.product_line,
            plant: new.plant,
            defects: new.defects,
            customer: new.customer,
            status: ComplaintStatus::Open,
            created_at: now,
            updated_at: now,
        };

        state.next_report += 1;
        let report = Report {
            id: ReportId(state.next_report),
            complaint_id: complaint.id,
            report_number: Report::number_for(now),
            title: Report::title_for(&complaint),
            created_at: now,
        };

        let mut steps = Vec::with_capacity(StepCode::all().len());
        for code in StepCode::all() {
            state.next_step += 1;
            let step = Step::draft(StepId(state.next_step), report.id, code, now);
            state.steps.insert(step.id, step.clone());
            steps.push(step);
        }

        state.complaints.insert(complaint.id, complaint.clone());
        state.reports.insert(report.id, report.clone());

        Ok(OpenedComplaint {
            complaint,
            report,
            steps,
        })
    }

    async fn get_complaint(&self, id: ComplaintId) -> Result<Option<Complaint>, MemoryError> {
        Ok(self.state.read().complaints.get(&id).cloned())
    }

    async fn update_complaint(
        &self,
        id: ComplaintId,
        update: ComplaintUpdate,
    ) -> Result<Option<Complaint>, MemoryError> {
        let mut state = self.state.write();
        let Some(complaint) = state.complaints.get_mut(&id) else {
            return Ok(None);
        };
        update.apply(complaint);
        complaint.updated_at = Utc::now();
        Ok(Some(complaint.clone()))
    }

    async fn list_complaints(&self, filter: ComplaintFilter) -> Result<Vec<Complaint>, MemoryError> {
        let state = self.state.read();
        let mut matching: Vec<&Complaint> = state
            .complaints
            .values()
            .filter(|c| filter.matches(c))
            .collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(matching
            .into_iter()
            .skip(filter.skip)
            .take(filter.limit)
            .cloned()
            .collect())
    }

    // ── Reports ───────────────────────────────────────────────────────────

    async fn get_report(&self, id: ReportId) -> Result<Option<Report>, MemoryError> {
        Ok(self.state.read().reports.get(&id).cloned())
    }

    async fn report_for_complaint(
        &self,
        complaint_id: ComplaintId,
    ) -> Result<Option<Report>, MemoryError> {
        Ok(self
            .state
            .read()
            .reports
            .values()
            .find(|r| r.complaint_id == complaint_id)
            .cloned())
    }

    // ── Steps ─────────────────────────────────────────────────────────────

    async fn get_step(&self, id: StepId) -> Result<Option<Step>, MemoryError> {
        Ok(self.state.read().steps.get(&id).cloned())
    }

    async fn list_steps(&self, report_id: ReportId) -> Result<Vec<Step>, MemoryError> {
        let mut steps: Vec<Step> = self
            .state
            .read()
            .steps
            .values()
            .filter(|s| s.report_id == report_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.code);
        Ok(steps)
    }

    async fn put_step(&self, step: Step) -> Result<(), MemoryError> {
        let mut state = self.state.write();
        let existing = state
            .steps
            .get_mut(&step.id)
            .ok_or(MemoryError::UnknownStep(step.id))?;
        if existing.report_id != step.report_id {
            return Err(MemoryError::ReportMismatch {
                step: step.id,
                expected: existing.report_id,
                actual: step.report_id,
            });
        }
        *existing = step;
        Ok(())
    }

    // ── Verdicts ──────────────────────────────────────────────────────────

    async fn upsert_verdict(&self, mut record: VerdictRecord) -> Result<(), MemoryError> {
        let mut state = self.state.write();
        if !state.steps.contains_key(&record.step_id) {
            return Err(MemoryError::UnknownStep(record.step_id));
        }
        record.validated_at = Utc::now();
        state
            .verdicts
            .insert((record.step_id, record.section.clone()), record);
        Ok(())
    }

    async fn get_verdict(
        &self,
        step_id: StepId,
        section: Option<SectionKey>,
    ) -> Result<Option<VerdictRecord>, MemoryError> {
        Ok(self.state.read().verdicts.get(&(step_id, section)).cloned())
    }

    async fn section_verdicts(&self, step_id: StepId) -> Result<Vec<VerdictRecord>, MemoryError> {
        Ok(self
            .state
            .read()
            .verdicts
            .range((step_id, None)..)
            .take_while(|((id, _), _)| *id == step_id)
            .filter(|((_, section), _)| section.is_some())
            .map(|(_, record)| record.clone())
            .collect())
    }

    // ── Submissions ───────────────────────────────────────────────────────

    async fn commit_submission(&self, commit: SubmissionCommit) -> Result<(), MemoryError> {
        let now = Utc::now();
        let mut state = self.state.write();

        if !state.steps.contains_key(&commit.step_id) {
            return Err(MemoryError::UnknownStep(commit.step_id));
        }
        if let Some(record) = commit
            .verdicts
            .iter()
            .find(|r| !state.steps.contains_key(&r.step_id))
        {
            return Err(MemoryError::UnknownStep(record.step_id));
        }
        if let Some((id, _)) = commit.complaint_status {
            if !state.complaints.contains_key(&id) {
                return Err(MemoryError::UnknownComplaint(id));
            }
        }

        if let Some(status) = commit.step_status {
            if let Some(step) = state.steps.get_mut(&commit.step_id) {
                step.status = status;
                step.completed_at = (status == StepStatus::Validated).then_some(now);
                step.updated_at = now;
            }
        }
        for mut record in commit.verdicts {
            record.validated_at = now;
            state
                .verdicts
                .insert((record.step_id, record.section.clone()), record);
        }
        if let Some((id, status)) = commit.complaint_status {
            if let Some(complaint) = state.complaints.get_mut(&id) {
                complaint.status = status;
                complaint.updated_at = now;
            }
        }
        Ok(())
    }
}
