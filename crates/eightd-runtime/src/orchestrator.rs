//! Step orchestrator: the 8D step state machine.
//!
//! ```text
//! draft ──submit──▶ submitted ──pass──▶ validated
//!   ▲                   │
//!   │                   └──fail──▶ rejected ──submit──▶ submitted ...
//!   └──── error during validation (rollback)
//! ```
//!
//! Two submission paths:
//! - **Full step** ([`submit_step`](StepOrchestrator::submit_step)): D1 and
//!   the fallback for any step. Runs the required-fields pre-check, then the
//!   local D1 rules or the model-backed validator.
//! - **Section** ([`submit_section`](StepOrchestrator::submit_section)):
//!   validates one catalog section. When every section's latest verdict is
//!   a pass, a summary verdict is written and the step is validated.
//!
//! The writes of one outcome (step status, verdict rows, complaint status)
//! go to the store as a single [`SubmissionCommit`].

use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use eightd_core::{
    required, schema, slice, summarize, Complaint, ComplaintContext, ComplaintFilter, ComplaintId,
    ComplaintStatus, ComplaintUpdate, Decision, NewComplaint, OpenedComplaint, Report,
    SectionCatalog, SectionKey, SectionProgress, Step, StepCode, StepId, StepStatus,
    SubmissionCommit, TeamValidator, ValidationTarget, Verdict, VerdictRecord, WorkflowStore,
};

use crate::coach::{StepValidator, ValidationRequest};
use crate::error::{CoachError, Precondition};

/// Result of a full-step submission.
#[derive(Debug, Clone, Serialize)]
pub struct StepSubmission {
    pub step: Step,
    pub verdict: Verdict,
    pub message: String,
}

/// Result of a section submission.
#[derive(Debug, Clone, Serialize)]
pub struct SectionSubmission {
    pub verdict: Verdict,
    pub all_sections_passed: bool,
    pub passed_sections: Vec<SectionKey>,
    pub remaining_sections: Vec<SectionKey>,
    pub step_status: StepStatus,
}

/// Completion of a complaint's report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportProgress {
    pub complaint_id: ComplaintId,
    pub report_number: String,
    pub total_steps: usize,
    pub validated_steps: usize,
    pub progress_percentage: f64,
    /// First step still in draft, in code order.
    pub current_step: Option<StepCode>,
}

/// Drives saves, submissions and status transitions over a [`WorkflowStore`].
pub struct StepOrchestrator<S> {
    store: S,
    catalog: Arc<SectionCatalog>,
    validator: Arc<dyn StepValidator>,
    team: TeamValidator,
}

impl<S: WorkflowStore> StepOrchestrator<S> {
    /// An orchestrator over the standard section catalog.
    pub fn new(store: S, validator: Arc<dyn StepValidator>) -> Self {
        Self {
            store,
            catalog: Arc::new(SectionCatalog::standard()),
            validator,
            team: TeamValidator::new(),
        }
    }

    /// Replace the section catalog.
    pub fn with_catalog(mut self, catalog: Arc<SectionCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &SectionCatalog {
        &self.catalog
    }

    // ── Complaints and reads ──────────────────────────────────────────────

    /// File a complaint together with its report and eight draft steps.
    pub async fn open_complaint(&self, complaint: NewComplaint) -> Result<OpenedComplaint, CoachError> {
        if complaint.name.trim().is_empty() {
            return Err(CoachError::InvalidInput("complaint name is required".to_string()));
        }
        let opened = self
            .store
            .create_complaint(complaint)
            .await
            .map_err(CoachError::store)?;

        tracing::info!(
            complaint_id = %opened.complaint.id,
            reference = %opened.complaint.reference_number,
            report = %opened.report.report_number,
            "Complaint opened"
        );
        Ok(opened)
    }

    /// Edit a complaint's details or lifecycle status.
    pub async fn update_complaint(
        &self,
        complaint_id: ComplaintId,
        update: ComplaintUpdate,
    ) -> Result<Complaint, CoachError> {
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(CoachError::InvalidInput("complaint name cannot be blank".to_string()));
        }
        let complaint = self
            .store
            .update_complaint(complaint_id, update)
            .await
            .map_err(CoachError::store)?
            .ok_or_else(|| CoachError::NotFound(format!("Complaint {}", complaint_id)))?;

        tracing::info!(complaint_id = %complaint.id, status = %complaint.status, "Complaint updated");
        Ok(complaint)
    }

    /// Complaints matching `filter`, newest first.
    pub async fn list_complaints(&self, filter: ComplaintFilter) -> Result<Vec<Complaint>, CoachError> {
        self.store
            .list_complaints(filter)
            .await
            .map_err(CoachError::store)
    }

    pub async fn get_step(&self, step_id: StepId) -> Result<Step, CoachError> {
        self.store
            .get_step(step_id)
            .await
            .map_err(CoachError::store)?
            .ok_or_else(|| CoachError::NotFound(format!("Step {}", step_id)))
    }

    /// Steps of a complaint's report, in code order.
    pub async fn list_steps(&self, complaint_id: ComplaintId) -> Result<Vec<Step>, CoachError> {
        let report = self.report_of(complaint_id).await?;
        self.store
            .list_steps(report.id)
            .await
            .map_err(CoachError::store)
    }

    pub async fn step_by_code(
        &self,
        complaint_id: ComplaintId,
        code: StepCode,
    ) -> Result<Step, CoachError> {
        self.list_steps(complaint_id)
            .await?
            .into_iter()
            .find(|s| s.code == code)
            .ok_or_else(|| {
                CoachError::NotFound(format!("Step {} of complaint {}", code, complaint_id))
            })
    }

    /// The first step, in code order, still waiting for work.
    pub async fn next_step(&self, complaint_id: ComplaintId) -> Result<Option<Step>, CoachError> {
        Ok(self
            .list_steps(complaint_id)
            .await?
            .into_iter()
            .find(|s| matches!(s.status, StepStatus::Draft | StepStatus::Rejected)))
    }

    pub async fn report_progress(&self, complaint_id: ComplaintId) -> Result<ReportProgress, CoachError> {
        let report = self.report_of(complaint_id).await?;
        let steps = self
            .store
            .list_steps(report.id)
            .await
            .map_err(CoachError::store)?;

        let total_steps = steps.len();
        let validated_steps = steps
            .iter()
            .filter(|s| s.status == StepStatus::Validated)
            .count();
        let progress_percentage = if total_steps == 0 {
            0.0
        } else {
            validated_steps as f64 / total_steps as f64 * 100.0
        };

        Ok(ReportProgress {
            complaint_id,
            report_number: report.report_number,
            total_steps,
            validated_steps,
            progress_percentage,
            current_step: steps
                .iter()
                .find(|s| s.status == StepStatus::Draft)
                .map(|s| s.code),
        })
    }

    // ── Save ──────────────────────────────────────────────────────────────

    /// Validate a partial payload against the step's schema and merge it
    /// into the stored document. Allowed in every status, including
    /// `validated`; the stored verdict is left as is.
    pub async fn save_progress(&self, step_id: StepId, payload: JsonValue) -> Result<Step, CoachError> {
        let mut step = self.get_step(step_id).await?;
        let incoming = schema::normalize(step.code, payload)?;
        let keys = incoming.len();

        if step.status == StepStatus::Validated {
            tracing::warn!(step_id = %step.id, step = %step.code, "Saving over a validated step");
        }

        step.merge_data(incoming);
        self.put_step(&step).await?;

        tracing::info!(step_id = %step.id, step = %step.code, keys, "Step progress saved");
        Ok(step)
    }

    // ── Full-step submission ──────────────────────────────────────────────

    pub async fn submit_step(&self, step_id: StepId) -> Result<StepSubmission, CoachError> {
        let step = self.get_step(step_id).await?;

        if !step.status.can_submit() {
            return Err(Precondition::Status {
                action: "submit",
                status: step.status,
            }
            .into());
        }

        required::check(step.code, &step.data).map_err(Precondition::RequiredFields)?;

        let step = self
            .commit(SubmissionCommit::new(step.id).with_status(StepStatus::Submitted))
            .await?;
        tracing::info!(step_id = %step.id, step = %step.code, "Step submitted");

        match self.validate_full_step(step).await {
            Ok(submission) => Ok(submission),
            Err(e) => {
                self.rollback_to_draft(step_id, &e).await;
                Err(e)
            }
        }
    }

    async fn validate_full_step(&self, step: Step) -> Result<StepSubmission, CoachError> {
        let verdict = if step.code.is_local_only() {
            self.team.validate(&step.data)
        } else {
            let context = self.complaint_context(&step).await?;
            let target = ValidationTarget::step(step.code);
            self.validator
                .validate(ValidationRequest {
                    target: &target,
                    section_label: None,
                    data: &step.data,
                    complaint: &context,
                })
                .await?
        };

        let record = VerdictRecord::from_verdict(step.id, None, &verdict);
        let (commit, message) = if verdict.is_pass() {
            (
                self.validated_commit(&step).await?,
                format!("{} validated successfully", step.code),
            )
        } else {
            (
                SubmissionCommit::new(step.id).with_status(StepStatus::Rejected),
                format!("{} needs rework: review the feedback", step.code),
            )
        };
        let step = self.commit(commit.with_verdict(record)).await?;

        Ok(StepSubmission {
            step,
            verdict,
            message,
        })
    }

    async fn rollback_to_draft(&self, step_id: StepId, cause: &CoachError) {
        tracing::warn!(step_id = %step_id, error = %cause, "Validation failed, rolling back to draft");

        let restored = self
            .store
            .commit_submission(SubmissionCommit::new(step_id).with_status(StepStatus::Draft))
            .await;

        if let Err(e) = restored {
            tracing::error!(step_id = %step_id, error = %e, "Rollback to draft failed");
        }
    }

    // ── Section submission ────────────────────────────────────────────────

    pub async fn submit_section(
        &self,
        step_id: StepId,
        section: &str,
    ) -> Result<SectionSubmission, CoachError> {
        let step = self.get_step(step_id).await?;

        if !step.status.can_submit_section() {
            return Err(Precondition::Status {
                action: "validate a section of",
                status: step.status,
            }
            .into());
        }

        if step.code.is_local_only() {
            return Err(CoachError::InvalidInput(format!(
                "{} uses full-step local validation; submit the whole step",
                step.code
            )));
        }

        let def = self.catalog.section(step.code, section)?;
        let data = slice(&step.data, &def.fields);
        let target = ValidationTarget::section(step.code, def.key.clone());
        let context = self.complaint_context(&step).await?;

        let verdict = self
            .validator
            .validate(ValidationRequest {
                target: &target,
                section_label: Some(&def.label),
                data: &data,
                complaint: &context,
            })
            .await?;

        let record = VerdictRecord::from_verdict(step.id, Some(def.key.clone()), &verdict);
        let all_keys = self.catalog.section_keys(step.code);
        let mut verdicts = self
            .store
            .section_verdicts(step.id)
            .await
            .map_err(CoachError::store)?;
        verdicts.retain(|v| v.section != record.section);
        verdicts.push(record.clone());
        let progress = SectionProgress::compute(&all_keys, &verdicts);

        let commit = if progress.all_passed() {
            self.validated_commit(&step)
                .await?
                .with_verdict(summarize(step.id, &all_keys, &verdicts))
        } else {
            SubmissionCommit::new(step.id)
        };
        let step = self.commit(commit.with_verdict(record)).await?;
        tracing::info!(
            step_id = %step.id,
            step = %step.code,
            section = %def.key,
            decision = %verdict.decision,
            "Section verdict stored"
        );

        Ok(SectionSubmission {
            verdict,
            all_sections_passed: progress.all_passed(),
            passed_sections: progress.passed,
            remaining_sections: progress.remaining,
            step_status: step.status,
        })
    }

    // ── Review and verdict reads ──────────────────────────────────────────

    /// Reviewer rejection: the step goes to `rejected` with a failing
    /// full-step verdict carrying `reason` as its only issue.
    pub async fn reject_step(&self, step_id: StepId, reason: &str) -> Result<Step, CoachError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoachError::InvalidInput("a rejection reason is required".to_string()));
        }

        let step = self.get_step(step_id).await?;
        let mut verdict = Verdict::empty(Decision::Fail);
        verdict.quality_issues.push(reason.to_string());

        let step = self
            .commit(
                SubmissionCommit::new(step.id)
                    .with_status(StepStatus::Rejected)
                    .with_verdict(VerdictRecord::from_verdict(step.id, None, &verdict)),
            )
            .await?;

        tracing::info!(step_id = %step.id, step = %step.code, "Step rejected by reviewer");
        Ok(step)
    }

    /// Reviewer approval: the step is validated with `review` stored as a
    /// passing full-step verdict, and the complaint advances as on a pass.
    pub async fn approve_step(&self, step_id: StepId, mut review: Verdict) -> Result<Step, CoachError> {
        let step = self.get_step(step_id).await?;
        review.decision = Decision::Pass;

        let commit = self
            .validated_commit(&step)
            .await?
            .with_verdict(VerdictRecord::from_verdict(step.id, None, &review));
        let step = self.commit(commit).await?;

        tracing::info!(step_id = %step.id, step = %step.code, "Step approved by reviewer");
        Ok(step)
    }

    /// Stored verdict for a section, or the full-step row when `section` is `None`.
    pub async fn get_verdict(
        &self,
        step_id: StepId,
        section: Option<&str>,
    ) -> Result<VerdictRecord, CoachError> {
        let step = self.get_step(step_id).await?;
        let section = match section {
            Some(key) => Some(self.catalog.section(step.code, key)?.key.clone()),
            None => None,
        };

        self.store
            .get_verdict(step.id, section.clone())
            .await
            .map_err(CoachError::store)?
            .ok_or_else(|| match section {
                Some(key) => CoachError::NotFound(format!("Verdict for step {} section {}", step_id, key)),
                None => CoachError::NotFound(format!("Verdict for step {}", step_id)),
            })
    }

    pub async fn section_verdicts(&self, step_id: StepId) -> Result<Vec<VerdictRecord>, CoachError> {
        let step = self.get_step(step_id).await?;
        self.store
            .section_verdicts(step.id)
            .await
            .map_err(CoachError::store)
    }

    // ── Internals ─────────────────────────────────────────────────────────

    async fn report_of(&self, complaint_id: ComplaintId) -> Result<Report, CoachError> {
        self.store
            .report_for_complaint(complaint_id)
            .await
            .map_err(CoachError::store)?
            .ok_or_else(|| CoachError::NotFound(format!("Report for complaint {}", complaint_id)))
    }

    async fn complaint_of(&self, step: &Step) -> Result<Option<Complaint>, CoachError> {
        let Some(report) = self
            .store
            .get_report(step.report_id)
            .await
            .map_err(CoachError::store)?
        else {
            return Ok(None);
        };
        self.store
            .get_complaint(report.complaint_id)
            .await
            .map_err(CoachError::store)
    }

    /// Missing complaints yield an empty context.
    async fn complaint_context(&self, step: &Step) -> Result<ComplaintContext, CoachError> {
        Ok(self
            .complaint_of(step)
            .await?
            .map(|c| c.context())
            .unwrap_or_default())
    }

    /// A commit validating `step` and advancing its complaint when needed.
    async fn validated_commit(&self, step: &Step) -> Result<SubmissionCommit, CoachError> {
        let commit = SubmissionCommit::new(step.id).with_status(StepStatus::Validated);
        Ok(match self.complaint_of(step).await? {
            Some(complaint) => {
                let status = advanced_status(complaint.status, step.code);
                if status != complaint.status {
                    commit.with_complaint_status(complaint.id, status)
                } else {
                    commit
                }
            }
            None => commit,
        })
    }

    /// Apply `commit` and return the step as stored afterwards.
    async fn commit(&self, commit: SubmissionCommit) -> Result<Step, CoachError> {
        let step_id = commit.step_id;
        let status = commit.step_status;
        let advanced = commit.complaint_status;
        let rows = commit.verdicts.len();

        self.store
            .commit_submission(commit)
            .await
            .map_err(CoachError::store)?;

        if let Some(status) = status {
            tracing::info!(step_id = %step_id, status = %status, verdicts = rows, "Step status committed");
        }
        if let Some((complaint_id, status)) = advanced {
            tracing::info!(complaint_id = %complaint_id, status = %status, "Complaint advanced");
        }
        self.get_step(step_id).await
    }

    async fn put_step(&self, step: &Step) -> Result<(), CoachError> {
        self.store
            .put_step(step.clone())
            .await
            .map_err(CoachError::store)
    }
}

/// A complaint mirrors the furthest validated step and never moves back.
fn advanced_status(current: ComplaintStatus, validated: StepCode) -> ComplaintStatus {
    match current {
        ComplaintStatus::Reached(furthest) if furthest >= validated => current,
        _ => ComplaintStatus::Reached(validated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryError, MemoryStore};
    use async_trait::async_trait;
    use eightd_core::ReportId;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Replays scripted outcomes and records every target it was asked about.
    #[derive(Default)]
    struct ScriptedValidator {
        outcomes: Mutex<VecDeque<Result<Verdict, CoachError>>>,
        targets: Mutex<Vec<ValidationTarget>>,
    }

    impl ScriptedValidator {
        fn with(outcomes: Vec<Result<Verdict, CoachError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                targets: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.targets.lock().len()
        }
    }

    #[async_trait]
    impl StepValidator for ScriptedValidator {
        async fn validate(&self, request: ValidationRequest<'_>) -> Result<Verdict, CoachError> {
            self.targets.lock().push(request.target.clone());
            self.outcomes
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(CoachError::BackendUnavailable("script exhausted".into())))
        }
    }

    fn pass() -> Result<Verdict, CoachError> {
        Ok(Verdict::empty(Decision::Pass))
    }

    fn fail(issue: &str) -> Result<Verdict, CoachError> {
        let mut verdict = Verdict::empty(Decision::Fail);
        verdict.quality_issues.push(issue.to_string());
        Ok(verdict)
    }

    fn team(members: &[(&str, &str)]) -> JsonValue {
        let members: Vec<JsonValue> = members
            .iter()
            .map(|(name, role)| {
                json!({"name": name, "function": "Engineer", "department": "Quality", "role": role})
            })
            .collect();
        json!({ "team_members": members })
    }

    async fn setup(
        validator: Arc<ScriptedValidator>,
    ) -> (StepOrchestrator<MemoryStore>, OpenedComplaint) {
        let orchestrator = StepOrchestrator::new(MemoryStore::new(), validator);
        let opened = orchestrator
            .open_complaint(NewComplaint::new("Cracked brush holder"))
            .await
            .unwrap();
        (orchestrator, opened)
    }

    /// A [`MemoryStore`] whose commits fail whenever they move a complaint.
    #[derive(Default)]
    struct ComplaintWriteFails {
        inner: MemoryStore,
    }

    impl WorkflowStore for ComplaintWriteFails {
        type Error = MemoryError;

        async fn create_complaint(&self, new: NewComplaint) -> Result<OpenedComplaint, MemoryError> {
            self.inner.create_complaint(new).await
        }

        async fn get_complaint(&self, id: ComplaintId) -> Result<Option<Complaint>, MemoryError> {
            self.inner.get_complaint(id).await
        }

        async fn update_complaint(
            &self,
            id: ComplaintId,
            update: ComplaintUpdate,
        ) -> Result<Option<Complaint>, MemoryError> {
            self.inner.update_complaint(id, update).await
        }

        async fn list_complaints(&self, filter: ComplaintFilter) -> Result<Vec<Complaint>, MemoryError> {
            self.inner.list_complaints(filter).await
        }

        async fn get_report(&self, id: ReportId) -> Result<Option<Report>, MemoryError> {
            self.inner.get_report(id).await
        }

        async fn report_for_complaint(&self, id: ComplaintId) -> Result<Option<Report>, MemoryError> {
            self.inner.report_for_complaint(id).await
        }

        async fn get_step(&self, id: StepId) -> Result<Option<Step>, MemoryError> {
            self.inner.get_step(id).await
        }

        async fn list_steps(&self, id: ReportId) -> Result<Vec<Step>, MemoryError> {
            self.inner.list_steps(id).await
        }

        async fn put_step(&self, step: Step) -> Result<(), MemoryError> {
            self.inner.put_step(step).await
        }

        async fn upsert_verdict(&self, record: VerdictRecord) -> Result<(), MemoryError> {
            self.inner.upsert_verdict(record).await
        }

        async fn get_verdict(
            &self,
            step_id: StepId,
            section: Option<SectionKey>,
        ) -> Result<Option<VerdictRecord>, MemoryError> {
            self.inner.get_verdict(step_id, section).await
        }

        async fn section_verdicts(&self, step_id: StepId) -> Result<Vec<VerdictRecord>, MemoryError> {
            self.inner.section_verdicts(step_id).await
        }

        async fn commit_submission(&self, commit: SubmissionCommit) -> Result<(), MemoryError> {
            if let Some((id, _)) = commit.complaint_status {
                return Err(MemoryError::UnknownComplaint(id));
            }
            self.inner.commit_submission(commit).await
        }
    }

    fn abc_catalog() -> Arc<SectionCatalog> {
        Arc::new(
            SectionCatalog::builder()
                .section(StepCode::D2, "a", "Section A", &["problem_description"])
                .section(StepCode::D2, "b", "Section B", &["standard_applicable"])
                .section(StepCode::D2, "c", "Section C", &["observed_situation"])
                .build(),
        )
    }

    #[tokio::test]
    async fn test_open_complaint_and_progress() {
        let (orchestrator, opened) = setup(ScriptedValidator::with(vec![])).await;
        let id = opened.complaint.id;

        let steps = orchestrator.list_steps(id).await.unwrap();
        assert_eq!(steps.len(), 8);
        assert_eq!(
            orchestrator.step_by_code(id, StepCode::D4).await.unwrap().code,
            StepCode::D4
        );
        assert_eq!(
            orchestrator.next_step(id).await.unwrap().map(|s| s.code),
            Some(StepCode::D1)
        );

        let progress = orchestrator.report_progress(id).await.unwrap();
        assert_eq!(progress.total_steps, 8);
        assert_eq!(progress.validated_steps, 0);
        assert_eq!(progress.progress_percentage, 0.0);
        assert_eq!(progress.current_step, Some(StepCode::D1));

        assert!(matches!(
            orchestrator.list_steps(ComplaintId(99)).await,
            Err(CoachError::NotFound(_))
        ));
        assert!(matches!(
            orchestrator.open_complaint(NewComplaint::new("  ")).await,
            Err(CoachError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_save_merges_top_level_keys() {
        let (orchestrator, opened) = setup(ScriptedValidator::with(vec![])).await;
        let d2 = opened.steps[1].id;

        orchestrator
            .save_progress(d2, json!({"problem_description": "Cracks", "standard_applicable": "DRW-1"}))
            .await
            .unwrap();
        let step = orchestrator
            .save_progress(d2, json!({"standard_applicable": "DRW-2"}))
            .await
            .unwrap();

        assert_eq!(step.data["problem_description"], "Cracks");
        assert_eq!(step.data["standard_applicable"], "DRW-2");
        assert_eq!(orchestrator.get_step(d2).await.unwrap().data, step.data);
    }

    #[tokio::test]
    async fn test_save_rejects_schema_violations() {
        let (orchestrator, opened) = setup(ScriptedValidator::with(vec![])).await;
        let d1 = opened.steps[0].id;

        let err = orchestrator
            .save_progress(d1, json!({"team_members": "everyone"}))
            .await
            .unwrap_err();
        assert!(matches!(err, CoachError::InvalidInput(_)));
        assert!(err.to_string().contains("D1"));

        assert!(matches!(
            orchestrator.save_progress(StepId(404), json!({})).await,
            Err(CoachError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_d1_submit_uses_local_rules() {
        let validator = ScriptedValidator::with(vec![]);
        let (orchestrator, opened) = setup(validator.clone()).await;
        let d1 = opened.steps[0].id;

        orchestrator
            .save_progress(d1, team(&[("Amira", "team_leader"), ("Karim", "production")]))
            .await
            .unwrap();
        let submission = orchestrator.submit_step(d1).await.unwrap();

        assert_eq!(submission.verdict.decision, Decision::Pass);
        assert_eq!(submission.step.status, StepStatus::Validated);
        assert!(submission.step.completed_at.is_some());
        assert_eq!(validator.calls(), 0);

        let complaint = orchestrator
            .store()
            .get_complaint(opened.complaint.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(complaint.status, ComplaintStatus::Reached(StepCode::D1));
        assert_eq!(
            orchestrator.get_verdict(d1, None).await.unwrap().decision,
            Decision::Pass
        );
    }

    #[tokio::test]
    async fn test_d1_failing_team_is_rejected_then_resubmittable() {
        let (orchestrator, opened) = setup(ScriptedValidator::with(vec![])).await;
        let d1 = opened.steps[0].id;

        orchestrator
            .save_progress(d1, team(&[("Amira", "team_leader"), ("Karim", "team_leader")]))
            .await
            .unwrap();
        let submission = orchestrator.submit_step(d1).await.unwrap();
        assert_eq!(submission.step.status, StepStatus::Rejected);
        assert_eq!(submission.verdict.decision, Decision::Fail);
        assert!(!submission.verdict.quality_issues.is_empty());

        orchestrator
            .save_progress(d1, team(&[("Amira", "team_leader"), ("Karim", "maintenance")]))
            .await
            .unwrap();
        let submission = orchestrator.submit_step(d1).await.unwrap();
        assert_eq!(submission.step.status, StepStatus::Validated);
    }

    #[tokio::test]
    async fn test_precheck_failure_never_calls_backend() {
        let validator = ScriptedValidator::with(vec![pass()]);
        let (orchestrator, opened) = setup(validator.clone()).await;
        let d4 = opened.steps[3].id;

        orchestrator
            .save_progress(d4, json!({"root_cause_occurrence": {"root_cause": "Worn die"}}))
            .await
            .unwrap();
        let err = orchestrator.submit_step(d4).await.unwrap_err();

        assert!(matches!(
            err,
            CoachError::PreconditionFailed(Precondition::RequiredFields(_))
        ));
        assert_eq!(err.status_code(), 422);
        assert_eq!(validator.calls(), 0);
        assert_eq!(orchestrator.get_step(d4).await.unwrap().status, StepStatus::Draft);
    }

    #[tokio::test]
    async fn test_backend_failure_rolls_back_to_draft() {
        let validator = ScriptedValidator::with(vec![Err(CoachError::BackendUnavailable(
            "connection reset".into(),
        ))]);
        let (orchestrator, opened) = setup(validator.clone()).await;
        let d2 = opened.steps[1].id;

        orchestrator
            .save_progress(
                d2,
                json!({"five_w_2h": {"what": "Crack", "where": "Line 3", "when": "Week 12"}}),
            )
            .await
            .unwrap();
        let err = orchestrator.submit_step(d2).await.unwrap_err();

        assert!(matches!(err, CoachError::BackendUnavailable(_)));
        assert_eq!(validator.calls(), 1);
        assert_eq!(orchestrator.get_step(d2).await.unwrap().status, StepStatus::Draft);
        assert!(matches!(
            orchestrator.get_verdict(d2, None).await,
            Err(CoachError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_submit_refused_for_validated_step() {
        let (orchestrator, opened) = setup(ScriptedValidator::with(vec![])).await;
        let d1 = opened.steps[0].id;
        orchestrator
            .save_progress(d1, team(&[("Amira", "team_leader"), ("Karim", "logistics")]))
            .await
            .unwrap();
        orchestrator.submit_step(d1).await.unwrap();

        let err = orchestrator.submit_step(d1).await.unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn test_save_is_permitted_after_validation() {
        let (orchestrator, opened) = setup(ScriptedValidator::with(vec![])).await;
        let d1 = opened.steps[0].id;
        orchestrator
            .save_progress(d1, team(&[("Amira", "team_leader"), ("Karim", "logistics")]))
            .await
            .unwrap();
        orchestrator.submit_step(d1).await.unwrap();

        let step = orchestrator
            .save_progress(d1, team(&[("Nobody", "production")]))
            .await
            .unwrap();

        assert_eq!(step.status, StepStatus::Validated);
        assert_eq!(
            orchestrator.get_verdict(d1, None).await.unwrap().decision,
            Decision::Pass
        );
    }

    #[tokio::test]
    async fn test_section_submit_refusals() {
        let (orchestrator, opened) = setup(ScriptedValidator::with(vec![])).await;

        let err = orchestrator
            .submit_section(opened.steps[0].id, "team")
            .await
            .unwrap_err();
        assert!(matches!(err, CoachError::InvalidInput(_)));

        let err = orchestrator
            .submit_section(opened.steps[1].id, "root_cause")
            .await
            .unwrap_err();
        assert!(matches!(err, CoachError::InvalidInput(_)));
        assert!(err.to_string().contains("five_w_2h"));
    }

    #[tokio::test]
    async fn test_section_aggregation_gate() {
        let validator = ScriptedValidator::with(vec![pass(), pass(), fail("vague"), pass()]);
        let (orchestrator, opened) = setup(validator.clone()).await;
        let orchestrator = orchestrator.with_catalog(abc_catalog());
        let d2 = opened.steps[1].id;

        orchestrator.submit_section(d2, "a").await.unwrap();
        orchestrator.submit_section(d2, "b").await.unwrap();
        let third = orchestrator.submit_section(d2, "c").await.unwrap();

        assert!(!third.all_sections_passed);
        assert_eq!(third.remaining_sections, vec![SectionKey::new("c")]);
        assert_eq!(third.step_status, StepStatus::Draft);
        assert!(matches!(
            orchestrator.get_verdict(d2, None).await,
            Err(CoachError::NotFound(_))
        ));

        let retry = orchestrator.submit_section(d2, "c").await.unwrap();
        assert!(retry.all_sections_passed);
        assert!(retry.remaining_sections.is_empty());
        assert_eq!(retry.step_status, StepStatus::Validated);

        let summary = orchestrator.get_verdict(d2, None).await.unwrap();
        assert_eq!(summary.decision, Decision::Pass);
        assert_eq!(orchestrator.section_verdicts(d2).await.unwrap().len(), 3);

        assert_eq!(
            validator.targets.lock()[0],
            ValidationTarget::section(StepCode::D2, "a")
        );

        let err = orchestrator.submit_section(d2, "a").await.unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn test_section_backend_failure_leaves_status() {
        let validator = ScriptedValidator::with(vec![Err(CoachError::KnowledgeGap(
            "D2_a_coaching_validation".into(),
        ))]);
        let (orchestrator, opened) = setup(validator).await;
        let orchestrator = orchestrator.with_catalog(abc_catalog());
        let d2 = opened.steps[1].id;

        let err = orchestrator.submit_section(d2, "a").await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(orchestrator.get_step(d2).await.unwrap().status, StepStatus::Draft);
        assert!(orchestrator.section_verdicts(d2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reject_step() {
        let (orchestrator, opened) = setup(ScriptedValidator::with(vec![])).await;
        let d3 = opened.steps[2].id;

        let step = orchestrator
            .reject_step(d3, "Containment photos missing")
            .await
            .unwrap();
        assert_eq!(step.status, StepStatus::Rejected);

        let verdict = orchestrator.get_verdict(d3, None).await.unwrap();
        assert_eq!(verdict.decision, Decision::Fail);
        assert_eq!(verdict.issues, vec!["Containment photos missing"]);

        assert!(matches!(
            orchestrator.reject_step(d3, " ").await,
            Err(CoachError::InvalidInput(_))
        ));
        assert_eq!(
            orchestrator
                .next_step(opened.complaint.id)
                .await
                .unwrap()
                .map(|s| s.code),
            Some(StepCode::D1)
        );
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_no_partial_outcome() {
        let orchestrator =
            StepOrchestrator::new(ComplaintWriteFails::default(), ScriptedValidator::with(vec![]));
        let opened = orchestrator
            .open_complaint(NewComplaint::new("Cracked brush holder"))
            .await
            .unwrap();
        let d1 = opened.steps[0].id;

        orchestrator
            .save_progress(d1, team(&[("Amira", "team_leader"), ("Karim", "production")]))
            .await
            .unwrap();
        let err = orchestrator.submit_step(d1).await.unwrap_err();
        assert!(matches!(err, CoachError::Store(_)));

        let step = orchestrator.get_step(d1).await.unwrap();
        assert_eq!(step.status, StepStatus::Draft);
        assert!(step.completed_at.is_none());
        assert!(matches!(
            orchestrator.get_verdict(d1, None).await,
            Err(CoachError::NotFound(_))
        ));
        let complaint = orchestrator
            .store()
            .get_complaint(opened.complaint.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(complaint.status, ComplaintStatus::Open);
    }

    #[tokio::test]
    async fn test_failed_final_section_commit_keeps_earlier_sections_only() {
        let validator = ScriptedValidator::with(vec![pass(), pass(), pass()]);
        let orchestrator = StepOrchestrator::new(ComplaintWriteFails::default(), validator)
            .with_catalog(abc_catalog());
        let opened = orchestrator
            .open_complaint(NewComplaint::new("Cracked brush holder"))
            .await
            .unwrap();
        let d2 = opened.steps[1].id;

        orchestrator.submit_section(d2, "a").await.unwrap();
        orchestrator.submit_section(d2, "b").await.unwrap();
        let err = orchestrator.submit_section(d2, "c").await.unwrap_err();
        assert!(matches!(err, CoachError::Store(_)));

        let sections = orchestrator.section_verdicts(d2).await.unwrap();
        assert_eq!(sections.len(), 2);
        assert!(orchestrator.get_verdict(d2, Some("c")).await.is_err());
        assert!(orchestrator.get_verdict(d2, None).await.is_err());

        let step = orchestrator.get_step(d2).await.unwrap();
        assert_eq!(step.status, StepStatus::Draft);
        assert!(step.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_approve_step_validates_and_advances() {
        let (orchestrator, opened) = setup(ScriptedValidator::with(vec![])).await;
        let d3 = opened.steps[2].id;

        let mut review = Verdict::empty(Decision::Fail);
        review.suggestions.push("Attach the sorting record".to_string());
        review.overall_assessment = "Accepted after the plant visit".to_string();

        let step = orchestrator.approve_step(d3, review).await.unwrap();
        assert_eq!(step.status, StepStatus::Validated);
        assert!(step.completed_at.is_some());

        let stored = orchestrator.get_verdict(d3, None).await.unwrap();
        assert_eq!(stored.decision, Decision::Pass);
        assert_eq!(stored.suggestions, vec!["Attach the sorting record"]);
        assert_eq!(stored.notes, "Accepted after the plant visit");

        let complaint = orchestrator
            .store()
            .get_complaint(opened.complaint.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(complaint.status, ComplaintStatus::Reached(StepCode::D3));

        let rejected = orchestrator.reject_step(d3, "Wrong lot numbers").await.unwrap();
        assert_eq!(rejected.status, StepStatus::Rejected);
        assert!(rejected.completed_at.is_none());

        assert!(matches!(
            orchestrator
                .approve_step(StepId(404), Verdict::empty(Decision::Pass))
                .await,
            Err(CoachError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_list_complaints() {
        let (orchestrator, opened) = setup(ScriptedValidator::with(vec![])).await;
        let mut second = NewComplaint::new("Loose rotor");
        second.product_line = Some("Rotors".to_string());
        orchestrator.open_complaint(second).await.unwrap();

        let updated = orchestrator
            .update_complaint(
                opened.complaint.id,
                ComplaintUpdate {
                    plant: Some("Plant 5".to_string()),
                    status: Some(ComplaintStatus::UnderReview),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Cracked brush holder");
        assert_eq!(updated.plant.as_deref(), Some("Plant 5"));
        assert_eq!(updated.status, ComplaintStatus::UnderReview);

        let blank = ComplaintUpdate {
            name: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            orchestrator.update_complaint(opened.complaint.id, blank).await,
            Err(CoachError::InvalidInput(_))
        ));
        assert!(matches!(
            orchestrator
                .update_complaint(ComplaintId(99), ComplaintUpdate::default())
                .await,
            Err(CoachError::NotFound(_))
        ));

        let all = orchestrator.list_complaints(ComplaintFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Loose rotor");

        let under_review = orchestrator
            .list_complaints(ComplaintFilter {
                status: Some(ComplaintStatus::UnderReview),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(under_review.len(), 1);
        assert_eq!(under_review[0].id, opened.complaint.id);
    }

    #[test]
    fn test_complaint_status_never_moves_back() {
        assert_eq!(
            advanced_status(ComplaintStatus::Open, StepCode::D1),
            ComplaintStatus::Reached(StepCode::D1)
        );
        assert_eq!(
            advanced_status(ComplaintStatus::Reached(StepCode::D4), StepCode::D2),
            ComplaintStatus::Reached(StepCode::D4)
        );
        assert_eq!(
            advanced_status(ComplaintStatus::Reached(StepCode::D4), StepCode::D5),
            ComplaintStatus::Reached(StepCode::D5)
        );
    }
}
