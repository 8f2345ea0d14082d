//! Minimum pass criteria, per section.
//!
//! Embedded in the prompt and enforced by the model. The mechanical ones
//! (counts, required pairs) are also covered by [`crate::required`] for
//! full-step submission.

use crate::types::{StepCode, ValidationTarget};

/// Criteria block for a validation target.
pub fn minimum_pass_criteria(target: &ValidationTarget) -> &'static str {
    match (target.step, target.section.as_ref().map(|s| s.as_str())) {
        (StepCode::D2, Some("five_w_2h")) => {
            "- Problem description names the object/process and the defect\n\
             - At least 3 of the 5W2H questions answered with facts, not assumptions\n\
             - How many is quantified with a unit (pieces, %, ppm)"
        }
        (StepCode::D2, Some("deviation")) => {
            "- The applicable standard or specification is named\n\
             - Expected and observed situations are both stated and clearly differ\n\
             - At least one piece of evidence (photo, report, measurement) is referenced"
        }
        (StepCode::D2, Some("is_is_not")) => {
            "- At least 2 factors analysed (product, time, lot, pattern)\n\
             - Each factor has both an IS and an IS NOT answer\n\
             - IS NOT answers narrow the problem scope rather than repeat IS"
        }
        (StepCode::D3, Some("defected_parts")) => {
            "- Defective parts are marked returned, isolated or identified\n\
             - Isolated parts have a stated isolation location\n\
             - Identified parts have a stated identification method"
        }
        (StepCode::D3, Some("suspected_parts")) => {
            "- Every location holding suspect stock is listed with an inventory figure\n\
             - Each location has an action and a responsible leader\n\
             - The alert is communicated and carries a traceable reference number"
        }
        (StepCode::D3, Some("restart")) => {
            "- Restart point is identified by date, time or lot\n\
             - The first certified lot and its approver are named\n\
             - A containment responsible is named"
        }
        (StepCode::D4, Some("four_m_occurrence")) | (StepCode::D4, Some("four_m_non_detection")) => {
            "- 4M + Environment categories explored, not a single guess\n\
             - The 5 Whys chain is logical and reaches a systemic cause\n\
             - A root cause is stated together with how it was validated"
        }
        (StepCode::D5, Some("corrective_occurrence")) | (StepCode::D5, Some("corrective_detection")) => {
            "- At least one action addresses the validated root cause directly\n\
             - Each action has a responsible person and a due date\n\
             - Actions are permanent fixes, not repeats of containment"
        }
        (StepCode::D6, Some("implementation")) => {
            "- At least one action has an implementation date or evidence\n\
             - Implementation evidence is verifiable (document, photo, record)\n\
             - Responsible and due date are kept for every action"
        }
        (StepCode::D6, Some("monitoring_checklist")) => {
            "- Monitoring shows an interval, pieces produced or a rejection rate\n\
             - At least half of the checklist items are verified on a shift\n\
             - The audit is attributed (audited by, audit date)"
        }
        (StepCode::D7, Some("prevention")) => {
            "- Similar lines or products are assessed for the same risk\n\
             - Where a risk is present, an action is recorded\n\
             - Replications are confirmed with a method and a name"
        }
        (StepCode::D7, Some("knowledge")) => {
            "- Standards or documents updated are named (PFMEA, control plan, work instruction)\n\
             - Each update has an owner\n\
             - Long-term monitoring has a frequency and an owner"
        }
        (StepCode::D7, Some("lessons_learned")) => {
            "- Lessons are disseminated to a named audience with a method and date\n\
             - The lessons learned conclusion states what changes going forward"
        }
        (StepCode::D8, Some("closure")) => {
            "- Closure statement confirms customer satisfaction and non-recurrence\n\
             - The team's contribution is recognised\n\
             - The report is signed off by the person closing it"
        }
        _ => {
            "- All essential criteria from the coaching document are met\n\
             - The response is complete, specific and quantified\n\
             - The content is consistent with the complaint context"
        }
    }
}
