//! Aggregation of section verdicts into step-level state.
//!
//! A step is validated only when every configured section's most recent
//! verdict is a pass. The summary row written at that point concatenates
//! the feedback of all sections.

use chrono::Utc;
use serde::Serialize;

use crate::types::{Decision, SectionKey, StepId};
use crate::verdict::{FieldImprovements, VerdictRecord};

/// Which sections of a step have passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionProgress {
    pub passed: Vec<SectionKey>,
    pub remaining: Vec<SectionKey>,
}

impl SectionProgress {
    /// Partition `all_keys` by the stored verdicts. Sections with no
    /// verdict, or a failing one, remain. Order follows `all_keys`.
    pub fn compute(all_keys: &[SectionKey], verdicts: &[VerdictRecord]) -> Self {
        let (passed, remaining) = all_keys.iter().cloned().partition(|key| {
            verdict_for(verdicts, key).is_some_and(VerdictRecord::is_pass)
        });
        Self { passed, remaining }
    }

    pub fn all_passed(&self) -> bool {
        self.remaining.is_empty()
    }
}

fn verdict_for<'a>(verdicts: &'a [VerdictRecord], key: &SectionKey) -> Option<&'a VerdictRecord> {
    verdicts
        .iter()
        .find(|v| v.section.as_ref() == Some(key))
}

/// Build the full-step summary row from the section verdicts.
///
/// Feedback is concatenated in `all_keys` order; improvement maps are
/// merged with later sections overriding earlier ones on the same field.
/// Notes are tagged with their section: `[five_w_2h] ... | [deviation] ...`.
pub fn summarize(step_id: StepId, all_keys: &[SectionKey], verdicts: &[VerdictRecord]) -> VerdictRecord {
    let mut missing = Vec::new();
    let mut issues = Vec::new();
    let mut suggestions = Vec::new();
    let mut improvements = FieldImprovements::new();
    let mut notes = Vec::new();

    for key in all_keys {
        let Some(verdict) = verdict_for(verdicts, key) else {
            continue;
        };
        missing.extend(verdict.missing.iter().cloned());
        issues.extend(verdict.issues.iter().cloned());
        suggestions.extend(verdict.suggestions.iter().cloned());
        improvements.extend(verdict.field_improvements());
        if !verdict.notes.trim().is_empty() {
            notes.push(format!("[{}] {}", key, verdict.notes.trim()));
        }
    }

    VerdictRecord {
        step_id,
        section: None,
        decision: Decision::Pass,
        missing,
        issues,
        suggestions,
        professional_rewrite: serde_json::to_string(&improvements)
            .unwrap_or_else(|_| "{}".to_string()),
        notes: notes.join(" | "),
        validated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::Verdict;
    use proptest::prelude::*;
    use serde_json::json;

    fn keys(names: &[&str]) -> Vec<SectionKey> {
        names.iter().map(|n| SectionKey::new(*n)).collect()
    }

    fn record(key: &str, decision: Decision) -> VerdictRecord {
        VerdictRecord::from_verdict(StepId(1), Some(SectionKey::new(key)), &Verdict::empty(decision))
    }

    #[test]
    fn test_one_failing_section_remains() {
        let all = keys(&["a", "b", "c"]);
        let verdicts = vec![
            record("a", Decision::Pass),
            record("b", Decision::Pass),
            record("c", Decision::Fail),
        ];

        let progress = SectionProgress::compute(&all, &verdicts);
        assert_eq!(progress.passed, keys(&["a", "b"]));
        assert_eq!(progress.remaining, keys(&["c"]));
        assert!(!progress.all_passed());
    }

    #[test]
    fn test_unsubmitted_sections_remain() {
        let all = keys(&["a", "b"]);
        let progress = SectionProgress::compute(&all, &[record("b", Decision::Pass)]);
        assert_eq!(progress.remaining, keys(&["a"]));
    }

    #[test]
    fn test_summary_concatenates_feedback() {
        let all = keys(&["five_w_2h", "deviation"]);

        let mut first = Verdict::empty(Decision::Pass);
        first.suggestions = vec!["Add a photo".into()];
        first.field_improvements.insert("how_many".into(), json!("120 pcs"));
        first.overall_assessment = "Clear".into();

        let mut second = Verdict::empty(Decision::Pass);
        second.quality_issues = vec!["Standard reference is vague".into()];
        second.field_improvements.insert("standard_applicable".into(), json!("DRW-1234 rev C"));
        second.overall_assessment = "Acceptable".into();

        let verdicts = vec![
            VerdictRecord::from_verdict(StepId(3), Some(SectionKey::new("deviation")), &second),
            VerdictRecord::from_verdict(StepId(3), Some(SectionKey::new("five_w_2h")), &first),
        ];

        let summary = summarize(StepId(3), &all, &verdicts);
        assert_eq!(summary.section, None);
        assert_eq!(summary.decision, Decision::Pass);
        assert_eq!(summary.suggestions, vec!["Add a photo"]);
        assert_eq!(summary.issues, vec!["Standard reference is vague"]);
        assert_eq!(summary.notes, "[five_w_2h] Clear | [deviation] Acceptable");

        let merged = summary.field_improvements();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["standard_applicable"], "DRW-1234 rev C");
    }

    proptest! {
        #[test]
        fn prop_remaining_is_exactly_the_non_passing(decisions in prop::collection::vec(any::<Option<bool>>(), 1..8)) {
            let all: Vec<SectionKey> = (0..decisions.len()).map(|i| SectionKey::new(format!("s{}", i))).collect();
            let verdicts: Vec<VerdictRecord> = decisions
                .iter()
                .enumerate()
                .filter_map(|(i, d)| d.map(|pass| {
                    record(&format!("s{}", i), if pass { Decision::Pass } else { Decision::Fail })
                }))
                .collect();

            let progress = SectionProgress::compute(&all, &verdicts);
            let expected_passed = decisions.iter().filter(|d| **d == Some(true)).count();
            prop_assert_eq!(progress.passed.len(), expected_passed);
            prop_assert_eq!(progress.passed.len() + progress.remaining.len(), all.len());
            prop_assert_eq!(progress.all_passed(), decisions.iter().all(|d| *d == Some(true)));
        }
    }
}
