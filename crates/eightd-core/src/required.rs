//! Required-fields pre-check for full-step submission.
//!
//! Stricter than the section rubric and purely mechanical. A failing
//! pre-check stops a submission before any validator runs.

use serde_json::{Map, Value as JsonValue};

use crate::types::{StepCode, StepData};

/// Check a step document. `Err` carries one reason per failed requirement.
pub fn check(step: StepCode, data: &StepData) -> Result<(), Vec<String>> {
    if data.is_empty() {
        return Err(vec!["step data is empty".to_string()]);
    }

    let mut reasons = Vec::new();
    match step {
        StepCode::D1 => check_d1(data, &mut reasons),
        StepCode::D2 => check_d2(data, &mut reasons),
        StepCode::D3 => check_d3(data, &mut reasons),
        StepCode::D4 => check_d4(data, &mut reasons),
        StepCode::D5 => check_d5(data, &mut reasons),
        StepCode::D6 => check_d6(data, &mut reasons),
        StepCode::D7 => check_d7(data, &mut reasons),
        StepCode::D8 => check_d8(data, &mut reasons),
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(reasons)
    }
}

fn check_d1(data: &StepData, reasons: &mut Vec<String>) {
    let Some(members) = data.get("team_members").and_then(JsonValue::as_array) else {
        reasons.push("team_members must be a list".to_string());
        return;
    };
    if members.len() < 2 {
        reasons.push("team_members needs at least 2 members".to_string());
    }
    for (index, member) in members.iter().enumerate() {
        for field in ["name", "function", "department"] {
            if !filled(member.get(field)) {
                reasons.push(format!("member {}: {} is required", index + 1, field));
            }
        }
    }
}

fn check_d2(data: &StepData, reasons: &mut Vec<String>) {
    let Some(five_w_2h) = data.get("five_w_2h").and_then(JsonValue::as_object) else {
        reasons.push("five_w_2h must be filled in".to_string());
        return;
    };
    let filled_count = five_w_2h.values().filter(|v| filled(Some(*v))).count();
    if filled_count < 3 {
        reasons.push(format!(
            "five_w_2h needs at least 3 answered questions (found {})",
            filled_count
        ));
    }
}

fn check_d3(data: &StepData, reasons: &mut Vec<String>) {
    let Some(status) = data.get("defected_part_status").and_then(JsonValue::as_object) else {
        reasons.push("defected_part_status must be filled in".to_string());
        return;
    };
    if !["returned", "isolated", "identified"]
        .iter()
        .any(|k| truthy(status.get(*k)))
    {
        reasons.push(
            "defected_part_status: mark the parts as returned, isolated or identified".to_string(),
        );
    }
    if truthy(status.get("isolated")) && !filled(status.get("isolated_location")) {
        reasons.push("defected_part_status: isolated_location is required when isolated".to_string());
    }
    if truthy(status.get("identified")) && !filled(status.get("identified_method")) {
        reasons.push(
            "defected_part_status: identified_method is required when identified".to_string(),
        );
    }
}

fn check_d4(data: &StepData, reasons: &mut Vec<String>) {
    for analysis in ["root_cause_occurrence", "root_cause_non_detection"] {
        let conclusion = data.get(analysis).and_then(JsonValue::as_object);
        for field in ["root_cause", "validation_method"] {
            if !filled(conclusion.and_then(|c| c.get(field))) {
                reasons.push(format!("{}.{} is required", analysis, field));
            }
        }
    }
}

fn check_d5(data: &StepData, reasons: &mut Vec<String>) {
    let occurrence = data.get("corrective_actions_occurrence").and_then(JsonValue::as_array);
    let detection = data.get("corrective_actions_detection").and_then(JsonValue::as_array);

    let (Some(occurrence), Some(detection)) = (occurrence, detection) else {
        reasons.push(
            "corrective_actions_occurrence and corrective_actions_detection must both be lists"
                .to_string(),
        );
        return;
    };

    if !occurrence.iter().chain(detection).any(planned_action) {
        reasons.push(
            "at least one corrective action needs action, responsible and due_date".to_string(),
        );
    }
}

fn check_d6(data: &StepData, reasons: &mut Vec<String>) {
    let implemented = ["corrective_actions_occurrence", "corrective_actions_detection"]
        .iter()
        .filter_map(|k| data.get(*k).and_then(JsonValue::as_array))
        .flatten()
        .any(|row| planned_action(row) && row.as_object().is_some_and(|r| {
            filled(r.get("imp_date")) || filled(r.get("evidence"))
        }));
    if !implemented {
        reasons.push(
            "at least one corrective action needs an implementation date or evidence".to_string(),
        );
    }

    match data.get("monitoring").and_then(JsonValue::as_object) {
        Some(monitoring) => {
            let tracked = [
                "monitoring_interval",
                "pieces_produced",
                "rejection_rate",
                "audited_by",
                "audit_date",
            ]
            .iter()
            .any(|k| filled(monitoring.get(*k)));
            if !tracked {
                reasons.push(
                    "monitoring needs an interval, pieces produced, rejection rate or audit"
                        .to_string(),
                );
            }
        }
        None => reasons.push("monitoring must be filled in".to_string()),
    }

    match data.get("checklist").and_then(JsonValue::as_array) {
        Some(checklist) if !checklist.is_empty() => {
            let verified = checklist
                .iter()
                .filter_map(JsonValue::as_object)
                .filter(|item| {
                    ["shift_1", "shift_2", "shift_3"]
                        .iter()
                        .any(|k| truthy(item.get(*k)))
                })
                .count();
            // At least half of the checklist items verified on some shift.
            if verified * 2 < checklist.len() {
                reasons.push(format!(
                    "checklist: only {} of {} items verified on a shift",
                    verified,
                    checklist.len()
                ));
            }
        }
        _ => reasons.push("checklist must contain at least one item".to_string()),
    }
}

fn check_d7(data: &StepData, reasons: &mut Vec<String>) {
    if filled(data.get("ll_conclusion")) {
        return;
    }
    let has_rows = [
        "recurrence_risks",
        "lesson_disseminations",
        "replication_validations",
        "knowledge_base_updates",
        "long_term_monitoring",
    ]
    .iter()
    .any(|k| list_has_content(data.get(*k)));
    if !has_rows {
        reasons.push(
            "ll_conclusion or at least one prevention, knowledge or dissemination entry is required"
                .to_string(),
        );
    }
}

fn check_d8(data: &StepData, reasons: &mut Vec<String>) {
    if !filled(data.get("closure_statement")) {
        reasons.push("closure_statement is required".to_string());
    }
    if let Some(signatures) = data.get("signatures").filter(|s| truthy(Some(*s))) {
        if !filled(signatures.get("closed_by")) {
            reasons.push("signatures.closed_by is required when signatures are given".to_string());
        }
    }
}

/// A row with action, responsible and due date.
fn planned_action(row: &JsonValue) -> bool {
    row.as_object().is_some_and(|r| {
        ["action", "responsible", "due_date"]
            .iter()
            .all(|k| filled(r.get(*k)))
    })
}

fn list_has_content(value: Option<&JsonValue>) -> bool {
    value
        .and_then(JsonValue::as_array)
        .is_some_and(|rows| {
            rows.iter()
                .filter_map(JsonValue::as_object)
                .any(row_has_content)
        })
}

fn row_has_content(row: &Map<String, JsonValue>) -> bool {
    row.values().any(|v| filled(Some(v)))
}

/// Non-null, non-blank, non-empty.
fn filled(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => false,
        Some(JsonValue::String(s)) => !s.trim().is_empty(),
        Some(JsonValue::Array(a)) => !a.is_empty(),
        Some(JsonValue::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}

/// Checkbox-style truthiness.
fn truthy(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => false,
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(JsonValue::String(s)) => !s.trim().is_empty(),
        Some(JsonValue::Array(a)) => !a.is_empty(),
        Some(JsonValue::Object(o)) => !o.is_empty(),
    }
}
