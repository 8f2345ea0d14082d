//! Local rule validator for D1 (team composition).
//!
//! D1 never goes to the model. The rules are deterministic and produce a
//! [`Verdict`] of the same shape as the model-backed path.

use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

use crate::types::{Decision, StepData};
use crate::verdict::Verdict;

/// The closed set of D1 team roles.
pub const TEAM_ROLES: [&str; 6] = [
    "production",
    "maintenance",
    "engineering",
    "logistics",
    "team_leader",
    "other",
];

pub const TEAM_LEADER: &str = "team_leader";

/// Minimum team size.
pub const MIN_TEAM_SIZE: usize = 2;

const MEMBER_FIELDS: [&str; 4] = ["name", "function", "department", "role"];

/// Validates the `team_members` list of a D1 document.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeamValidator;

impl TeamValidator {
    pub fn new() -> Self {
        Self
    }

    /// Run every D1 rule against the step document.
    pub fn validate(&self, data: &StepData) -> Verdict {
        let mut verdict = Verdict::empty(Decision::Fail);
        verdict.language_detected = "en".to_string();

        let members = match data.get("team_members") {
            Some(JsonValue::Array(members)) => members,
            _ => {
                verdict.missing_fields.push("team_members".to_string());
                verdict.overall_assessment =
                    "No team defined: team_members is missing or not a list.".to_string();
                return verdict;
            }
        };

        if members.len() < MIN_TEAM_SIZE {
            verdict.incomplete_fields.push(format!(
                "team_members: at least {} members required (found {})",
                MIN_TEAM_SIZE,
                members.len()
            ));
            verdict.suggestions.push(
                "Add members from each function involved (production, quality, maintenance, engineering)"
                    .to_string(),
            );
        }

        let mut leaders = 0usize;
        let mut seen_names: BTreeMap<String, usize> = BTreeMap::new();

        for (index, member) in members.iter().enumerate() {
            let ordinal = index + 1;
            let Some(member) = member.as_object() else {
                verdict
                    .incomplete_fields
                    .push(format!("member {}: entry is not an object", ordinal));
                continue;
            };

            for field in MEMBER_FIELDS {
                if text(member, field).is_empty() {
                    verdict
                        .incomplete_fields
                        .push(format!("member {}: {} is empty", ordinal, field));
                }
            }

            let role = text(member, "role");
            if !role.is_empty() {
                if !TEAM_ROLES.contains(&role) {
                    let replacement = suggest_role(role);
                    verdict.quality_issues.push(format!(
                        "member {}: invalid role '{}' (expected one of {})",
                        ordinal,
                        role,
                        TEAM_ROLES.join(", ")
                    ));
                    verdict
                        .suggestions
                        .push(format!("member {}: use role '{}'", ordinal, replacement));
                    verdict.field_improvements.insert(
                        format!("team_members[{}].role", ordinal),
                        JsonValue::String(replacement.to_string()),
                    );
                } else if role == TEAM_LEADER {
                    leaders += 1;
                }
            }

            let name = text(member, "name");
            if !name.is_empty() {
                let normalized = name.to_lowercase();
                match seen_names.get(&normalized) {
                    Some(first) => verdict.quality_issues.push(format!(
                        "member {}: duplicate name '{}' (same as member {})",
                        ordinal, name, first
                    )),
                    None => {
                        seen_names.insert(normalized, ordinal);
                    }
                }
            }
        }

        match leaders {
            0 => {
                verdict
                    .incomplete_fields
                    .push("team_members: no team_leader assigned".to_string());
                verdict
                    .suggestions
                    .push("Assign the team_leader role to exactly one member".to_string());
            }
            1 => {}
            n => verdict.quality_issues.push(format!(
                "team_members: {} members hold the team_leader role; exactly one is allowed",
                n
            )),
        }

        let failed = !verdict.missing_fields.is_empty()
            || !verdict.incomplete_fields.is_empty()
            || !verdict.quality_issues.is_empty();

        if failed {
            let count = verdict.incomplete_fields.len() + verdict.quality_issues.len();
            verdict.overall_assessment =
                format!("Team composition needs attention: {} issue(s) found.", count);
        } else {
            verdict.decision = Decision::Pass;
            verdict.overall_assessment = format!(
                "Team composition meets D1 requirements ({} members, one team leader).",
                members.len()
            );
        }

        verdict
    }
}

/// Trimmed string value of a member field; non-strings count as empty.
fn text<'a>(member: &'a Map<String, JsonValue>, field: &str) -> &'a str {
    member
        .get(field)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .unwrap_or("")
}

/// Best replacement for an invalid role.
///
/// `"Team Leader"` and `"team-leader"` normalise to `team_leader`;
/// anything that does not normalise to a valid role becomes `other`.
pub fn suggest_role(role: &str) -> &'static str {
    let normalized: String = role
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();

    TEAM_ROLES
        .iter()
        .copied()
        .find(|r| *r == normalized)
        .unwrap_or("other")
}
