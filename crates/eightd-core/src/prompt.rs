//! Prompt builder for model-backed validation.
//!
//! Rendering is a pure function of its inputs: no I/O, no clock, no
//! randomness. Blocks always appear in the same order:
//!
//! 1. role and scope
//! 2. floor compliance rules (allow-listed targets only)
//! 3. coaching document
//! 4. complaint context
//! 5. the data under review
//! 6. minimum pass criteria
//! 7. mission, response contract, coaching style and language

use serde_json::Value as JsonValue;
use std::fmt::Write as _;
use thiserror::Error;

use crate::criteria::minimum_pass_criteria;
use crate::types::{ComplaintContext, StepCode, StepData, ValidationTarget};

/// Errors from prompt building.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("No coaching content for {0}")]
    EmptyCoaching(String),
}

const SEPARATOR: &str = "------------------------------------------------------------";

const NOT_PROVIDED: &str = "(not provided)";

/// Sections where floor compliance is checked.
const FLOOR_RULE_SECTIONS: &[(StepCode, &str)] = &[
    (StepCode::D3, "defected_parts"),
    (StepCode::D3, "suspected_parts"),
    (StepCode::D3, "restart"),
    (StepCode::D4, "four_m_occurrence"),
    (StepCode::D4, "four_m_non_detection"),
    (StepCode::D5, "corrective_occurrence"),
    (StepCode::D5, "corrective_detection"),
    (StepCode::D6, "implementation"),
    (StepCode::D6, "monitoring_checklist"),
];

/// Everything a prompt is built from.
#[derive(Debug, Clone)]
pub struct PromptInput<'a> {
    pub target: &'a ValidationTarget,
    /// Human-readable section name, when validating a section.
    pub section_label: Option<&'a str>,
    pub coaching: &'a str,
    pub floor_rules: Option<&'a str>,
    pub complaint: &'a ComplaintContext,
    pub data: &'a StepData,
}

/// Assembles validation prompts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Whether floor compliance rules belong in the prompt for this target.
    pub fn includes_floor_rules(target: &ValidationTarget) -> bool {
        match &target.section {
            None => true,
            Some(section) => FLOOR_RULE_SECTIONS
                .iter()
                .any(|(step, key)| *step == target.step && *key == section.as_str()),
        }
    }

    /// Render the prompt.
    ///
    /// # Errors
    ///
    /// [`PromptError::EmptyCoaching`] when the coaching text is blank. A
    /// prompt without its rubric is never sent.
    pub fn build(&self, input: &PromptInput<'_>) -> Result<String, PromptError> {
        let coaching = input.coaching.trim();
        if coaching.is_empty() {
            return Err(PromptError::EmptyCoaching(input.target.knowledge_hint()));
        }

        let mut out = String::new();
        let heading = target_heading(input.target, input.section_label);

        out.push_str("# QUALITY AI COACH - 8D METHODOLOGY VALIDATOR\n\n");
        out.push_str("You are an assistant specialised in industrial quality management.\n");
        out.push_str("Your role is to VALIDATE the user's answers against 8D methodology standards.\n");
        let _ = writeln!(out, "Scope: {}", heading);
        if input.target.section.is_some() {
            out.push_str(
                "Validate ONLY the fields of this section. Other sections of the step are validated separately.\n",
            );
        }
        out.push('\n');

        if let Some(rules) = input
            .floor_rules
            .map(str::trim)
            .filter(|r| !r.is_empty() && Self::includes_floor_rules(input.target))
        {
            out.push_str("## FLOOR COMPLIANCE RULES (MANDATORY)\n");
            out.push_str(rules);
            out.push_str("\n\nWhen an answer obviously deviates from these rules:\n");
            out.push_str("- ask \"Is it normal that...?\" rather than accusing\n");
            out.push_str("- react only to OBVIOUS deviations\n");
            out.push_str("- record each one in rules_violations\n");
            let _ = writeln!(out, "{}\n", SEPARATOR);
        }

        let _ = writeln!(out, "## COACHING DOCUMENT FOR {}", heading);
        out.push_str(coaching);
        let _ = write!(out, "\n\n{}\n\n", SEPARATOR);

        out.push_str(&render_context(input.complaint));
        let _ = write!(out, "\n{}\n\n", SEPARATOR);

        out.push_str("## USER'S RESPONSE TO VALIDATE\n");
        out.push_str(&render_data(input.data));
        let _ = write!(out, "\n\n{}\n\n", SEPARATOR);

        out.push_str("## MINIMUM PASS CRITERIA\n");
        out.push_str(minimum_pass_criteria(input.target));
        let _ = write!(out, "\n\n{}\n\n", SEPARATOR);

        out.push_str(MISSION);
        out.push_str(RESPONSE_CONTRACT);
        out.push_str(STYLE_AND_LANGUAGE);

        Ok(out)
    }
}

fn target_heading(target: &ValidationTarget, label: Option<&str>) -> String {
    let step = format!("{} - {}", target.step, target.step.name());
    match (&target.section, label) {
        (Some(section), Some(label)) => format!("{} / {} ({})", step, label, section),
        (Some(section), None) => format!("{} / {}", step, section),
        (None, _) => step,
    }
}

const MISSION: &str = "## YOUR MISSION

Analyse the response for:

1. COMPLETENESS: every field the coaching document requires is filled
2. QUALITY: descriptions are clear, precise and professional
3. QUANTIFICATION: measurable data (%, quantities, dates, metrics)
4. CONSISTENCY: coherent with the complaint context
5. STANDARDS: 8D good practice is respected
6. RULES COMPLIANCE: no obvious floor rule violation (when rules are given)

PASS when the minimum pass criteria are met and the response is specific.
FAIL when critical information is missing, vague, unquantified or inconsistent.

";

const RESPONSE_CONTRACT: &str = r#"## RESPONSE FORMAT (JSON ONLY)

Return STRICTLY this JSON object and nothing else:

{
    "decision": "pass" or "fail",
    "missing_fields": ["field names that are empty"],
    "incomplete_fields": ["field that needs more detail, and why"],
    "quality_issues": ["specific quality problem"],
    "rules_violations": ["Rule X: explanation (ask: is it normal that...?)"],
    "suggestions": ["concrete, actionable suggestion"],
    "field_improvements": {
        "field_name": "improved example text for that field"
    },
    "overall_assessment": "short professional assessment",
    "language_detected": "ISO 639-1 code of the user's language"
}

"decision" is mandatory and must be exactly "pass" or "fail".

"#;

const STYLE_AND_LANGUAGE: &str = "## COACHING STYLE

- Be demanding but constructive
- Point to the specific improvement needed
- Use the complaint context to make suggestions relevant
- Give concrete examples in field_improvements

## LANGUAGE

- Detect the user's language from their answers
- Write every text field in that language
- Set language_detected accordingly

Now validate the response.
";

/// Render the complaint context block.
pub fn render_context(context: &ComplaintContext) -> String {
    if context.is_empty() {
        return "No complaint context available\n".to_string();
    }

    let or_na = |s: &str| if s.trim().is_empty() { "N/A".to_string() } else { s.trim().to_string() };

    let mut out = String::from("COMPLAINT CONTEXT:\n");
    let _ = writeln!(out, "Problem: {}", or_na(&context.complaint_name));
    let _ = writeln!(out, "Description: {}", or_na(&context.complaint_description));
    let _ = writeln!(out, "Product Line: {}", or_na(&context.product_line));
    let _ = writeln!(out, "Plant: {}", or_na(&context.plant));
    let _ = writeln!(out, "Defects: {}", or_na(&context.defects));
    out
}

/// Render step data as readable text: one entry per field, nested
/// objects as indented lines, lists of objects as tables.
pub fn render_data(data: &StepData) -> String {
    if data.is_empty() {
        return "No data provided".to_string();
    }

    data.iter()
        .map(|(key, value)| render_field(&title_case(key), value))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_field(label: &str, value: &JsonValue) -> String {
    if is_blank(value) {
        return format!("{}: {}", label, NOT_PROVIDED);
    }

    match value {
        JsonValue::Object(map) => {
            let mut out = format!("{}:", label);
            for (key, inner) in map {
                let _ = write!(out, "\n  - {}: {}", title_case(key), cell(inner, true));
            }
            out
        }
        JsonValue::Array(items) if items.iter().all(JsonValue::is_object) => {
            format!("{}:\n{}", label, render_table(items))
        }
        JsonValue::Array(items) => {
            let mut out = format!("{}:", label);
            for item in items {
                let _ = write!(out, "\n  - {}", cell(item, true));
            }
            out
        }
        scalar => format!("{}: {}", label, cell(scalar, true)),
    }
}

fn render_table(rows: &[JsonValue]) -> String {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows.iter().filter_map(JsonValue::as_object) {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let mut out = String::new();
    let header: Vec<String> = columns.iter().map(|c| title_case(c)).collect();
    let _ = writeln!(out, "  | {} |", header.join(" | "));
    let _ = write!(out, "  |{}", " --- |".repeat(columns.len()));
    for row in rows.iter().filter_map(JsonValue::as_object) {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| row.get(*c).map(|v| cell(v, false)).unwrap_or_default())
            .collect();
        let _ = write!(out, "\n  | {} |", cells.join(" | "));
    }
    out
}

/// Inline text for a single value.
fn cell(value: &JsonValue, mark_blank: bool) -> String {
    match value {
        v if is_blank(v) => {
            if mark_blank {
                NOT_PROVIDED.to_string()
            } else {
                String::new()
            }
        }
        JsonValue::String(s) => s.trim().replace('\n', " "),
        JsonValue::Bool(true) => "yes".to_string(),
        JsonValue::Bool(false) => "no".to_string(),
        JsonValue::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn is_blank(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) => s.trim().is_empty(),
        JsonValue::Array(a) => a.is_empty(),
        JsonValue::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// `five_w_2h` -> `Five W 2h`
pub fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: JsonValue) -> StepData {
        value.as_object().cloned().unwrap()
    }

    fn context() -> ComplaintContext {
        ComplaintContext {
            complaint_name: "Burr on bracket".into(),
            complaint_description: "Customer found sharp edges".into(),
            product_line: "Brackets".into(),
            plant: "Plant 2".into(),
            defects: String::new(),
        }
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("five_w_2h"), "Five W 2h");
        assert_eq!(title_case("is_is_not_factors"), "Is Is Not Factors");
        assert_eq!(title_case("ll_conclusion"), "Ll Conclusion");
    }

    #[test]
    fn test_blocks_in_fixed_order() {
        let target = ValidationTarget::section(StepCode::D4, "four_m_occurrence");
        let complaint = context();
        let step_data = data(json!({"root_cause_occurrence": {"root_cause": "Worn punch"}}));
        let input = PromptInput {
            target: &target,
            section_label: Some("Root Cause for Occurrence"),
            coaching: "Use 5 Whys down to a systemic cause.",
            floor_rules: Some("Rule 1: wear safety glasses"),
            complaint: &complaint,
            data: &step_data,
        };

        let prompt = PromptBuilder::new().build(&input).unwrap();

        let order = [
            "# QUALITY AI COACH",
            "## FLOOR COMPLIANCE RULES",
            "## COACHING DOCUMENT FOR D4 - Determine Root Cause / Root Cause for Occurrence (four_m_occurrence)",
            "COMPLAINT CONTEXT:",
            "## USER'S RESPONSE TO VALIDATE",
            "## MINIMUM PASS CRITERIA",
            "## YOUR MISSION",
            "## RESPONSE FORMAT (JSON ONLY)",
            "## LANGUAGE",
        ];
        let positions: Vec<usize> = order
            .iter()
            .map(|needle| prompt.find(needle).unwrap_or_else(|| panic!("missing {needle}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert!(prompt.contains("Defects: N/A"));
        assert!(prompt.contains("  - Root Cause: Worn punch"));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let target = ValidationTarget::step(StepCode::D8);
        let complaint = ComplaintContext::default();
        let step_data = data(json!({"closure_statement": "Closed", "signatures": null}));
        let input = PromptInput {
            target: &target,
            section_label: None,
            coaching: "coaching",
            floor_rules: None,
            complaint: &complaint,
            data: &step_data,
        };

        let builder = PromptBuilder::new();
        assert_eq!(builder.build(&input).unwrap(), builder.build(&input).unwrap());
    }

    #[test]
    fn test_floor_rules_allow_list() {
        assert!(PromptBuilder::includes_floor_rules(&ValidationTarget::step(StepCode::D2)));
        assert!(PromptBuilder::includes_floor_rules(&ValidationTarget::section(StepCode::D3, "restart")));
        assert!(!PromptBuilder::includes_floor_rules(&ValidationTarget::section(StepCode::D2, "five_w_2h")));
        assert!(!PromptBuilder::includes_floor_rules(&ValidationTarget::section(StepCode::D7, "knowledge")));

        let target = ValidationTarget::section(StepCode::D2, "five_w_2h");
        let complaint = context();
        let step_data = StepData::new();
        let input = PromptInput {
            target: &target,
            section_label: None,
            coaching: "coaching",
            floor_rules: Some("Rule 1"),
            complaint: &complaint,
            data: &step_data,
        };
        let prompt = PromptBuilder::new().build(&input).unwrap();
        assert!(!prompt.contains("FLOOR COMPLIANCE"));
        assert!(prompt.contains("No data provided"));
    }

    #[test]
    fn test_blank_coaching_is_an_error() {
        let target = ValidationTarget::section(StepCode::D2, "deviation");
        let complaint = context();
        let step_data = StepData::new();
        let input = PromptInput {
            target: &target,
            section_label: None,
            coaching: "  \n ",
            floor_rules: None,
            complaint: &complaint,
            data: &step_data,
        };

        assert_eq!(
            PromptBuilder::new().build(&input).unwrap_err(),
            PromptError::EmptyCoaching("D2_deviation_coaching_validation".into())
        );
    }

    #[test]
    fn test_empty_context() {
        assert_eq!(
            render_context(&ComplaintContext::default()),
            "No complaint context available\n"
        );
    }

    #[test]
    fn test_render_data_shapes() {
        let rendered = render_data(&data(json!({
            "problem_description": "Burr",
            "evidence_documents": null,
            "is_is_not_factors": [
                {"factor": "Lot", "is_problem": "L42"},
                {"factor": "Time", "is_not_problem": "Before March"}
            ],
            "tags": ["a", "b"],
            "defected_part_status": {"returned": true, "isolated_location": ""}
        })));

        let expected = "Problem Description: Burr\n\
Evidence Documents: (not provided)\n\
Is Is Not Factors:\n  \
| Factor | Is Problem | Is Not Problem |\n  \
| --- | --- | --- |\n  \
| Lot | L42 |  |\n  \
| Time |  | Before March |\n\
Tags:\n  - a\n  - b\n\
Defected Part Status:\n  - Returned: yes\n  - Isolated Location: (not provided)";

        assert_eq!(rendered, expected);
    }
}
