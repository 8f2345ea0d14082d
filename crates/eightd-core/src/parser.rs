//! Response parser for model output.
//!
//! The model is asked for a bare JSON object but does not always comply.
//! Parsing tries the raw text first, then one recovery pass that extracts
//! the outermost `{...}` span. `decision` is the only field that cannot be
//! defaulted; everything else falls back to empty values.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::types::Decision;
use crate::verdict::{FieldImprovements, Verdict};

lazy_static! {
    /// First `{` to last `}`, across lines.
    static ref JSON_SPAN: Regex = Regex::new(r"(?s)\{.*\}").expect("valid regex");
}

/// Errors for model output that cannot become a verdict.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    #[error("No JSON object found in model response")]
    NoJson,

    #[error("Model response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Model response is not a JSON object")]
    NotAnObject,

    #[error("Model response has no decision field")]
    MissingDecision,

    #[error("Model response has invalid decision: {0}")]
    InvalidDecision(String),
}

/// Parses raw model text into a [`Verdict`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, raw: &str) -> Result<Verdict, ResponseError> {
        let value = match serde_json::from_str::<JsonValue>(raw) {
            Ok(value) => value,
            Err(direct) => {
                tracing::warn!(error = %direct, "Model response is not bare JSON, attempting recovery");
                let span = JSON_SPAN.find(raw).ok_or(ResponseError::NoJson)?;
                serde_json::from_str(span.as_str())
                    .map_err(|e| ResponseError::InvalidJson(e.to_string()))?
            }
        };

        let JsonValue::Object(object) = value else {
            return Err(ResponseError::NotAnObject);
        };

        let decision = match object.get("decision") {
            None | Some(JsonValue::Null) => return Err(ResponseError::MissingDecision),
            Some(JsonValue::String(s)) => s
                .parse::<Decision>()
                .map_err(|_| ResponseError::InvalidDecision(s.clone()))?,
            Some(other) => return Err(ResponseError::InvalidDecision(other.to_string())),
        };

        Ok(Verdict {
            decision,
            missing_fields: string_list(&object, "missing_fields"),
            incomplete_fields: string_list(&object, "incomplete_fields"),
            quality_issues: string_list(&object, "quality_issues"),
            rules_violations: string_list(&object, "rules_violations"),
            suggestions: string_list(&object, "suggestions"),
            field_improvements: improvements(&object),
            overall_assessment: text(&object, "overall_assessment"),
            language_detected: text(&object, "language_detected"),
        })
    }
}

/// A list of strings; a lone string becomes a one-item list.
fn string_list(object: &Map<String, JsonValue>, key: &str) -> Vec<String> {
    match object.get(key) {
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter(|item| !item.is_null())
            .map(|item| match item {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(JsonValue::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn improvements(object: &Map<String, JsonValue>) -> FieldImprovements {
    match object.get("field_improvements") {
        Some(JsonValue::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        _ => FieldImprovements::new(),
    }
}

fn text(object: &Map<String, JsonValue>, key: &str) -> String {
    match object.get(key) {
        Some(JsonValue::String(s)) => s.clone(),
        None | Some(JsonValue::Null) => String::new(),
        Some(other) => other.to_string(),
    }
}
