//! Response normalization: untrusted reply text → complete [`AnalysisResult`].
//!
//! The model is *asked* for JSON matching the schema in
//! [`crate::pipeline::request`], but nothing forces it to comply. Replies
//! arrive wrapped in code fences, with fields missing, with statuses in the
//! wrong language, or cut off mid-object when the token budget runs out.
//! This module turns any of that into a result the presentation layer can
//! render without special cases.
//!
//! ## Steps
//!
//! 1. Pull the text out of the reply envelope (`"{}"` if absent).
//! 2. Strip one surrounding code fence.
//! 3. Strict JSON parse.
//! 4. Validate the shape (object with a `results` array), then default every
//!    field independently.
//! 5. On parse or shape failure, hand the cleaned text to
//!    [`crate::pipeline::recover`] and attach an [`ExtractionIssue`].
//!
//! Nothing here returns an error: every path ends in a full result.

use crate::error::ExtractionIssue;
use crate::model::{AnalysisItem, AnalysisResult, LabStatus};
use crate::pipeline::recover;
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const DEFAULT_PATIENT_NAME: &str = "No especificado";
pub const DEFAULT_TEST_DATE: &str = "No especificada";
pub const DEFAULT_LABORATORY: &str = "No especificado";
pub const DEFAULT_DOCTOR: &str = "No especificado";
pub const DEFAULT_SUMMARY: &str =
    "Análisis procesado. Consultá con tu médico para una interpretación completa.";
pub const DEFAULT_RECOMMENDATION: &str =
    "Consultá con tu médico para interpretar estos resultados.";
pub const DEFAULT_TEST_NAME: &str = "Sin nombre";

/// An ordered list of keys tried in turn; the first present, non-blank value wins.
#[derive(Debug, Clone, Copy)]
pub struct FieldChain {
    pub keys: &'static [&'static str],
    pub fallback: Option<&'static str>,
}

impl FieldChain {
    /// First defined value along the chain, without the fallback.
    pub fn read(&self, obj: &Map<String, Value>) -> Option<String> {
        self.keys.iter().find_map(|key| text_field(obj, key))
    }

    /// First defined value along the chain, or the fallback.
    pub fn resolve(&self, obj: &Map<String, Value>) -> Option<String> {
        self.read(obj).or_else(|| self.fallback.map(str::to_string))
    }
}

pub const SIMPLIFIED_EXPLANATION: FieldChain = FieldChain {
    keys: &["simplified_explanation", "explanation"],
    fallback: Some("Sin explicación disponible."),
};

pub const CLINICAL_INTERPRETATION: FieldChain = FieldChain {
    keys: &["clinical_interpretation", "explanation"],
    fallback: Some("Sin interpretación clínica disponible."),
};

pub const LEGACY_EXPLANATION: FieldChain = FieldChain {
    keys: &["explanation"],
    fallback: None,
};

/// A normalized result plus the reason it had to be recovered, if it did.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub result: AnalysisResult,
    pub issue: Option<ExtractionIssue>,
}

/// Normalize a raw reply body (the envelope returned by the endpoint).
pub fn normalize_reply(body: &str) -> Normalized {
    normalize_text(&reply_text(body))
}

/// Extract `candidates[0].content.parts[0].text` from the reply envelope.
///
/// Falls back to `"{}"` when the body is not JSON or the field is missing
/// or blank.
pub fn reply_text(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(|v| v.pointer("/candidates/0/content/parts/0/text"))
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            debug!("Reply envelope has no text part; treating as empty object");
            "{}".to_string()
        })
}

/// Strip one leading ```` ```json ```` / ```` ``` ```` marker and one trailing
/// ```` ``` ```` marker, then trim.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let body = match trimmed.strip_prefix("```") {
        Some(rest) => match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        },
        None => trimmed,
    };
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim()
}

/// Normalize model text (the content of the text part).
pub fn normalize_text(text: &str) -> Normalized {
    let cleaned = strip_code_fence(text);

    let issue = match serde_json::from_str::<Value>(cleaned) {
        Ok(value) => match normalize_value(&value) {
            Ok(result) => {
                debug!("Normalized {} result items", result.results.len());
                return Normalized {
                    result,
                    issue: None,
                };
            }
            Err(issue) => issue,
        },
        Err(e) => ExtractionIssue::InvalidJson {
            detail: e.to_string(),
        },
    };

    warn!("Reply could not be read as a report ({}); recovering", issue);
    Normalized {
        result: recover::recover(cleaned),
        issue: Some(issue),
    }
}

/// Validate the shape of a parsed reply and default every field.
///
/// # Errors
/// [`ExtractionIssue::NotAnObject`] or [`ExtractionIssue::MissingResults`]
/// when the value is not an object with a `results` array.
pub fn normalize_value(value: &Value) -> Result<AnalysisResult, ExtractionIssue> {
    let obj = value.as_object().ok_or(ExtractionIssue::NotAnObject)?;
    let results = obj
        .get("results")
        .and_then(Value::as_array)
        .ok_or(ExtractionIssue::MissingResults)?;
    Ok(normalize_object(obj, results))
}

/// Default the top-level fields of a report object whose `results` array has
/// already been located.
pub(crate) fn normalize_object(obj: &Map<String, Value>, results: &[Value]) -> AnalysisResult {
    AnalysisResult {
        patient_name: text_or(obj, "patient_name", DEFAULT_PATIENT_NAME),
        test_date: text_or(obj, "test_date", DEFAULT_TEST_DATE),
        laboratory: text_or(obj, "laboratory", DEFAULT_LABORATORY),
        doctor: text_or(obj, "doctor", DEFAULT_DOCTOR),
        results: results.iter().map(normalize_item).collect(),
        summary: text_or(obj, "summary", DEFAULT_SUMMARY),
        recommendations: recommendations(obj.get("recommendations")),
        confidence: obj.get("confidence").and_then(confidence),
    }
}

/// Default one result item. Non-object entries become all-default items.
pub(crate) fn normalize_item(value: &Value) -> AnalysisItem {
    let empty = Map::new();
    let obj = value.as_object().unwrap_or(&empty);

    let status = obj
        .get("status")
        .and_then(Value::as_str)
        .and_then(LabStatus::parse)
        .unwrap_or_default();

    AnalysisItem {
        test_name: text_or(obj, "test_name", DEFAULT_TEST_NAME),
        value: text_field(obj, "value"),
        unit: text_field(obj, "unit"),
        reference_range: text_field(obj, "reference_range"),
        status,
        simplified_explanation: SIMPLIFIED_EXPLANATION.resolve(obj).unwrap_or_default(),
        clinical_interpretation: CLINICAL_INTERPRETATION.resolve(obj).unwrap_or_default(),
        explanation: LEGACY_EXPLANATION.resolve(obj),
        warning: if status.is_abnormal() {
            text_field(obj, "warning")
        } else {
            None
        },
    }
}

/// Read a field as text: non-blank strings (trimmed) and numbers qualify.
pub(crate) fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_or(obj: &Map<String, Value>, key: &str, fallback: &str) -> String {
    text_field(obj, key).unwrap_or_else(|| fallback.to_string())
}

fn recommendations(value: Option<&Value>) -> Vec<String> {
    let list: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    };
    if list.is_empty() {
        vec![DEFAULT_RECOMMENDATION.to_string()]
    } else {
        list
    }
}

fn confidence(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    raw.is_finite().then(|| raw.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(text: &str) -> String {
        json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] }).to_string()
    }

    #[test]
    fn invalid_status_is_coerced_and_recommendations_defaulted() {
        let out = normalize_text(
            r#"{"patient_name":"Ana","results":[{"test_name":"Glucosa","status":"ALTA"}],"summary":"ok"}"#,
        );
        assert!(out.issue.is_none());
        let r = out.result;
        assert_eq!(r.patient_name, "Ana");
        assert_eq!(r.summary, "ok");
        assert_eq!(r.results.len(), 1);
        assert_eq!(r.results[0].test_name, "Glucosa");
        assert_eq!(r.results[0].status, LabStatus::Normal);
        assert_eq!(r.recommendations, vec![DEFAULT_RECOMMENDATION.to_string()]);
    }

    #[test]
    fn fenced_empty_results_get_placeholders() {
        let out = normalize_text("```json\n{\"results\":[]}\n```");
        assert!(out.issue.is_none());
        let r = out.result;
        assert!(r.results.is_empty());
        assert_eq!(r.summary, DEFAULT_SUMMARY);
        assert_eq!(r.laboratory, DEFAULT_LABORATORY);
        assert_eq!(r.patient_name, DEFAULT_PATIENT_NAME);
        assert_eq!(r.test_date, DEFAULT_TEST_DATE);
    }

    #[test]
    fn fence_is_stripped_only_once() {
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```JSON\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
        // A nested fence is left alone after the outer one goes.
        assert_eq!(strip_code_fence("```json\n```json\n{}\n```\n```"), "```json\n{}\n```");
    }

    #[test]
    fn unparsable_text_never_fails() {
        let out = normalize_text("not json at all");
        assert!(matches!(out.issue, Some(ExtractionIssue::InvalidJson { .. })));
        assert!(out.result.results.is_empty());
        assert_eq!(out.result.summary, recover::FORMAT_NOT_RECOGNIZED_SUMMARY);
        assert!(!out.result.recommendations.is_empty());
    }

    #[test]
    fn shape_failures_are_recovered() {
        let out = normalize_text("[1, 2, 3]");
        assert_eq!(out.issue, Some(ExtractionIssue::NotAnObject));
        assert!(out.result.results.is_empty());

        let out = normalize_text(r#"{"patient_name":"Ana","results":"none"}"#);
        assert_eq!(out.issue, Some(ExtractionIssue::MissingResults));
    }

    #[test]
    fn every_status_lands_in_taxonomy() {
        let out = normalize_text(
            r#"{"results":[
                {"test_name":"a","status":"high"},
                {"test_name":"b","status":"LOW"},
                {"test_name":"c","status":"critical"},
                {"test_name":"d","status":"elevado"},
                {"test_name":"e","status":7},
                {"test_name":"f"}
            ]}"#,
        );
        let statuses: Vec<LabStatus> = out.result.results.iter().map(|i| i.status).collect();
        assert_eq!(
            statuses,
            [
                LabStatus::High,
                LabStatus::Low,
                LabStatus::Critical,
                LabStatus::Normal,
                LabStatus::Normal,
                LabStatus::Normal
            ]
        );
    }

    #[test]
    fn items_are_never_dropped() {
        let out = normalize_text(r#"{"results":[null, "Glucosa", 3, {}]}"#);
        assert_eq!(out.result.results.len(), 4);
        for item in &out.result.results {
            assert_eq!(item.test_name, DEFAULT_TEST_NAME);
            assert_eq!(item.status, LabStatus::Normal);
            assert_eq!(item.simplified_explanation, "Sin explicación disponible.");
        }
    }

    #[test]
    fn explanation_chain_prefers_current_then_legacy() {
        let out = normalize_text(
            r#"{"results":[
                {"test_name":"a","simplified_explanation":"simple","clinical_interpretation":"clinica","explanation":"tecnica"},
                {"test_name":"b","explanation":"tecnica"},
                {"test_name":"c","simplified_explanation":"  ","explanation":"tecnica"}
            ]}"#,
        );
        let r = &out.result.results;
        assert_eq!(r[0].simplified_explanation, "simple");
        assert_eq!(r[0].clinical_interpretation, "clinica");
        assert_eq!(r[0].explanation.as_deref(), Some("tecnica"));
        assert_eq!(r[1].simplified_explanation, "tecnica");
        assert_eq!(r[1].clinical_interpretation, "tecnica");
        assert_eq!(r[2].simplified_explanation, "tecnica");
    }

    #[test]
    fn numeric_values_become_text() {
        let out = normalize_text(
            r#"{"results":[{"test_name":"Glucosa","value":110,"unit":"mg/dL","reference_range":"70-100","status":"high"}]}"#,
        );
        let item = &out.result.results[0];
        assert_eq!(item.value.as_deref(), Some("110"));
        assert_eq!(item.unit.as_deref(), Some("mg/dL"));
        assert_eq!(item.reference_range.as_deref(), Some("70-100"));
    }

    #[test]
    fn warning_only_kept_for_abnormal_items() {
        let out = normalize_text(
            r#"{"results":[
                {"test_name":"a","status":"normal","warning":"ojo"},
                {"test_name":"b","status":"critical","warning":"consultá urgente"},
                {"test_name":"c","status":"high","warning":""}
            ]}"#,
        );
        let r = &out.result.results;
        assert_eq!(r[0].warning, None);
        assert_eq!(r[1].warning.as_deref(), Some("consultá urgente"));
        assert_eq!(r[2].warning, None);
    }

    #[test]
    fn recommendations_filtering() {
        let out = normalize_text(r#"{"results":[],"recommendations":["  ", 4, "Hidratarse"]}"#);
        assert_eq!(out.result.recommendations, vec!["Hidratarse".to_string()]);

        let out = normalize_text(r#"{"results":[],"recommendations":[]}"#);
        assert_eq!(out.result.recommendations, vec![DEFAULT_RECOMMENDATION.to_string()]);
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(normalize_text(r#"{"results":[],"confidence":1.7}"#).result.confidence, Some(1.0));
        assert_eq!(normalize_text(r#"{"results":[],"confidence":-2}"#).result.confidence, Some(0.0));
        assert_eq!(normalize_text(r#"{"results":[],"confidence":"0.8"}"#).result.confidence, Some(0.8));
        assert_eq!(normalize_text(r#"{"results":[]}"#).result.confidence, None);
    }

    #[test]
    fn renormalizing_is_a_no_op() {
        let first = normalize_text(
            r#"{"patient_name":" Ana ","results":[
                {"test_name":"Glucosa","value":110,"status":"HIGH","warning":"alta","explanation":"tec"},
                {"test_name":"Urea","status":"alta","warning":"x"},
                null
            ],"summary":"ok","confidence":3}"#,
        )
        .result;
        let json = serde_json::to_string(&first).unwrap();
        let second = normalize_text(&json);
        assert!(second.issue.is_none());
        assert_eq!(second.result, first);
    }

    #[test]
    fn envelope_text_is_extracted() {
        assert_eq!(reply_text(&envelope("{\"results\":[]}")), "{\"results\":[]}");
        assert_eq!(reply_text("{}"), "{}");
        assert_eq!(reply_text("<html>502</html>"), "{}");
        assert_eq!(reply_text(r#"{"candidates":[{"content":{"parts":[{"text":5}]}}]}"#), "{}");
    }

    #[test]
    fn missing_text_normalizes_to_fallback() {
        let out = normalize_reply(r#"{"candidates":[]}"#);
        assert_eq!(out.issue, Some(ExtractionIssue::MissingResults));
        assert!(out.result.results.is_empty());
    }

    #[test]
    fn blank_text_part_counts_as_missing() {
        assert_eq!(reply_text(&envelope("")), "{}");
        assert_eq!(reply_text(&envelope("  \n")), "{}");
        let out = normalize_reply(&envelope(""));
        assert_eq!(out.issue, Some(ExtractionIssue::MissingResults));
        assert!(out.result.results.is_empty());
    }

    #[test]
    fn full_reply_round() {
        let text = "```json\n{\"patient_name\":\"Ana\",\"results\":[{\"test_name\":\"Hemoglobina\",\"value\":\"13.5\",\"status\":\"normal\"}],\"summary\":\"Todo bien\"}\n```";
        let out = normalize_reply(&envelope(text));
        assert!(out.issue.is_none());
        assert_eq!(out.result.results[0].value.as_deref(), Some("13.5"));
        assert_eq!(out.result.summary, "Todo bien");
    }
}
