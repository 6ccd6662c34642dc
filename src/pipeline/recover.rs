//! Fallback recovery for replies that are not a well-formed report.
//!
//! Runs only after strict parsing or shape validation failed. The goal is
//! modest: salvage whatever is plainly readable and still hand back a
//! complete, defaulted [`AnalysisResult`]. Rules, in order:
//!
//! 1. Light JSON repair: take the outermost `{…}` fragment, drop trailing
//!    commas, and re-parse. Catches prose around the object.
//! 2. Labelled fields: quoted JSON keys (`"patient_name": "…"`) from
//!    truncated objects, then `Paciente:`-style lines, case-insensitive.
//! 3. Item salvage: every object holding a `"test_name"` key is read on its
//!    own (up to its closing brace, or the end of a truncated reply) and
//!    pushed through the normal item defaulting.
//! 4. No medical keyword anywhere → empty results and a static
//!    "format not recognized" summary.

use crate::model::AnalysisResult;
use crate::pipeline::normalize::{normalize_object, normalize_value};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

/// Summary used when nothing in the reply looks like a lab report.
pub const FORMAT_NOT_RECOGNIZED_SUMMARY: &str = "No se pudo reconocer el formato de la respuesta. \
Verificá que el PDF sea un análisis de laboratorio legible e intentá nuevamente.";

/// Summary used when part of a lab report could be read.
pub const PARTIAL_SUMMARY: &str = "La respuesta de la IA llegó incompleta; se muestran los datos \
que pudieron recuperarse. Consultá con tu médico para una interpretación completa.";

/// Words whose presence marks the text as a lab report.
const MEDICAL_KEYWORDS: &[&str] = &[
    "test_name",
    "paciente",
    "laboratorio",
    "análisis",
    "analisis",
    "hemograma",
    "hemoglobina",
    "hematocrito",
    "leucocitos",
    "plaquetas",
    "glucosa",
    "colesterol",
    "triglicéridos",
    "trigliceridos",
    "creatinina",
    "urea",
    "rango de referencia",
    "mg/dl",
    "g/dl",
];

/// Top-level fields and the line labels that introduce them.
const LABELLED_FIELDS: &[(&str, &[&str])] = &[
    ("patient_name", &["paciente"]),
    ("test_date", &["fecha"]),
    ("laboratory", &["laboratorio"]),
    ("doctor", &["médico", "medico", "doctor"]),
];

/// Item fields read from a salvaged fragment.
const ITEM_FIELDS: &[&str] = &[
    "test_name",
    "value",
    "unit",
    "reference_range",
    "status",
    "simplified_explanation",
    "clinical_interpretation",
    "explanation",
    "warning",
];

static RE_TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*[}\]])").unwrap());

/// `"key": <string | number | null>` with the literal kept verbatim.
static RE_SCALAR_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""([A-Za-z_]+)"\s*:\s*("(?:[^"\\]|\\.)*"|-?\d+(?:\.\d+)?|null)"#).unwrap()
});

static RE_TEST_NAME_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r#""test_name"\s*:"#).unwrap());

static RE_LABELS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    LABELLED_FIELDS
        .iter()
        .map(|(field, labels)| {
            let pattern = format!(r"(?im)\b(?:{})\s*:\s*([^\r\n]+)", labels.join("|"));
            (*field, Regex::new(&pattern).unwrap())
        })
        .collect()
});

/// Build a complete fallback result from text that failed normalization.
pub fn recover(cleaned: &str) -> AnalysisResult {
    if let Some(result) = repair_json(cleaned) {
        debug!("Recovered report by JSON repair");
        return result;
    }

    let mut top = Map::new();
    for (field, value) in labelled_fields(cleaned) {
        top.insert(field.to_string(), Value::String(value));
    }

    let items = salvage_items(cleaned);
    let recognised = !items.is_empty() || has_medical_keywords(cleaned);

    let results: Vec<Value> = if recognised { items } else { Vec::new() };
    if recognised {
        if let Some(summary) = quoted_field(cleaned, "summary") {
            top.insert("summary".into(), Value::String(summary));
        } else {
            top.insert("summary".into(), Value::String(PARTIAL_SUMMARY.into()));
        }
    } else {
        top.insert(
            "summary".into(),
            Value::String(FORMAT_NOT_RECOGNIZED_SUMMARY.into()),
        );
    }

    debug!(
        "Fallback recovery: recognised={}, {} items, {} labelled fields",
        recognised,
        results.len(),
        top.len() - 1
    );
    normalize_object(&top, &results)
}

/// Re-parse the outermost object after removing trailing commas.
fn repair_json(text: &str) -> Option<AnalysisResult> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start >= end {
        return None;
    }
    let fragment = RE_TRAILING_COMMA.replace_all(&text[start..=end], "$1");
    let value: Value = serde_json::from_str(&fragment).ok()?;
    normalize_value(&value).ok()
}

fn has_medical_keywords(text: &str) -> bool {
    let lower = text.to_lowercase();
    MEDICAL_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Top-level fields from quoted keys first, then from labelled lines.
fn labelled_fields(text: &str) -> Vec<(&'static str, String)> {
    RE_LABELS
        .iter()
        .filter_map(|(field, re)| {
            quoted_field(text, field)
                .or_else(|| {
                    re.captures(text)
                        .map(|c| clean_label_value(&c[1]))
                        .filter(|v| !v.is_empty())
                })
                .map(|v| (*field, v))
        })
        .collect()
}

fn clean_label_value(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(',')
        .trim_matches(|c: char| c == '"' || c.is_whitespace())
        .to_string()
}

/// Value of the first complete `"key": "…"` pair.
fn quoted_field(text: &str, key: &str) -> Option<String> {
    RE_SCALAR_PAIR
        .captures_iter(text)
        .filter(|c| &c[1] == key)
        .find_map(|c| match serde_json::from_str::<Value>(&c[2]).ok()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
}

/// One item per object holding a `"test_name"` key, read only from that
/// object's span. Key order inside the object does not matter.
fn salvage_items(text: &str) -> Vec<Value> {
    let spans = object_spans(text);
    let mut taken: Vec<usize> = Vec::new();
    RE_TEST_NAME_KEY
        .find_iter(text)
        .filter_map(|m| {
            let (start, end) = enclosing_span(&spans, m.start())?;
            if taken.contains(&start) {
                return None;
            }
            taken.push(start);
            let mut item = Map::new();
            for caps in RE_SCALAR_PAIR.captures_iter(&text[start..end]) {
                let key = &caps[1];
                if !ITEM_FIELDS.contains(&key) || item.contains_key(key) {
                    continue;
                }
                if let Ok(value) = serde_json::from_str::<Value>(&caps[2]) {
                    item.insert(key.to_string(), value);
                }
            }
            (!item.is_empty()).then_some(Value::Object(item))
        })
        .collect()
}

/// Byte spans of every `{…}` object, skipping braces inside strings.
/// Objects left open by truncation run to the end of the text.
fn object_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for (i, b) in text.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => open.push(i),
            b'}' => {
                if let Some(start) = open.pop() {
                    spans.push((start, i + 1));
                }
            }
            _ => {}
        }
    }
    spans.extend(open.into_iter().map(|start| (start, text.len())));
    spans
}

/// Innermost span containing `pos`.
fn enclosing_span(spans: &[(usize, usize)], pos: usize) -> Option<(usize, usize)> {
    spans
        .iter()
        .filter(|(start, end)| *start < pos && pos < *end)
        .max_by_key(|(start, _)| *start)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LabStatus;
    use crate::pipeline::normalize::{DEFAULT_PATIENT_NAME, DEFAULT_RECOMMENDATION, DEFAULT_TEST_NAME};

    #[test]
    fn unrecognised_text_gives_empty_results() {
        let r = recover("not json at all");
        assert!(r.results.is_empty());
        assert_eq!(r.summary, FORMAT_NOT_RECOGNIZED_SUMMARY);
        assert_eq!(r.patient_name, DEFAULT_PATIENT_NAME);
        assert_eq!(r.recommendations, vec![DEFAULT_RECOMMENDATION.to_string()]);
    }

    #[test]
    fn labelled_lines_are_read_case_insensitively() {
        let text = "Informe\nPACIENTE: María Gómez\nFecha: 2024-03-05\nLaboratorio: Central\nMédico: Dr. Pérez\nGlucosa 110";
        let r = recover(text);
        assert_eq!(r.patient_name, "María Gómez");
        assert_eq!(r.test_date, "2024-03-05");
        assert_eq!(r.laboratory, "Central");
        assert_eq!(r.doctor, "Dr. Pérez");
        assert!(r.results.is_empty());
        assert_eq!(r.summary, PARTIAL_SUMMARY);
    }

    #[test]
    fn prose_around_object_is_repaired() {
        let text = "Aquí está el resultado: {\"patient_name\":\"Ana\",\"results\":[{\"test_name\":\"Urea\",\"status\":\"low\"},],} Saludos";
        let r = recover(text);
        assert_eq!(r.patient_name, "Ana");
        assert_eq!(r.results.len(), 1);
        assert_eq!(r.results[0].status, LabStatus::Low);
    }

    #[test]
    fn truncated_json_items_are_salvaged() {
        let text = r#"{"patient_name":"Juan Pérez","laboratory":"Lab \"Sur\"","results":[
            {"test_name":"Hemoglobina","value":"13.5","unit":"g/dL","status":"normal"},
            {"test_name":"Glucosa","value":126,"unit":"mg/dL","status":"high","warning":"Valor elevado"},
            {"test_name":"Creatinina","value":"0.9","status":"crit"#;
        let r = recover(text);
        assert_eq!(r.patient_name, "Juan Pérez");
        assert_eq!(r.laboratory, "Lab \"Sur\"");
        assert_eq!(r.results.len(), 3);
        assert_eq!(r.results[0].test_name, "Hemoglobina");
        assert_eq!(r.results[1].value.as_deref(), Some("126"));
        assert_eq!(r.results[1].status, LabStatus::High);
        assert_eq!(r.results[1].warning.as_deref(), Some("Valor elevado"));
        // Truncated status string is not a whitelisted value.
        assert_eq!(r.results[2].test_name, "Creatinina");
        assert_eq!(r.results[2].status, LabStatus::Normal);
        assert_eq!(r.summary, PARTIAL_SUMMARY);
    }

    #[test]
    fn truncated_items_keep_their_own_fields() {
        let text = r#"{"results":[{"test_name":"Hemo"#;
        let r = recover(text);
        assert!(r.results.is_empty(), "object without any complete field is skipped");

        let text = r#"{"results":[{"value":"5","status":"low","test_name":"Pla"#;
        let r = recover(text);
        assert_eq!(r.results.len(), 1);
        assert_eq!(r.results[0].test_name, DEFAULT_TEST_NAME);
        assert_eq!(r.results[0].value.as_deref(), Some("5"));
        assert_eq!(r.results[0].status, LabStatus::Low);

        let text = r#"{"results":[{"test_name":"Pla", "value":"5", "status":"low"}"#;
        let r = recover(text);
        assert_eq!(r.results.len(), 1);
        assert_eq!(r.results[0].test_name, "Pla");
    }

    #[test]
    fn alphabetical_keys_stay_with_their_item() {
        let text = r#"{"patient_name":"Ana","results":[
            {"simplified_explanation":"ok","status":"normal","test_name":"Glucosa","value":"90"},
            {"clinical_interpretation":"Hiperpotasemia","reference_range":"3.5-5.1","simplified_explanation":"urgente","status":"critical","test_name":"Potasio","value":"7.1"},
            {"simplified_explanation":"bajo","status":"low","test_name":"Sodio","value":"12"#;
        let r = recover(text);
        assert_eq!(r.patient_name, "Ana");
        assert_eq!(r.results.len(), 3);

        let glucosa = &r.results[0];
        assert_eq!(glucosa.test_name, "Glucosa");
        assert_eq!(glucosa.status, LabStatus::Normal);
        assert_eq!(glucosa.simplified_explanation, "ok");
        assert_eq!(glucosa.value.as_deref(), Some("90"));
        assert!(glucosa.reference_range.is_none());

        let potasio = &r.results[1];
        assert_eq!(potasio.status, LabStatus::Critical);
        assert_eq!(potasio.simplified_explanation, "urgente");
        assert_eq!(potasio.clinical_interpretation, "Hiperpotasemia");
        assert_eq!(potasio.reference_range.as_deref(), Some("3.5-5.1"));

        let sodio = &r.results[2];
        assert_eq!(sodio.test_name, "Sodio");
        assert_eq!(sodio.status, LabStatus::Low);
        assert_eq!(sodio.simplified_explanation, "bajo");
        assert!(sodio.value.is_none(), "cut-off value is not guessed");
    }

    #[test]
    fn braces_inside_strings_do_not_split_items() {
        let text = r#"{"results":[{"status":"high","simplified_explanation":"Rango {alto}","test_name":"Urea"},{"test_name":"Calcio","status":"normal""#;
        let r = recover(text);
        assert_eq!(r.results.len(), 2);
        assert_eq!(r.results[0].status, LabStatus::High);
        assert_eq!(r.results[0].simplified_explanation, "Rango {alto}");
        assert_eq!(r.results[1].status, LabStatus::Normal);
    }

    #[test]
    fn recovered_summary_is_kept() {
        let text = r#"{"results":[{"test_name":"Urea","status":"normal"}],"summary":"Todo en rango","recommendations":["#;
        let r = recover(text);
        assert_eq!(r.summary, "Todo en rango");
        assert_eq!(r.recommendations, vec![DEFAULT_RECOMMENDATION.to_string()]);
    }
}
