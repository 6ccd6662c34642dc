//! Request building: PDF + prompt + response schema → request envelope.
//!
//! The endpoint is a thin proxy in front of a Gemini-style
//! `generateContent` call. It takes `{ model, payload }` and forwards
//! `payload` untouched, so the body mirrors that API's field names
//! (`inline_data`, `generationConfig`, `responseSchema`, …).
//!
//! The schema is advisory: the model is asked to honour it, nothing enforces
//! it. The normalizer still treats every field as untrusted.

use crate::config::AnalysisConfig;
use crate::model::LabStatus;
use crate::pipeline::encode::{encode_pdf, InlineData};
use crate::pipeline::input::PdfDocument;
use crate::prompts::extraction_prompt;
use serde::Serialize;
use serde_json::{json, Value};

/// Top-level body posted to the endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub payload: GeneratePayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratePayload {
    pub contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

/// One part of a content turn: either the document or the instruction.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Part {
    Inline { inline_data: InlineData },
    Text { text: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    pub response_mime_type: String,
    #[serde(rename = "responseSchema")]
    pub response_schema: Value,
    #[serde(rename = "maxOutputTokens")]
    pub max_output_tokens: u32,
}

/// Build the request body for one document.
pub fn build_request(doc: &PdfDocument, config: &AnalysisConfig) -> GenerateRequest {
    let prompt = extraction_prompt(config.prompt.as_deref()).to_string();
    GenerateRequest {
        model: config.model.clone(),
        payload: GeneratePayload {
            contents: vec![Content {
                parts: vec![
                    Part::Inline {
                        inline_data: encode_pdf(doc),
                    },
                    Part::Text { text: prompt },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: response_schema(),
                max_output_tokens: config.max_output_tokens,
            },
        },
    }
}

/// Schema describing the report the model should return.
///
/// The `status` enum is generated from [`LabStatus::ALL`] so it cannot drift
/// from the taxonomy the normalizer whitelists against.
pub fn response_schema() -> Value {
    let statuses: Vec<&str> = LabStatus::ALL.iter().map(|s| s.as_str()).collect();
    json!({
        "type": "OBJECT",
        "required": ["patient_name", "results", "summary"],
        "properties": {
            "patient_name": { "type": "STRING", "description": "Nombre del paciente" },
            "test_date": { "type": "STRING", "description": "Fecha del análisis (YYYY-MM-DD)" },
            "laboratory": { "type": "STRING", "description": "Nombre del laboratorio" },
            "doctor": { "type": "STRING", "description": "Médico solicitante" },
            "results": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "required": ["test_name", "status", "simplified_explanation"],
                    "properties": {
                        "test_name": { "type": "STRING", "description": "Nombre del análisis" },
                        "value": { "type": "STRING", "description": "Valor obtenido" },
                        "unit": { "type": "STRING", "description": "Unidad de medida" },
                        "reference_range": { "type": "STRING", "description": "Rango de referencia normal" },
                        "status": { "type": "STRING", "enum": statuses, "description": "Estado del valor" },
                        "simplified_explanation": { "type": "STRING", "description": "Explicación simple para el paciente" },
                        "clinical_interpretation": { "type": "STRING", "description": "Interpretación clínica breve" },
                        "explanation": { "type": "STRING", "description": "Explicación técnica del análisis" },
                        "warning": { "type": "STRING", "nullable": true, "description": "Advertencia si el valor está fuera de rango" }
                    }
                }
            },
            "summary": { "type": "STRING", "description": "Resumen general del análisis en lenguaje simple" },
            "recommendations": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Recomendaciones generales (no consejos médicos específicos)"
            },
            "confidence": { "type": "NUMBER", "minimum": 0, "maximum": 1, "description": "Confianza en el análisis" }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::DEFAULT_EXTRACTION_PROMPT;

    fn doc() -> PdfDocument {
        PdfDocument::new("a.pdf", "application/pdf", b"%PDF-1.4".to_vec()).unwrap()
    }

    #[test]
    fn schema_status_enum_matches_taxonomy() {
        let schema = response_schema();
        let listed: Vec<String> = schema["properties"]["results"]["items"]["properties"]["status"]
            ["enum"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        let expected: Vec<String> = LabStatus::ALL.iter().map(|s| s.as_str().to_string()).collect();
        assert_eq!(listed, expected);
        for name in &listed {
            assert!(LabStatus::parse(name).is_some());
        }
    }

    #[test]
    fn schema_required_fields() {
        let schema = response_schema();
        assert_eq!(schema["required"], json!(["patient_name", "results", "summary"]));
        let item_required = &schema["properties"]["results"]["items"]["required"];
        assert_eq!(item_required, &json!(["test_name", "status", "simplified_explanation"]));
    }

    #[test]
    fn body_layout() {
        let config = AnalysisConfig::default();
        let body = serde_json::to_value(build_request(&doc(), &config)).unwrap();

        assert_eq!(body["model"], "gemini-2.5-flash-lite");
        let parts = &body["payload"]["contents"][0]["parts"];
        assert_eq!(parts[0]["inline_data"]["mime_type"], "application/pdf");
        assert_eq!(parts[0]["inline_data"]["data"], "JVBERi0xLjQ=");
        assert_eq!(parts[1]["text"], DEFAULT_EXTRACTION_PROMPT);

        let gen = &body["payload"]["generationConfig"];
        assert_eq!(gen["responseMimeType"], "application/json");
        assert_eq!(gen["maxOutputTokens"], 4000);
        assert_eq!(gen["responseSchema"]["type"], "OBJECT");
    }

    #[test]
    fn custom_prompt_is_sent() {
        let config = AnalysisConfig::builder()
            .prompt("Extraé solo la glucosa")
            .model("gemini-2.5-pro")
            .build()
            .unwrap();
        let body = serde_json::to_value(build_request(&doc(), &config)).unwrap();
        assert_eq!(body["model"], "gemini-2.5-pro");
        assert_eq!(
            body["payload"]["contents"][0]["parts"][1]["text"],
            "Extraé solo la glucosa"
        );
    }
}
