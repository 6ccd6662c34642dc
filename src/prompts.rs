//! Extraction prompt sent alongside the PDF.
//!
//! Centralising the prompt here keeps the request builder free of prose and
//! lets unit tests inspect it without a network round trip.
//!
//! Callers can override the default via [`crate::config::AnalysisConfig::prompt`];
//! the constant here is used only when no override is provided.

/// Default instruction for extracting a lab report.
///
/// The reply language is Spanish end to end; the field names stay in English
/// because they are what the response schema and the normalizer key on.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"Analiza este PDF de análisis médico de laboratorio y extrae la información completa.

IMPORTANTE: Responde SIEMPRE en ESPAÑOL. Todas las explicaciones, recomendaciones y textos deben estar en español.

INSTRUCCIONES:
1. Identifica TODOS los valores de análisis (hemograma, química sanguínea, coagulograma, orina, etc.) en el orden en que aparecen en el documento
2. Para cada valor, determina si está NORMAL, ALTO, BAJO o CRÍTICO comparando con los rangos de referencia, y usa exactamente "normal", "high", "low" o "critical" en el campo status
3. En simplified_explanation explica con palabras SIMPLES qué mide el análisis y qué significa el resultado
4. En clinical_interpretation da una lectura clínica breve del valor, sin diagnosticar
5. Completa warning SOLO cuando el valor esté fuera de rango; si es normal, deja warning en null
6. NO des consejos médicos específicos, solo explica qué significa cada valor
7. Incluye recomendaciones generales sobre cuándo consultar al médico

REGLAS DE FORMATO:
- Usa lenguaje simple y comprensible para el público general hispanohablante
- Marca como "critical" los valores que requieren atención médica urgente
- Si un dato no figura en el documento, omítelo en lugar de inventarlo
- Siempre recomienda consultar con un profesional médico

Devuelve ÚNICAMENTE un objeto JSON que respete el esquema indicado, sin texto adicional."#;

/// Resolve the prompt to send: the configured override or the default.
pub fn extraction_prompt(custom: Option<&str>) -> &str {
    match custom {
        Some(p) if !p.trim().is_empty() => p,
        _ => DEFAULT_EXTRACTION_PROMPT,
    }
}
