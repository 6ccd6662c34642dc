//! Analysis entry points.
//!
//! [`analyze_document`] runs one already-selected PDF through the pipeline;
//! [`analyze`] resolves a path or URL first. Both return `Err` only when no
//! content came back at all. A reply that cannot be read as a report still
//! yields `Ok`, with the fallback result and an advisory in the outcome.

use crate::config::AnalysisConfig;
use crate::error::LabReportError;
use crate::model::{AnalysisOutcome, AnalysisStats};
use crate::pipeline::input::{self, PdfDocument};
use crate::pipeline::{normalize, request, transport};
use std::time::Instant;
use tracing::{info, warn};

/// Analyze a PDF file path or HTTP/HTTPS URL.
///
/// # Errors
/// Input errors (file missing, not a PDF, download failed) and transport
/// errors (timeout, connectivity, HTTP status).
pub async fn analyze(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome, LabReportError> {
    let doc = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    analyze_document(&doc, config).await
}

/// Analyze a selected document.
///
/// This is the primary entry point for the library.
///
/// # Example
/// ```rust,no_run
/// use edgequake_labreport::{analyze_document, AnalysisConfig, PdfDocument};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("hemograma.pdf")?;
/// let doc = PdfDocument::new("hemograma.pdf", "application/pdf", bytes)?;
/// let outcome = analyze_document(&doc, &AnalysisConfig::default()).await?;
/// for item in &outcome.result.results {
///     println!("{} {} {}", item.status.icon(), item.test_name, item.value.as_deref().unwrap_or("-"));
/// }
/// if let Some(msg) = outcome.advisory_message() {
///     eprintln!("{msg}");
/// }
/// # Ok(())
/// # }
/// ```
pub async fn analyze_document(
    doc: &PdfDocument,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome, LabReportError> {
    let client = reqwest::Client::builder()
        .build()
        .map_err(|e| LabReportError::Internal(format!("HTTP client: {e}")))?;
    analyze_with_client(&client, doc, config).await
}

/// Same as [`analyze_document`] with a caller-owned HTTP client.
pub async fn analyze_with_client(
    client: &reqwest::Client,
    doc: &PdfDocument,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome, LabReportError> {
    let start = Instant::now();
    info!(
        "Starting analysis of '{}' ({} bytes) with {}",
        doc.name,
        doc.len(),
        config.model
    );

    // ── Step 1: Build request ────────────────────────────────────────────
    let body = request::build_request(doc, config);

    // ── Step 2: Send ─────────────────────────────────────────────────────
    let reply = transport::send(client, &body, config).await?;

    // ── Step 3: Normalize ────────────────────────────────────────────────
    let normalized = normalize::normalize_reply(&reply.body);
    if let Some(ref issue) = normalized.issue {
        warn!("Analysis of '{}' degraded to fallback: {}", doc.name, issue);
    }

    let stats = AnalysisStats {
        model: config.model.clone(),
        pdf_bytes: doc.len(),
        response_bytes: reply.body.len(),
        duration_ms: start.elapsed().as_millis() as u64,
        recovered: normalized.issue.is_some(),
    };

    info!(
        "Analysis complete: {} values, {}ms total ({}ms in transport)",
        normalized.result.results.len(),
        stats.duration_ms,
        reply.elapsed_ms
    );

    Ok(AnalysisOutcome {
        result: normalized.result,
        advisory: normalized.issue,
        stats,
    })
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutcome, LabReportError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| LabReportError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze(input_str, config))
}
