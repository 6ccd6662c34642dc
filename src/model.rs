//! Result types: the normalized report and its per-value items.
//!
//! Everything here is produced by [`crate::pipeline::normalize`] and is
//! therefore already defaulted: presentation code never has to special-case
//! a missing name, an unknown status, or an empty recommendation list.

use crate::error::ExtractionIssue;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a single lab value against its reference range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabStatus {
    /// Within the reference range (also the coercion target for unknown values).
    #[default]
    Normal,
    /// Above the reference range.
    High,
    /// Below the reference range.
    Low,
    /// Needs urgent medical attention.
    Critical,
}

impl LabStatus {
    /// The whole taxonomy, in display order. The response schema's `status`
    /// enum is generated from this list.
    pub const ALL: [LabStatus; 4] = [
        LabStatus::Normal,
        LabStatus::High,
        LabStatus::Low,
        LabStatus::Critical,
    ];

    /// Wire name (`"normal"`, `"high"`, `"low"`, `"critical"`).
    pub fn as_str(self) -> &'static str {
        match self {
            LabStatus::Normal => "normal",
            LabStatus::High => "high",
            LabStatus::Low => "low",
            LabStatus::Critical => "critical",
        }
    }

    /// Whitelist a raw status string. Matching ignores case and surrounding
    /// whitespace; anything outside the taxonomy yields `None`.
    pub fn parse(raw: &str) -> Option<LabStatus> {
        let raw = raw.trim();
        LabStatus::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(raw))
    }

    /// Spanish label shown next to the value.
    pub fn label(self) -> &'static str {
        match self {
            LabStatus::Normal => "Normal",
            LabStatus::High => "Alto",
            LabStatus::Low => "Bajo",
            LabStatus::Critical => "Crítico",
        }
    }

    /// One-character marker shown next to the value.
    pub fn icon(self) -> &'static str {
        match self {
            LabStatus::Normal => "✓",
            LabStatus::High => "↑",
            LabStatus::Low => "↓",
            LabStatus::Critical => "⚠",
        }
    }

    /// Anything other than `Normal`.
    pub fn is_abnormal(self) -> bool {
        self != LabStatus::Normal
    }
}

impl fmt::Display for LabStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One extracted lab value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisItem {
    /// Name of the test, e.g. "Glucosa". Defaults to "Sin nombre".
    pub test_name: String,
    /// Measured value as printed in the document.
    pub value: Option<String>,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
    pub status: LabStatus,
    /// Plain-language explanation for the patient.
    pub simplified_explanation: String,
    /// Clinical reading of the value.
    pub clinical_interpretation: String,
    /// Legacy technical explanation, kept when the model still sends it.
    pub explanation: Option<String>,
    /// Set only for abnormal values.
    pub warning: Option<String>,
}

/// Counts per status over a result's items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: usize,
    pub normal: usize,
    pub high: usize,
    pub low: usize,
    pub critical: usize,
}

impl StatusCounts {
    /// Items that are not `normal`.
    pub fn abnormal(&self) -> usize {
        self.high + self.low + self.critical
    }
}

/// A fully normalized lab report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub patient_name: String,
    pub test_date: String,
    pub laboratory: String,
    pub doctor: String,
    /// Items in document order.
    pub results: Vec<AnalysisItem>,
    pub summary: String,
    /// Never empty.
    pub recommendations: Vec<String>,
    /// Model's self-reported confidence, clamped to `[0, 1]`.
    pub confidence: Option<f64>,
}

impl AnalysisResult {
    /// Count items per status.
    pub fn stats(&self) -> StatusCounts {
        self.results
            .iter()
            .fold(StatusCounts::default(), |mut counts, item| {
                counts.total += 1;
                match item.status {
                    LabStatus::Normal => counts.normal += 1,
                    LabStatus::High => counts.high += 1,
                    LabStatus::Low => counts.low += 1,
                    LabStatus::Critical => counts.critical += 1,
                }
                counts
            })
    }

    /// Items whose status is not `normal`, in document order.
    pub fn abnormal_items(&self) -> impl Iterator<Item = &AnalysisItem> {
        self.results.iter().filter(|i| i.status.is_abnormal())
    }

    /// Items whose status is `critical`, in document order.
    pub fn critical_items(&self) -> impl Iterator<Item = &AnalysisItem> {
        self.results
            .iter()
            .filter(|i| i.status == LabStatus::Critical)
    }
}

/// Timing and size figures for one analysis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    pub model: String,
    pub pdf_bytes: usize,
    pub response_bytes: usize,
    pub duration_ms: u64,
    /// `true` when the result was rebuilt by the fallback recovery.
    pub recovered: bool,
}

/// Everything returned by one successful round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    /// Present when `result` is a fallback rather than a clean extraction.
    pub advisory: Option<ExtractionIssue>,
    pub stats: AnalysisStats,
}

impl AnalysisOutcome {
    /// Message to show next to the result, if it was degraded.
    pub fn advisory_message(&self) -> Option<&'static str> {
        self.advisory.as_ref().map(ExtractionIssue::advisory_message)
    }
}

/// Render an ISO `YYYY-MM-DD` date in the `D/M/YYYY` form used by the report.
///
/// Anything that is not an ISO date (including placeholders) is returned
/// unchanged.
pub fn format_test_date(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => date.format("%-d/%-m/%Y").to_string(),
        Err(_) => raw.to_string(),
    }
}
