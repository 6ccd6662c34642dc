//! # edgequake-labreport
//!
//! Read a medical laboratory report (PDF) with a generative model and turn it
//! into structured, patient-friendly results.
//!
//! The PDF is sent whole, base64-encoded, to a JSON-schema-constrained
//! generation endpoint. The reply is parsed and every missing field gets a
//! default. A reply that cannot be parsed still yields a complete result,
//! salvaged from whatever is readable, with an advisory attached.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL, require a PDF
//!  ├─ 2. Encode     bytes → base64 inline data part
//!  ├─ 3. Request    prompt + document + response schema
//!  ├─ 4. Transport  one POST to {api_base}/ai/generate, bounded by a timeout
//!  ├─ 5. Normalize  strip fences, parse, default every field
//!  └─ 6. Recover    fallback result + advisory when step 5 cannot parse
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_labreport::{analyze, AnalysisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalysisConfig::builder()
//!         .api_base("http://localhost:3000/api")
//!         .build()?;
//!     let outcome = analyze("hemograma.pdf", &config).await?;
//!     let counts = outcome.result.stats();
//!     println!("{} valores, {} fuera de rango", counts.total, counts.abnormal());
//!     Ok(())
//! }
//! ```
//!
//! Front-ends that keep state between actions (select, analyze, filter,
//! clear) drive an [`AnalysisSession`] instead; see [`session`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `labreport` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-labreport = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod model;
pub mod observer;
pub mod pipeline;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_document, analyze_sync, analyze_with_client};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{ExtractionIssue, LabReportError};
pub use model::{
    format_test_date, AnalysisItem, AnalysisOutcome, AnalysisResult, AnalysisStats, LabStatus,
    StatusCounts,
};
pub use observer::{NoopObserver, SessionObserver, SharedObserver};
pub use pipeline::input::PdfDocument;
pub use session::{run_analysis, AnalysisSession, AnalysisTicket, FileCandidate, SessionPhase};
