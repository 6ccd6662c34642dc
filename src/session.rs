//! Presentation state: one explicit container for everything a front-end
//! shows about the current analysis.
//!
//! [`AnalysisSession`] owns the selected file, the in-flight flag, the last
//! error, the last result, and the view filters. Every slot is replaced
//! wholesale, never patched, and every change bumps a version counter and
//! notifies the registered [`SessionObserver`]s. Derived views (counts,
//! filtered lists, the status line) are computed on demand from the current
//! snapshot.
//!
//! ## One analysis at a time
//!
//! [`AnalysisSession::begin_analysis`] refuses a second submission while one
//! is in flight and hands out an [`AnalysisTicket`]. Completing with a
//! ticket issued before the file was changed or cleared is a no-op, so a
//! slow reply never lands on top of a different file. Changing or clearing
//! the file also releases the in-flight claim: the stale request keeps
//! running but no longer shows as processing.

use crate::analyze::analyze_document;
use crate::config::AnalysisConfig;
use crate::error::LabReportError;
use crate::model::{AnalysisItem, AnalysisOutcome, AnalysisResult, StatusCounts};
use crate::observer::SharedObserver;
use crate::pipeline::input::PdfDocument;
use tokio::sync::Mutex;
use tracing::debug;

/// A file as handed over by a picker or a drop, before validation.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub name: String,
    /// Media type as declared by the source (browser, extension, header).
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }
}

impl From<PdfDocument> for FileCandidate {
    fn from(doc: PdfDocument) -> Self {
        Self {
            name: doc.name,
            media_type: doc.media_type,
            bytes: doc.bytes,
        }
    }
}

/// Coarse state the user is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    FileSelected,
    Processing,
    Error,
    ResultShown,
}

/// Handle for one in-flight analysis.
#[derive(Debug, Clone)]
pub struct AnalysisTicket {
    generation: u64,
    /// The document to send.
    pub document: PdfDocument,
}

/// State container for one analysis front-end.
#[derive(Default)]
pub struct AnalysisSession {
    file: Option<PdfDocument>,
    processing: bool,
    error: Option<String>,
    advisory: Option<String>,
    result: Option<AnalysisResult>,
    show_only_abnormal: bool,
    show_detailed_view: bool,
    version: u64,
    /// Bumped whenever the selected file changes or is cleared.
    generation: u64,
    observers: Vec<SharedObserver>,
}

impl std::fmt::Debug for AnalysisSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisSession")
            .field("file", &self.file)
            .field("processing", &self.processing)
            .field("error", &self.error)
            .field("advisory", &self.advisory)
            .field("has_result", &self.result.is_some())
            .field("show_only_abnormal", &self.show_only_abnormal)
            .field("show_detailed_view", &self.show_detailed_view)
            .field("version", &self.version)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer.
    pub fn subscribe(&mut self, observer: SharedObserver) {
        self.observers.push(observer);
    }

    // ── Inbound actions ──────────────────────────────────────────────────

    /// File picker result. Clears the previous error and result first.
    ///
    /// `None` (picker dismissed) only clears. A file whose media type is not
    /// `application/pdf`, or that is empty, is rejected: the error slot gets
    /// the rejection message and no file stays selected.
    pub fn select_file(&mut self, candidate: Option<FileCandidate>) -> Result<(), LabReportError> {
        let had_result = self.result.is_some();
        self.error = None;
        self.advisory = None;
        self.result = None;

        let outcome = match candidate {
            None => Ok(()),
            Some(c) => match PdfDocument::new(c.name, c.media_type, c.bytes) {
                Ok(doc) => {
                    debug!("Selected '{}' ({} bytes)", doc.name, doc.len());
                    self.file = Some(doc);
                    self.release_file();
                    Ok(())
                }
                Err(e) => {
                    self.file = None;
                    self.release_file();
                    self.error = Some(e.to_string());
                    Err(e)
                }
            },
        };

        self.bump();
        if had_result {
            self.notify_result();
        }
        if let Some(ref msg) = self.error {
            for o in &self.observers {
                o.on_error(msg);
            }
        }
        outcome
    }

    /// Drag-and-drop: the first dropped file is treated like a picked one.
    /// An empty drop changes nothing.
    pub fn drop_files(&mut self, files: Vec<FileCandidate>) -> Result<(), LabReportError> {
        match files.into_iter().next() {
            Some(first) => self.select_file(Some(first)),
            None => Ok(()),
        }
    }

    /// Forget the file, result, error, and advisory; close the detailed view.
    pub fn clear(&mut self) {
        let had_result = self.result.is_some();
        self.file = None;
        self.result = None;
        self.error = None;
        self.advisory = None;
        self.show_detailed_view = false;
        self.release_file();
        self.bump();
        if had_result {
            self.notify_result();
        }
    }

    pub fn toggle_only_abnormal(&mut self) {
        self.show_only_abnormal = !self.show_only_abnormal;
        self.bump();
    }

    pub fn toggle_detailed_view(&mut self) {
        self.show_detailed_view = !self.show_detailed_view;
        self.bump();
    }

    /// Start an analysis of the selected file.
    ///
    /// # Errors
    /// - [`LabReportError::AnalysisBusy`] while another analysis is in flight
    ///   (state untouched)
    /// - [`LabReportError::NoFileSelected`] when there is no file (the error
    ///   slot is set)
    pub fn begin_analysis(&mut self) -> Result<AnalysisTicket, LabReportError> {
        if self.processing {
            return Err(LabReportError::AnalysisBusy);
        }
        let Some(doc) = self.file.clone() else {
            let err = LabReportError::NoFileSelected;
            self.error = Some(err.to_string());
            self.bump();
            for o in &self.observers {
                o.on_error(&err.to_string());
            }
            return Err(err);
        };

        self.processing = true;
        self.error = None;
        self.bump();
        Ok(AnalysisTicket {
            generation: self.generation,
            document: doc,
        })
    }

    /// Store the outcome of the analysis started with `ticket`.
    ///
    /// Returns `false` when the ticket is stale (file changed or cleared
    /// meanwhile): the outcome is dropped and nothing changes.
    pub fn finish_analysis(
        &mut self,
        ticket: AnalysisTicket,
        outcome: Result<AnalysisOutcome, LabReportError>,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!("Dropping outcome for '{}': file changed", ticket.document.name);
            return false;
        }
        self.processing = false;

        match outcome {
            Ok(outcome) => {
                self.advisory = outcome.advisory_message().map(str::to_string);
                self.error = None;
                self.result = Some(outcome.result);
                self.bump();
                self.notify_result();
                if let Some(ref result) = self.result {
                    for o in &self.observers {
                        o.on_results_ready(result);
                    }
                }
            }
            Err(e) => {
                let had_result = self.result.is_some();
                let msg = e.to_string();
                self.result = None;
                self.advisory = None;
                self.error = Some(msg.clone());
                self.bump();
                if had_result {
                    self.notify_result();
                }
                for o in &self.observers {
                    o.on_error(&msg);
                }
            }
        }
        true
    }

    // ── Snapshot ─────────────────────────────────────────────────────────

    pub fn file(&self) -> Option<&PdfDocument> {
        self.file.as_ref()
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Advisory shown next to a fallback result.
    pub fn advisory(&self) -> Option<&str> {
        self.advisory.as_deref()
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn show_only_abnormal(&self) -> bool {
        self.show_only_abnormal
    }

    pub fn show_detailed_view(&self) -> bool {
        self.show_detailed_view
    }

    /// Incremented on every state change.
    pub fn version(&self) -> u64 {
        self.version
    }

    // ── Derived views ────────────────────────────────────────────────────

    pub fn stats(&self) -> Option<StatusCounts> {
        self.result.as_ref().map(AnalysisResult::stats)
    }

    pub fn abnormal_items(&self) -> Vec<&AnalysisItem> {
        self.result
            .as_ref()
            .map(|r| r.abnormal_items().collect())
            .unwrap_or_default()
    }

    pub fn critical_items(&self) -> Vec<&AnalysisItem> {
        self.result
            .as_ref()
            .map(|r| r.critical_items().collect())
            .unwrap_or_default()
    }

    /// Items to list, honouring the "only abnormal" filter.
    pub fn visible_items(&self) -> Vec<&AnalysisItem> {
        if self.show_only_abnormal {
            return self.abnormal_items();
        }
        self.result
            .as_ref()
            .map(|r| r.results.iter().collect())
            .unwrap_or_default()
    }

    /// Phase by priority: processing > error > result > file > idle.
    pub fn phase(&self) -> SessionPhase {
        if self.processing {
            SessionPhase::Processing
        } else if self.error.is_some() {
            SessionPhase::Error
        } else if self.result.is_some() {
            SessionPhase::ResultShown
        } else if self.file.is_some() {
            SessionPhase::FileSelected
        } else {
            SessionPhase::Idle
        }
    }

    /// One-line status for the current phase.
    pub fn status_message(&self) -> String {
        match self.phase() {
            SessionPhase::Processing => "Analizando el PDF con IA…".to_string(),
            SessionPhase::Error => self.error.clone().unwrap_or_default(),
            SessionPhase::ResultShown => {
                let counts = self.stats().unwrap_or_default();
                if self.advisory.is_some() {
                    format!(
                        "Análisis completado con datos parciales: {} valores recuperados.",
                        counts.total
                    )
                } else {
                    format!(
                        "Análisis completado: {} valores, {} fuera de rango.",
                        counts.total,
                        counts.abnormal()
                    )
                }
            }
            SessionPhase::FileSelected => format!(
                "Archivo seleccionado: {}. Listo para analizar.",
                self.file.as_ref().map(|f| f.name.as_str()).unwrap_or_default()
            ),
            SessionPhase::Idle => "Seleccioná o arrastrá un PDF de análisis para comenzar.".to_string(),
        }
    }

    // ── Notification ─────────────────────────────────────────────────────

    /// The selected file changed: outstanding tickets go stale and lose
    /// their claim on the in-flight flag.
    fn release_file(&mut self) {
        self.generation += 1;
        self.processing = false;
    }

    fn bump(&mut self) {
        self.version += 1;
        for o in &self.observers {
            o.on_state_changed(self.version);
        }
    }

    fn notify_result(&self) {
        for o in &self.observers {
            o.on_result_changed(self.version, self.result.as_ref());
        }
    }
}

/// Run one analysis for the session's selected file.
///
/// The lock is held only to start and to finish, never across the network
/// call. Returns the phase the session ended in.
///
/// # Errors
/// Only the refusals of [`AnalysisSession::begin_analysis`]; failures of the
/// analysis itself land in the session's error slot.
pub async fn run_analysis(
    session: &Mutex<AnalysisSession>,
    config: &AnalysisConfig,
) -> Result<SessionPhase, LabReportError> {
    let ticket = session.lock().await.begin_analysis()?;
    let outcome = analyze_document(&ticket.document, config).await;
    let mut guard = session.lock().await;
    guard.finish_analysis(ticket, outcome);
    Ok(guard.phase())
}
