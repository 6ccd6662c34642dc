//! Error types for the edgequake-labreport library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`LabReportError`] : **Fatal** for one analysis: no content was obtained
//!   at all (file rejected, endpoint unreachable, request timed out, HTTP
//!   error). Returned as `Err(LabReportError)` from the `analyze*` functions
//!   and shown to the user as-is: its `Display` output is the user-facing
//!   message.
//!
//! * [`ExtractionIssue`] : **Non-fatal**: the endpoint answered, but the text
//!   could not be read as a well-formed report. The normalizer recovers a
//!   complete fallback result and attaches the issue to
//!   [`crate::model::AnalysisOutcome`] as an advisory, so callers can render
//!   the degraded result while telling the user it is partial.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-labreport library.
///
/// Messages are written for the person who picked the file, in Spanish,
/// because that is the language the whole report is produced in.
#[derive(Debug, Error)]
pub enum LabReportError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The selected file does not declare the `application/pdf` media type.
    #[error("El archivo debe ser un PDF de análisis médico.")]
    NotAPdf { name: String, media_type: String },

    /// The selected file has no content.
    #[error("El archivo '{name}' está vacío.")]
    EmptyFile { name: String },

    /// An analysis was requested with no file selected.
    #[error("Seleccioná un PDF de análisis primero")]
    NoFileSelected,

    /// An analysis is already in flight for this session.
    #[error("Ya hay un análisis en curso. Esperá a que termine.")]
    AnalysisBusy,

    /// Input file was not found at the given path.
    #[error("No se encontró el archivo '{path}'.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("No hay permiso para leer '{path}'.")]
    PermissionDenied { path: PathBuf },

    /// The input string is neither a file path nor an HTTP/HTTPS URL.
    #[error("Entrada inválida '{input}': no es una ruta de archivo ni una URL HTTP/HTTPS.")]
    InvalidInput { input: String },

    /// Downloading a remote PDF failed.
    #[error("No se pudo descargar '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Downloading a remote PDF exceeded the configured timeout.
    #[error("La descarga de '{url}' superó los {secs}s.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Transport errors ──────────────────────────────────────────────────
    /// The analysis endpoint did not answer within the timeout.
    #[error(
        "El análisis tardó demasiado (más de {secs}s). Intentá nuevamente o probá con un PDF más liviano."
    )]
    Timeout { secs: u64 },

    /// The analysis endpoint could not be reached.
    #[error("No se pudo conectar con el servicio de análisis. Verificá tu conexión a internet.")]
    Network { detail: String },

    /// The analysis endpoint answered with a non-success HTTP status.
    #[error("{}", describe_status(.status, .detail))]
    HttpStatus { status: u16, detail: Option<String> },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Configuración inválida: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Error interno: {0}")]
    Internal(String),
}

impl LabReportError {
    /// `true` for failures of the HTTP call itself (timeout, connectivity,
    /// non-success status): the only errors that can follow a sent request.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            LabReportError::Timeout { .. }
                | LabReportError::Network { .. }
                | LabReportError::HttpStatus { .. }
        )
    }
}

/// Pick the user-facing message for a non-success HTTP status.
fn describe_status(status: &u16, detail: &Option<String>) -> String {
    let detail = detail.as_deref().map(str::trim).filter(|d| !d.is_empty());
    let base = match *status {
        400 => "La solicitud de análisis fue rechazada por inválida.",
        401 | 403 => "El servicio de análisis rechazó las credenciales.",
        413 => "El PDF es demasiado grande para ser analizado.",
        429 => "Se alcanzó el límite de solicitudes. Esperá unos minutos e intentá nuevamente.",
        500 => "El servicio de análisis tuvo un error interno.",
        502..=504 => "El servicio de análisis no está disponible en este momento. Intentá más tarde.",
        _ => {
            return match detail {
                Some(d) => d.to_string(),
                None => format!("HTTP {status}"),
            }
        }
    };
    match detail {
        Some(d) => format!("{base} Detalle: {d}"),
        None => base.to_string(),
    }
}

/// Why a reply could not be read as a well-formed report.
///
/// Stored in [`crate::model::AnalysisOutcome::advisory`] next to the
/// fallback result built by [`crate::pipeline::recover`].
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ExtractionIssue {
    /// The text is not valid JSON.
    #[error("response is not valid JSON: {detail}")]
    InvalidJson { detail: String },

    /// The text is JSON but not an object.
    #[error("response JSON is not an object")]
    NotAnObject,

    /// The object has no `results` array.
    #[error("response object has no `results` array")]
    MissingResults,
}

impl ExtractionIssue {
    /// Message shown next to a fallback result.
    pub fn advisory_message(&self) -> &'static str {
        "No se pudo interpretar completamente la respuesta de la IA. \
Se muestran los datos que pudieron recuperarse; revisá el PDF original o intentá nuevamente."
    }
}
