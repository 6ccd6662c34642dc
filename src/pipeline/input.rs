//! Input resolution: turn a user-supplied path or URL into an in-memory PDF.
//!
//! The whole document is sent inline, so there is no reason to keep it on
//! disk: local files are read, URLs downloaded, and both end up as a
//! [`PdfDocument`] carrying the bytes and a *declared* media type. The media
//! type is what the accept/reject gate looks at, the same way a browser's
//! file picker reports `file.type`.

use crate::error::LabReportError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// The only media type accepted for analysis.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// A selected document, validated to be a non-empty PDF.
#[derive(Clone, PartialEq, Eq)]
pub struct PdfDocument {
    /// Display name (file name or last URL segment).
    pub name: String,
    /// Declared media type; always [`PDF_MEDIA_TYPE`] once constructed.
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

impl PdfDocument {
    /// Accept a file only if its declared media type is `application/pdf`
    /// and it is not empty.
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, LabReportError> {
        let name = name.into();
        let media_type = media_type.into();
        if media_type != PDF_MEDIA_TYPE {
            return Err(LabReportError::NotAPdf { name, media_type });
        }
        if bytes.is_empty() {
            return Err(LabReportError::EmptyFile { name });
        }
        Ok(Self {
            name,
            media_type,
            bytes,
        })
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Declare a media type from the file name, overridden by `%PDF` magic bytes.
pub fn detect_media_type(name: &str, bytes: &[u8]) -> String {
    if bytes.starts_with(b"%PDF") {
        return PDF_MEDIA_TYPE.to_string();
    }
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("pdf") => PDF_MEDIA_TYPE,
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        Some("html") | Some("htm") => "text/html",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Resolve the input string to a validated [`PdfDocument`].
///
/// If the input is a URL, download it; otherwise read the local file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<PdfDocument, LabReportError> {
    if input.trim().is_empty() {
        return Err(LabReportError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

/// Read a local file and declare its media type.
async fn read_local(path_str: &str) -> Result<PdfDocument, LabReportError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(LabReportError::PermissionDenied { path });
        }
        Err(_) => return Err(LabReportError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());
    let media_type = detect_media_type(&name, &bytes);
    debug!("Read local file '{}' ({}, {} bytes)", name, media_type, bytes.len());

    PdfDocument::new(name, media_type, bytes)
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<PdfDocument, LabReportError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LabReportError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            LabReportError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            LabReportError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(LabReportError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let header_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty() && v != "application/octet-stream");

    let name = extract_filename(url);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                LabReportError::DownloadTimeout {
                    url: url.to_string(),
                    secs: timeout_secs,
                }
            } else {
                LabReportError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?
        .to_vec();

    let media_type = if bytes.starts_with(b"%PDF") {
        PDF_MEDIA_TYPE.to_string()
    } else {
        header_type.unwrap_or_else(|| detect_media_type(&name, &bytes))
    };

    info!("Downloaded '{}' ({} bytes)", name, bytes.len());
    PdfDocument::new(name, media_type, bytes)
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn magic_bytes_win_over_extension() {
        assert_eq!(detect_media_type("scan.bin", b"%PDF-1.7"), PDF_MEDIA_TYPE);
        assert_eq!(detect_media_type("photo.PNG", b"\x89PNG"), "image/png");
        assert_eq!(detect_media_type("notes", b"hello"), "application/octet-stream");
        assert_eq!(detect_media_type("report.pdf", b""), PDF_MEDIA_TYPE);
    }

    #[test]
    fn non_pdf_is_rejected() {
        let err = PdfDocument::new("foto.jpg", "image/jpeg", vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, LabReportError::NotAPdf { .. }));
        assert_eq!(err.to_string(), "El archivo debe ser un PDF de análisis médico.");
    }

    #[test]
    fn empty_pdf_is_rejected() {
        let err = PdfDocument::new("vacio.pdf", PDF_MEDIA_TYPE, vec![]).unwrap_err();
        assert!(matches!(err, LabReportError::EmptyFile { .. }));
    }

    #[test]
    fn filename_from_url() {
        assert_eq!(extract_filename("https://x.test/files/hemograma.pdf"), "hemograma.pdf");
        assert_eq!(extract_filename("https://x.test/download/"), "downloaded.pdf");
    }

    #[test]
    fn debug_hides_bytes() {
        let doc = PdfDocument::new("a.pdf", PDF_MEDIA_TYPE, b"%PDF-1.4".to_vec()).unwrap();
        let dbg = format!("{doc:?}");
        assert!(dbg.contains("<8 bytes>"), "got: {dbg}");
    }

    #[tokio::test]
    async fn missing_local_file() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, LabReportError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn local_text_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notas.txt");
        std::fs::write(&path, "hola").unwrap();
        let err = resolve_input(path.to_str().unwrap(), 5).await.unwrap_err();
        assert!(matches!(err, LabReportError::NotAPdf { .. }));
    }

    #[tokio::test]
    async fn local_pdf_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hemograma.pdf");
        std::fs::write(&path, b"%PDF-1.4\n%%EOF").unwrap();
        let doc = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(doc.name, "hemograma.pdf");
        assert_eq!(doc.media_type, PDF_MEDIA_TYPE);
        assert_eq!(doc.len(), 14);
    }
}
