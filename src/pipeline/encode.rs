//! Payload encoding: PDF bytes → base64 inline data part.
//!
//! The generation endpoint accepts documents inline in the JSON body, so the
//! PDF travels as standard (padded) base64 next to its declared media type.

use crate::pipeline::input::PdfDocument;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A document embedded in the request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineData {
    pub mime_type: String,
    /// Base64 of the raw bytes, no `data:` prefix.
    pub data: String,
}

/// Encode a selected PDF for the request body.
pub fn encode_pdf(doc: &PdfDocument) -> InlineData {
    let data = STANDARD.encode(&doc.bytes);
    debug!(
        "Encoded '{}' → {} bytes base64 ({} raw)",
        doc.name,
        data.len(),
        doc.bytes.len()
    );
    InlineData {
        mime_type: doc.media_type.clone(),
        data,
    }
}
