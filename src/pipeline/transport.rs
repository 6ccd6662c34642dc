//! Transport: one bounded-time POST to the generation endpoint.
//!
//! The whole exchange (connect, send, read body) runs under a single
//! `tokio::time::timeout`. When it elapses the future is dropped, which
//! aborts the in-flight request, and the caller gets
//! [`LabReportError::Timeout`]. No retry is attempted.

use crate::config::AnalysisConfig;
use crate::error::LabReportError;
use crate::pipeline::request::GenerateRequest;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Longest server detail kept in an error message.
const MAX_DETAIL_CHARS: usize = 500;

/// Raw reply body of a successful call.
#[derive(Debug, Clone)]
pub struct RawReply {
    pub body: String,
    pub elapsed_ms: u64,
}

/// Post `request` and return the reply body.
///
/// # Errors
/// - [`LabReportError::Timeout`] when `config.api_timeout_secs` elapses
/// - [`LabReportError::Network`] when the endpoint cannot be reached
/// - [`LabReportError::HttpStatus`] for any non-2xx status, carrying the
///   trimmed response body as detail when there is one
pub async fn send(
    client: &reqwest::Client,
    request: &GenerateRequest,
    config: &AnalysisConfig,
) -> Result<RawReply, LabReportError> {
    let url = config.endpoint_url();
    let secs = config.api_timeout_secs;
    let start = Instant::now();
    debug!("POST {} (model {}, timeout {}s)", url, request.model, secs);

    let exchange = async {
        let response = client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LabReportError::HttpStatus {
                status: status.as_u16(),
                detail: clip_detail(&body),
            });
        }

        response.text().await.map_err(|e| map_reqwest_error(e, secs))
    };

    let result = match tokio::time::timeout(Duration::from_secs(secs), exchange).await {
        Ok(inner) => inner,
        Err(_) => Err(LabReportError::Timeout { secs }),
    };
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(body) => {
            debug!("Reply: {} bytes in {}ms", body.len(), elapsed_ms);
            Ok(RawReply { body, elapsed_ms })
        }
        Err(e) => {
            warn!("Request to {} failed after {}ms: {:?}", url, elapsed_ms, e);
            Err(e)
        }
    }
}

fn map_reqwest_error(e: reqwest::Error, secs: u64) -> LabReportError {
    if e.is_timeout() {
        LabReportError::Timeout { secs }
    } else {
        LabReportError::Network {
            detail: e.to_string(),
        }
    }
}

/// Trim a server-supplied body into an error detail; blank bodies give `None`.
fn clip_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().count() <= MAX_DETAIL_CHARS {
        return Some(trimmed.to_string());
    }
    let mut clipped: String = trimmed.chars().take(MAX_DETAIL_CHARS).collect();
    clipped.push('…');
    Some(clipped)
}
