//! Configuration for a lab-report analysis.
//!
//! All behaviour is controlled through [`AnalysisConfig`], built via its
//! [`AnalysisConfigBuilder`]. Callers set only what they care about and rely
//! on the documented defaults for the rest.

use crate::error::LabReportError;
use serde::{Deserialize, Serialize};

/// Default base URL of the generation proxy.
pub const DEFAULT_API_BASE: &str = "http://localhost:3000/api";

/// Path appended to the base URL.
pub const DEFAULT_ENDPOINT_PATH: &str = "/ai/generate";

/// Model identifier sent in the request envelope.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";

/// Configuration for one or more analyses.
///
/// # Example
/// ```rust
/// use edgequake_labreport::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .api_base("https://labs.example.org/api")
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.endpoint_url(), "https://labs.example.org/api/ai/generate");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Base URL of the generation endpoint. Default: [`DEFAULT_API_BASE`].
    pub api_base: String,

    /// Path appended to `api_base`. Default: `/ai/generate`.
    pub endpoint_path: String,

    /// Model identifier forwarded to the endpoint. Default: `gemini-2.5-flash-lite`.
    pub model: String,

    /// Upper bound on the whole HTTP call, in seconds. Default: 60.
    ///
    /// When it elapses the request is dropped and the caller gets
    /// [`LabReportError::Timeout`]. There is no retry.
    pub api_timeout_secs: u64,

    /// `maxOutputTokens` passed in the generation config. Default: 4000.
    ///
    /// A long panel (full blood count plus chemistry) can approach this; a
    /// truncated reply is salvaged by the fallback recovery.
    pub max_output_tokens: u32,

    /// Custom extraction instruction. If None, uses
    /// [`crate::prompts::DEFAULT_EXTRACTION_PROMPT`].
    pub prompt: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            endpoint_path: DEFAULT_ENDPOINT_PATH.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_timeout_secs: 60,
            max_output_tokens: 4000,
            prompt: None,
            download_timeout_secs: 120,
        }
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full URL the request is posted to: base and path joined by exactly one `/`.
    pub fn endpoint_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        let path = self.endpoint_path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.config.api_base = url.into();
        self
    }

    pub fn endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.config.endpoint_path = path.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_output_tokens(mut self, n: u32) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, LabReportError> {
        let c = &self.config;
        let base = c.api_base.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(LabReportError::InvalidConfig(format!(
                "la URL base debe empezar con http:// o https://, se recibió '{}'",
                c.api_base
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(LabReportError::InvalidConfig(
                "el timeout debe ser de al menos 1 segundo".into(),
            ));
        }
        if c.max_output_tokens == 0 {
            return Err(LabReportError::InvalidConfig(
                "max_output_tokens debe ser ≥ 1".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(LabReportError::InvalidConfig(
                "el identificador de modelo no puede estar vacío".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = AnalysisConfig::default();
        assert_eq!(c.api_timeout_secs, 60);
        assert_eq!(c.max_output_tokens, 4000);
        assert_eq!(c.model, "gemini-2.5-flash-lite");
        assert_eq!(c.endpoint_url(), "http://localhost:3000/api/ai/generate");
    }

    #[test]
    fn endpoint_url_joins_with_single_slash() {
        let c = AnalysisConfig::builder()
            .api_base("https://x.test/api/")
            .endpoint_path("ai/generate")
            .build()
            .unwrap();
        assert_eq!(c.endpoint_url(), "https://x.test/api/ai/generate");
    }

    #[test]
    fn rejects_non_http_base() {
        let err = AnalysisConfig::builder()
            .api_base("ftp://x.test")
            .build()
            .unwrap_err();
        assert!(matches!(err, LabReportError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = AnalysisConfig::builder()
            .api_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, LabReportError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_blank_model() {
        assert!(AnalysisConfig::builder().model("  ").build().is_err());
    }
}
