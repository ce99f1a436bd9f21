//! OCR provider seam and the Azure Document Intelligence client.
//!
//! The provider contract: raw document bytes in, a
//! list of pages out, each page carrying its 1-based page number and its
//! line-level text spans. Joining lines and re-indexing happens in
//! [`crate::pipeline::analyze`], so every provider gets the same ordering
//! guarantees.
//!
//! ## Azure analyze flow
//!
//! ```text
//! POST {endpoint}/formrecognizer/documentModels/{model}:analyze   → 202 + Operation-Location
//! GET  Operation-Location   (repeat until status = succeeded | failed)
//! ```

use crate::error::PipelineError;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

/// One page as reported by the OCR provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrPage {
    /// 1-based page number.
    pub page_number: u32,
    /// Line-level text spans in reading order.
    pub lines: Vec<String>,
}

impl OcrPage {
    pub fn new(page_number: u32, lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            page_number,
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

/// Anything that can OCR a document.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Run OCR over the raw bytes of one document.
    async fn analyze(&self, document: &[u8]) -> Result<Vec<OcrPage>, PipelineError>;
}

// ── Azure Document Intelligence ──────────────────────────────────────────

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION_HEADER: &str = "operation-location";

/// Connection settings for [`AzureDocumentClient`].
#[derive(Clone)]
pub struct AzureOcrConfig {
    pub endpoint: String,
    pub api_key: String,
    /// Analysis model. Default: `prebuilt-document`.
    pub model_id: String,
    /// REST API version. Default: `2023-07-31`.
    pub api_version: String,
    /// Delay between status polls when the service sends no `Retry-After`.
    pub poll_interval_ms: u64,
    /// Give up after this many status polls.
    pub max_polls: u32,
    /// Timeout for each individual HTTP request.
    pub request_timeout_secs: u64,
}

impl AzureOcrConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model_id: "prebuilt-document".to_string(),
            api_version: "2023-07-31".to_string(),
            poll_interval_ms: 1000,
            max_polls: 600,
            request_timeout_secs: 60,
        }
    }
}

impl std::fmt::Debug for AzureOcrConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureOcrConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("model_id", &self.model_id)
            .field("api_version", &self.api_version)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_polls", &self.max_polls)
            .finish()
    }
}

/// [`OcrProvider`] for the Azure Document Intelligence REST API.
pub struct AzureDocumentClient {
    http: reqwest::Client,
    config: AzureOcrConfig,
}

impl AzureDocumentClient {
    pub fn new(config: AzureOcrConfig) -> Result<Self, PipelineError> {
        if config.endpoint.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("OCR endpoint is empty".into()));
        }
        if config.api_key.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("OCR key is empty".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| PipelineError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/formrecognizer/documentModels/{}:analyze?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model_id,
            self.config.api_version
        )
    }

    async fn submit(&self, document: &[u8]) -> Result<String, PipelineError> {
        let response = self
            .http
            .post(self.analyze_url())
            .header(SUBSCRIPTION_KEY_HEADER, &self.config.api_key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(document.to_vec())
            .send()
            .await
            .map_err(|e| PipelineError::OcrRequestFailed {
                message: format!("{e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::OcrRequestFailed {
                message: format!("HTTP {status}: {body}"),
            });
        }

        response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| PipelineError::MalformedOcrPayload {
                detail: "analyze response has no Operation-Location header".into(),
            })
    }

    async fn poll(&self, operation_url: &str) -> Result<Vec<OcrPage>, PipelineError> {
        let default_wait = Duration::from_millis(self.config.poll_interval_ms);
        let mut wait = default_wait;

        for poll in 1..=self.config.max_polls {
            sleep(wait).await;

            let response = self
                .http
                .get(operation_url)
                .header(SUBSCRIPTION_KEY_HEADER, &self.config.api_key)
                .send()
                .await
                .map_err(|e| PipelineError::OcrRequestFailed {
                    message: format!("{e}"),
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(PipelineError::OcrRequestFailed {
                    message: format!("HTTP {status} while polling: {body}"),
                });
            }

            wait = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default_wait);

            let operation: AnalyzeOperation =
                response
                    .json()
                    .await
                    .map_err(|e| PipelineError::MalformedOcrPayload {
                        detail: format!("{e}"),
                    })?;

            if let Some(pages) = pages_from_operation(operation)? {
                debug!("OCR finished after {} polls", poll);
                return Ok(pages);
            }
        }

        Err(PipelineError::OcrRequestFailed {
            message: format!(
                "analysis still running after {} polls",
                self.config.max_polls
            ),
        })
    }
}

#[async_trait]
impl OcrProvider for AzureDocumentClient {
    fn name(&self) -> &str {
        "azure-document-intelligence"
    }

    async fn analyze(&self, document: &[u8]) -> Result<Vec<OcrPage>, PipelineError> {
        info!(
            "Submitting {} bytes to {} ({})",
            document.len(),
            self.config.model_id,
            self.config.api_version
        );
        let operation_url = self.submit(document).await?;
        self.poll(&operation_url).await
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    analyze_result: Option<AnalyzeResult>,
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResult {
    #[serde(default)]
    pages: Vec<AnalyzedPage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzedPage {
    page_number: u32,
    #[serde(default)]
    lines: Vec<AnalyzedLine>,
}

#[derive(Debug, Deserialize)]
struct AnalyzedLine {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Interpret one poll response. `Ok(None)` means "still running".
fn pages_from_operation(op: AnalyzeOperation) -> Result<Option<Vec<OcrPage>>, PipelineError> {
    match op.status.as_str() {
        "notStarted" | "running" => Ok(None),
        "succeeded" => {
            let result = op
                .analyze_result
                .ok_or_else(|| PipelineError::MalformedOcrPayload {
                    detail: "succeeded without analyzeResult".into(),
                })?;
            let pages = result
                .pages
                .into_iter()
                .map(|p| OcrPage {
                    page_number: p.page_number,
                    lines: p.lines.into_iter().map(|l| l.content).collect(),
                })
                .collect();
            Ok(Some(pages))
        }
        "failed" => {
            let message = op
                .error
                .map(|e| format!("{}: {}", e.code, e.message))
                .unwrap_or_else(|| "no error details".to_string());
            Err(PipelineError::OcrAnalysisFailed { message })
        }
        other => Err(PipelineError::MalformedOcrPayload {
            detail: format!("unknown operation status '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Option<Vec<OcrPage>>, PipelineError> {
        pages_from_operation(serde_json::from_str(json).expect("valid operation json"))
    }

    #[test]
    fn running_operation_is_pending() {
        assert_eq!(parse(r#"{"status":"running"}"#).unwrap(), None);
        assert_eq!(parse(r#"{"status":"notStarted"}"#).unwrap(), None);
    }

    #[test]
    fn succeeded_operation_yields_pages() {
        let json = r#"{
            "status": "succeeded",
            "analyzeResult": {
                "pages": [
                    {"pageNumber": 1, "lines": [{"content": "John Doe,"}, {"content": "Seller"}]},
                    {"pageNumber": 2, "lines": [{"content": "123 Main St"}]},
                    {"pageNumber": 3}
                ]
            }
        }"#;
        let pages = parse(json).unwrap().unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], OcrPage::new(1, ["John Doe,", "Seller"]));
        assert_eq!(pages[2].lines.len(), 0);
    }

    #[test]
    fn failed_operation_reports_service_error() {
        let err = parse(
            r#"{"status":"failed","error":{"code":"InvalidContent","message":"corrupt file"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::OcrAnalysisFailed { .. }));
        assert!(err.to_string().contains("corrupt file"));
    }

    #[test]
    fn succeeded_without_result_is_malformed() {
        let err = parse(r#"{"status":"succeeded"}"#).unwrap_err();
        assert!(err.is_ocr_failure());
    }

    #[test]
    fn analyze_url_trims_trailing_slash() {
        let client =
            AzureDocumentClient::new(AzureOcrConfig::new("https://x.cognitiveservices.azure.com/", "k"))
                .unwrap();
        assert_eq!(
            client.analyze_url(),
            "https://x.cognitiveservices.azure.com/formrecognizer/documentModels/prebuilt-document:analyze?api-version=2023-07-31"
        );
    }

    #[test]
    fn empty_credentials_rejected() {
        assert!(AzureDocumentClient::new(AzureOcrConfig::new("", "k")).is_err());
        assert!(AzureDocumentClient::new(AzureOcrConfig::new("https://x", " ")).is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let dbg = format!("{:?}", AzureOcrConfig::new("https://x", "secret-key"));
        assert!(!dbg.contains("secret-key"));
    }
}
