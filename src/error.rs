//! Error types for the scan2csv library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`PipelineError`]: **Fatal** to the operation that raised it, e.g.
//!   extraction exhausted its attempts or the store could not be rewritten.
//!   Returned as `Err(PipelineError)` from every stage.
//!
//! * [`PageError`]: **Non-fatal**: the correction call for a single page
//!   failed. Stored inside [`crate::output::CorrectedPage`]; the document
//!   continues with that page's text absent.
//!
//! * [`DocumentError`]: a [`PipelineError`] tagged with the document and the
//!   [`Stage`] it died in. The batch orchestrator logs these and moves on to
//!   the next document.

use crate::output::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the scan2csv library.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Input / OCR errors ────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but could not be read.
    #[error("Failed to read document '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The OCR endpoint could not be reached or rejected the request.
    #[error("OCR request failed: {message}")]
    OcrRequestFailed { message: String },

    /// The OCR service accepted the document but reported a failed analysis.
    #[error("OCR analysis failed: {message}")]
    OcrAnalysisFailed { message: String },

    /// The OCR payload did not match the expected page structure.
    #[error("Malformed OCR payload: {detail}")]
    MalformedOcrPayload { detail: String },

    /// OCR succeeded but returned no pages.
    #[error("No data extracted from '{path}'")]
    NoTextExtracted { path: PathBuf },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API returned an error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The model replied, but not with the JSON object we asked for.
    #[error("Unparseable extraction response: {detail}")]
    UnparseableResponse { detail: String },

    /// Every extraction attempt came back empty or unparseable.
    #[error("Metadata extraction failed: max attempts exceeded ({attempts} attempts)\nLast error: {last_error}")]
    ExtractionFailed { attempts: u32, last_error: String },

    // ── Store errors ──────────────────────────────────────────────────────
    /// The existing CSV store could not be read back.
    #[error("Failed to read CSV store '{path}': {detail}")]
    StoreReadFailed { path: PathBuf, detail: String },

    /// Could not create or rewrite the CSV store.
    #[error("Failed to write CSV store '{path}': {detail}")]
    StoreWriteFailed { path: PathBuf, detail: String },

    // ── Batch errors ──────────────────────────────────────────────────────
    /// The input directory could not be listed.
    #[error("Cannot read document directory '{path}': {detail}")]
    DirectoryUnreadable { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// A document schema failed validation or could not be loaded.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// True for the failures the analyzer can raise: unreadable file,
    /// unreachable provider, malformed payload.
    pub fn is_ocr_failure(&self) -> bool {
        matches!(
            self,
            PipelineError::FileNotFound { .. }
                | PipelineError::PermissionDenied { .. }
                | PipelineError::ReadFailed { .. }
                | PipelineError::OcrRequestFailed { .. }
                | PipelineError::OcrAnalysisFailed { .. }
                | PipelineError::MalformedOcrPayload { .. }
                | PipelineError::NoTextExtracted { .. }
        )
    }

    /// True for failures of the CSV store.
    pub fn is_write_failure(&self) -> bool {
        matches!(
            self,
            PipelineError::StoreReadFailed { .. } | PipelineError::StoreWriteFailed { .. }
        )
    }
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::output::CorrectedPage`] when the correction
/// call fails. The document continues with that page's text absent.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The correction call itself failed.
    #[error("Page {index}: correction failed: {detail}")]
    CorrectionFailed { index: usize, detail: String },

    /// The model replied with nothing usable as text.
    #[error("Page {index}: correction returned an empty response")]
    EmptyCorrection { index: usize },
}

/// A document-level failure, tagged with the stage that failed.
#[derive(Debug, Error)]
#[error("{} failed at {stage}: {source}", path.display())]
pub struct DocumentError {
    pub path: PathBuf,
    pub stage: Stage,
    #[source]
    pub source: PipelineError,
}

impl DocumentError {
    pub fn new(path: impl Into<PathBuf>, stage: Stage, source: PipelineError) -> Self {
        Self {
            path: path.into(),
            stage,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_failed_display() {
        let e = PipelineError::ExtractionFailed {
            attempts: 5,
            last_error: "empty response".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("max attempts exceeded"), "got: {msg}");
        assert!(msg.contains("5 attempts"), "got: {msg}");
    }

    #[test]
    fn ocr_taxonomy() {
        assert!(PipelineError::FileNotFound { path: "a.pdf".into() }.is_ocr_failure());
        assert!(PipelineError::MalformedOcrPayload { detail: "x".into() }.is_ocr_failure());
        assert!(!PipelineError::LlmApiError { message: "x".into() }.is_ocr_failure());
    }

    #[test]
    fn write_taxonomy() {
        let e = PipelineError::StoreWriteFailed {
            path: "out.csv".into(),
            detail: "disk full".into(),
        };
        assert!(e.is_write_failure());
        assert!(!e.is_ocr_failure());
    }

    #[test]
    fn document_error_display_names_stage() {
        let e = DocumentError::new(
            "deeds/lease1.pdf",
            Stage::Extraction,
            PipelineError::ExtractionFailed {
                attempts: 5,
                last_error: "null response".into(),
            },
        );
        let msg = e.to_string();
        assert!(msg.contains("lease1.pdf"), "got: {msg}");
        assert!(msg.contains("extraction"), "got: {msg}");
    }

    #[test]
    fn page_error_display() {
        let e = PageError::CorrectionFailed {
            index: 2,
            detail: "timeout".into(),
        };
        assert_eq!(e.to_string(), "Page 2: correction failed: timeout");
    }
}
