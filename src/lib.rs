//! # scan2csv
//!
//! Extract structured metadata from scanned legal documents into a CSV
//! table.
//!
//! Scanned deeds come out of OCR full of broken words, stray characters,
//! and lost punctuation. This crate runs each document through OCR, has a
//! language model repair the text one page at a time, then asks the model
//! to fill in a fixed set of fields. Every document becomes one CSV row
//! tagged with its office, document type, and filename. The table's columns
//! widen automatically when a new field shows up.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document (pdf / jpg / png)
//!  │
//!  ├─ 1. Analyze   OCR via Azure Document Intelligence → ordered pages
//!  ├─ 2. Correct   one LLM call per page; a failed page is degraded, not fatal
//!  ├─ 3. Extract   one LLM call for the document, JSON reply, bounded retry
//!  └─ 4. Write     append to the CSV store, widening the header as needed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scan2csv::{
//!     AzureDocumentClient, AzureOcrConfig, BatchMetadata, CsvStore, DocumentSchema,
//!     LlmTextModel, Pipeline, PipelineConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ocr = AzureDocumentClient::new(AzureOcrConfig::new(
//!         std::env::var("AZURE_OCR_ENDPOINT")?,
//!         std::env::var("AZURE_OCR_KEY")?,
//!     ))?;
//!     let model = LlmTextModel::from_provider_name("openai", "gpt-4o")?;
//!     let pipeline = Pipeline::new(
//!         Arc::new(ocr),
//!         Arc::new(model),
//!         DocumentSchema::deed(),
//!         PipelineConfig::default(),
//!     );
//!
//!     let store = Arc::new(CsvStore::new("deeds.csv"));
//!     let batch = BatchMetadata::new("bangalore", "DEED");
//!     let report = pipeline.process_directory("scans/", &batch, &store).await?;
//!     eprintln!("{}/{} written", report.written(), report.total());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `scan2csv` binary (clap + anyhow + tracing-subscriber) |
//! | `server` | on      | Enables the HTTP front end in [`server`] (axum) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod schema;
#[cfg(feature = "server")]
pub mod server;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AttemptFailure, Backoff, PipelineConfig, PipelineConfigBuilder, RetryPolicy};
pub use error::{DocumentError, PageError, PipelineError};
pub use output::{
    BatchMetadata, BatchReport, CorrectedPage, DocumentOutcome, DocumentState, MetadataRecord,
    PageRecord, ProcessedDocument, Stage, NOT_PROVIDED,
};
pub use pipeline::llm::{LlmTextModel, ModelRequest, TextModel};
pub use pipeline::ocr::{AzureDocumentClient, AzureOcrConfig, OcrPage, OcrProvider};
pub use process::Pipeline;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use schema::DocumentSchema;
pub use store::{CsvRow, CsvStore, StoreContents, LEADING_COLUMNS};
