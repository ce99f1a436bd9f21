//! Progress-callback trait for per-document batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the orchestrator walks a directory. The CLI uses this to drive
//! its progress bar; the library itself only logs.
//!
//! # Example
//!
//! ```rust
//! use scan2csv::{BatchProgressCallback, PipelineConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     written: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, _index: usize, _total: usize, filename: &str) {
//!         self.written.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{filename} written");
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { written: AtomicUsize::new(0) });
//! let config = PipelineConfig::builder()
//!     .progress_callback(cb as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::Stage;
use std::sync::Arc;

/// Called by the batch orchestrator as it processes each document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `index` is 1-based.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after discovery, before any document is processed.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called before a document enters analysis.
    fn on_document_start(&self, index: usize, total: usize, filename: &str) {
        let _ = (index, total, filename);
    }

    /// Called after a document's row has been written.
    fn on_document_complete(&self, index: usize, total: usize, filename: &str) {
        let _ = (index, total, filename);
    }

    /// Called when a document fails; the batch continues.
    fn on_document_error(&self, index: usize, total: usize, filename: &str, stage: Stage, error: String) {
        let _ = (index, total, filename, stage, error);
    }

    /// Called once after every document has been attempted.
    fn on_batch_complete(&self, total_documents: usize, written: usize) {
        let _ = (total_documents, written);
    }
}

/// Convenience alias used by [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

/// A no-op implementation, useful as a placeholder.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}
