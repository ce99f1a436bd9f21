//! Pipeline orchestration: one document, or a whole directory.
//!
//! [`Pipeline`] holds the provider handles and the schema; nothing is read
//! from globals. A batch walks the directory, runs every document through
//! analysis → correction → extraction, and appends each success to the
//! store. A document that fails is logged and skipped; the batch moves on.

use crate::config::PipelineConfig;
use crate::error::{DocumentError, PipelineError};
use crate::output::{
    BatchMetadata, BatchReport, DocumentOutcome, DocumentState, ProcessedDocument, Stage,
};
use crate::pipeline::llm::TextModel;
use crate::pipeline::ocr::OcrProvider;
use crate::pipeline::{analyze, correct, extract, input};
use crate::schema::DocumentSchema;
use crate::store::{CsvRow, CsvStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// The assembled extraction pipeline.
#[derive(Clone)]
pub struct Pipeline {
    ocr: Arc<dyn OcrProvider>,
    model: Arc<dyn TextModel>,
    schema: Arc<DocumentSchema>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        ocr: Arc<dyn OcrProvider>,
        model: Arc<dyn TextModel>,
        schema: DocumentSchema,
        config: PipelineConfig,
    ) -> Self {
        Self {
            ocr,
            model,
            schema: Arc::new(schema),
            config,
        }
    }

    /// Run one document through analysis, correction, and extraction.
    ///
    /// Writes nothing. Degraded pages do not fail the document; an OCR
    /// failure or exhausted extraction does.
    pub async fn process_document(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<ProcessedDocument, DocumentError> {
        let mut state = DocumentState::Discovered;
        self.process_tracked(path.as_ref(), &mut state).await
    }

    /// Process one document and append its row to `store`.
    pub async fn process_and_write(
        &self,
        path: impl AsRef<Path>,
        batch: &BatchMetadata,
        store: &Arc<CsvStore>,
    ) -> Result<ProcessedDocument, DocumentError> {
        let mut state = DocumentState::Discovered;
        self.write_tracked(path.as_ref(), batch, store, &mut state)
            .await
    }

    /// Leaves `state` at `Extracted` on success, or at the last state
    /// reached before the failing stage.
    async fn process_tracked(
        &self,
        path: &Path,
        state: &mut DocumentState,
    ) -> Result<ProcessedDocument, DocumentError> {
        info!("Processing {}", path.display());

        let pages = analyze::analyze(self.ocr.as_ref(), path)
            .await
            .map_err(|e| DocumentError::new(path, Stage::Analysis, e))?;
        *state = state.advance();
        info!("{}: OCR complete ({:?}), correcting", path.display(), state);

        let corrected = if self.config.skip_correction {
            correct::passthrough(&pages)
        } else {
            correct::correct(self.model.as_ref(), &pages, &self.config).await
        };
        *state = state.advance();
        info!("{}: correction complete ({:?}), extracting", path.display(), state);

        let extraction = extract::extract(self.model.as_ref(), &corrected, &self.schema, &self.config)
            .await
            .map_err(|e| DocumentError::new(path, Stage::Extraction, e))?;
        *state = state.advance();

        Ok(ProcessedDocument {
            path: path.to_path_buf(),
            pages: corrected,
            record: extraction.record,
            extraction_attempts: extraction.attempts,
        })
    }

    /// Leaves `state` at `Written` on success.
    async fn write_tracked(
        &self,
        path: &Path,
        batch: &BatchMetadata,
        store: &Arc<CsvStore>,
        state: &mut DocumentState,
    ) -> Result<ProcessedDocument, DocumentError> {
        let processed = self.process_tracked(path, state).await?;
        let row = CsvRow::new(batch, file_name(path), &processed.record);
        write_row(store, row)
            .await
            .map_err(|e| DocumentError::new(path, Stage::Write, e))?;
        *state = state.advance();
        Ok(processed)
    }

    /// Process every supported file under `dir`, appending successes to
    /// `store`.
    ///
    /// Returns `Err` only if `dir` cannot be listed. Per-document failures
    /// are recorded in the report.
    pub async fn process_directory(
        &self,
        dir: impl AsRef<Path>,
        batch: &BatchMetadata,
        store: &Arc<CsvStore>,
    ) -> Result<BatchReport, PipelineError> {
        let start = Instant::now();
        let dir = dir.as_ref();
        let documents = input::discover_documents(dir, &self.config)?;
        let total = documents.len();
        info!(
            "Found {} documents in {} (office: {}, type: {})",
            total,
            dir.display(),
            batch.office_name,
            batch.document_type
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_start(total);
        }

        let mut report = BatchReport::default();
        for (i, path) in documents.into_iter().enumerate() {
            let outcome = self.run_one(path, i + 1, total, batch, store).await;
            report.documents.push(outcome);
        }
        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Batch complete: {}/{} written, {} failed, {}ms",
            report.written(),
            total,
            report.failed(),
            report.duration_ms
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_batch_complete(total, report.written());
        }
        Ok(report)
    }

    async fn run_one(
        &self,
        path: PathBuf,
        index: usize,
        total: usize,
        batch: &BatchMetadata,
        store: &Arc<CsvStore>,
    ) -> DocumentOutcome {
        let filename = file_name(&path);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_document_start(index, total, &filename);
        }

        let mut state = DocumentState::Discovered;
        match self.write_tracked(&path, batch, store, &mut state).await {
            Ok(processed) => {
                let degraded = processed.degraded_pages();
                if degraded > 0 {
                    warn!("{}: written with {} degraded pages", filename, degraded);
                }
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_document_complete(index, total, &filename);
                }
                DocumentOutcome {
                    path,
                    filename,
                    state,
                    degraded_pages: degraded,
                    extraction_attempts: processed.extraction_attempts,
                    error: None,
                }
            }
            Err(e) => {
                error!("{} (last state {:?})", e, state);
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_document_error(index, total, &filename, e.stage, e.source.to_string());
                }
                DocumentOutcome {
                    path,
                    filename,
                    state: DocumentState::Failed(e.stage),
                    degraded_pages: 0,
                    extraction_attempts: 0,
                    error: Some(e.source.to_string()),
                }
            }
        }
    }
}

/// Run the blocking store rewrite off the async executor.
pub async fn write_row(store: &Arc<CsvStore>, row: CsvRow) -> Result<Vec<String>, PipelineError> {
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || store.append(&row))
        .await
        .map_err(|e| PipelineError::Internal(format!("store task panicked: {e}")))?
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_strips_directories() {
        assert_eq!(file_name(Path::new("/docs/deeds/lease1.pdf")), "lease1.pdf");
        assert_eq!(file_name(Path::new("lease1.pdf")), "lease1.pdf");
    }
}
