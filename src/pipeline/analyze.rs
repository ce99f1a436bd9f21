//! Document analysis: OCR a file into ordered [`PageRecord`]s.
//!
//! The provider reports 1-based page numbers in whatever order it likes.
//! This stage sorts by page number, joins each page's lines with single
//! spaces, and re-indexes to 0-based. A page number of 0, a duplicate, or a
//! gap means the payload cannot be trusted and the document fails.

use crate::error::PipelineError;
use crate::output::PageRecord;
use crate::pipeline::input::read_document;
use crate::pipeline::ocr::{OcrPage, OcrProvider};
use std::path::Path;
use tracing::info;

/// OCR `path` and return its pages, indexed `0..n`.
pub async fn analyze(ocr: &dyn OcrProvider, path: &Path) -> Result<Vec<PageRecord>, PipelineError> {
    let bytes = read_document(path).await?;
    let pages = ocr.analyze(&bytes).await?;
    let records = pages_to_records(pages)?;

    if records.is_empty() {
        return Err(PipelineError::NoTextExtracted {
            path: path.to_path_buf(),
        });
    }

    info!(
        "{}: {} pages via {}",
        path.display(),
        records.len(),
        ocr.name()
    );
    Ok(records)
}

/// Convert provider pages into contiguous 0-based page records.
pub fn pages_to_records(mut pages: Vec<OcrPage>) -> Result<Vec<PageRecord>, PipelineError> {
    pages.sort_by_key(|p| p.page_number);

    pages
        .into_iter()
        .enumerate()
        .map(|(position, page)| {
            let expected = position as u32 + 1;
            if page.page_number != expected {
                return Err(PipelineError::MalformedOcrPayload {
                    detail: format!(
                        "expected page {expected}, provider reported page {}",
                        page.page_number
                    ),
                });
            }
            Ok(PageRecord {
                index: position,
                text: page.lines.join(" "),
            })
        })
        .collect()
}
