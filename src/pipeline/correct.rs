//! OCR correction: one model call per page, sequential.
//!
//! Failure here is page-local. A page whose call errors, or whose reply is
//! empty after cleanup, keeps its index with `text = None` and a
//! [`PageError`]; the document carries on with the remaining pages.

use crate::config::PipelineConfig;
use crate::error::PageError;
use crate::output::{CorrectedPage, PageRecord};
use crate::pipeline::llm::{ModelRequest, TextModel};
use crate::pipeline::postprocess::clean_corrected_text;
use crate::prompts::{correction_prompt, CORRECTION_SYSTEM_PROMPT};
use tracing::{debug, warn};

/// Correct every page, preserving count and order.
pub async fn correct(
    model: &dyn TextModel,
    pages: &[PageRecord],
    config: &PipelineConfig,
) -> Vec<CorrectedPage> {
    let mut corrected = Vec::with_capacity(pages.len());
    for page in pages {
        corrected.push(correct_page(model, page, config).await);
    }

    let degraded = corrected.iter().filter(|p| p.is_degraded()).count();
    if degraded > 0 {
        warn!("{}/{} pages degraded during correction", degraded, pages.len());
    }
    corrected
}

/// Correct a single page. Never fails; errors land in the result.
pub async fn correct_page(
    model: &dyn TextModel,
    page: &PageRecord,
    config: &PipelineConfig,
) -> CorrectedPage {
    let request = ModelRequest::new(
        correction_prompt(config.correction_prompt.as_deref(), &page.text),
        config.correction_max_tokens,
    )
    .with_system(CORRECTION_SYSTEM_PROMPT)
    .with_temperature(config.temperature);

    match model.complete(&request).await {
        Ok(reply) => {
            let cleaned = clean_corrected_text(&reply);
            if cleaned.is_empty() {
                warn!("Page {}: correction returned no text", page.index);
                return CorrectedPage {
                    index: page.index,
                    text: None,
                    error: Some(PageError::EmptyCorrection { index: page.index }),
                };
            }
            debug!(
                "Page {}: {} → {} chars",
                page.index,
                page.text.len(),
                cleaned.len()
            );
            CorrectedPage {
                index: page.index,
                text: Some(cleaned),
                error: None,
            }
        }
        Err(e) => {
            warn!("Page {}: correction failed: {}", page.index, e);
            CorrectedPage {
                index: page.index,
                text: None,
                error: Some(PageError::CorrectionFailed {
                    index: page.index,
                    detail: e.to_string(),
                }),
            }
        }
    }
}

/// Pass raw OCR text through unchanged, for runs with correction disabled.
pub fn passthrough(pages: &[PageRecord]) -> Vec<CorrectedPage> {
    pages
        .iter()
        .map(|p| CorrectedPage {
            index: p.index,
            text: Some(p.text.clone()),
            error: None,
        })
        .collect()
}
