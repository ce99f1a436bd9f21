//! Pipeline stages for document metadata extraction.
//!
//! Each submodule implements exactly one step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ analyze ──▶ correct ──▶ extract ──▶ (store)
//! (bytes)   (OCR)       (LLM/page)  (LLM+retry)
//! ```
//!
//! 1. [`input`]: read a document, discover batch inputs
//! 2. [`analyze`]: OCR via an [`ocr::OcrProvider`]; ordered 0-based pages
//! 3. [`correct`]: one [`llm::TextModel`] call per page; failures are
//!    page-local
//! 4. [`extract`]: one call for the whole document, bounded retry
//! 5. [`postprocess`]: deterministic cleanup shared by 3 and 4

pub mod analyze;
pub mod correct;
pub mod extract;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod postprocess;
