//! Data model shared by every pipeline stage.
//!
//! Pages travel through the pipeline as [`PageRecord`] (raw OCR) and then
//! [`CorrectedPage`] (after model cleanup). Extraction produces a
//! [`MetadataRecord`], and the batch orchestrator summarises a run as a
//! [`BatchReport`].

use crate::error::PageError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// Value written for a field the model could not find in the document.
pub const NOT_PROVIDED: &str = "Not provided";

/// Prefix the model uses for fields it found but could not read reliably.
pub const UNCLEAR_PREFIX: &str = "Unclear - ";

/// One page of raw OCR output.
///
/// `index` is 0-based and always equals the page's position in the
/// document's page vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub index: usize,
    pub text: String,
}

/// One page after the correction pass.
///
/// `text` is `None` when the correction call failed; `error` then says why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectedPage {
    pub index: usize,
    pub text: Option<String>,
    pub error: Option<PageError>,
}

impl CorrectedPage {
    pub fn is_degraded(&self) -> bool {
        self.text.is_none()
    }
}

/// Extracted field values for one document, in schema order.
///
/// Keys are always drawn from the schema's field list; the extractor never
/// inserts a key the schema does not name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    fields: Vec<(String, String)>,
}

impl MetadataRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field` to `value`, replacing an earlier value for the same field.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == field)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in insertion (schema) order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of fields that hold something other than [`NOT_PROVIDED`].
    pub fn provided_count(&self) -> usize {
        self.fields.iter().filter(|(_, v)| v != NOT_PROVIDED).count()
    }
}

// Serialised as a JSON object in schema order, which is what the HTTP
// `/process` route returns.
impl Serialize for MetadataRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Static metadata attached to every row written during one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMetadata {
    pub office_name: String,
    pub document_type: String,
}

impl BatchMetadata {
    pub fn new(office_name: impl Into<String>, document_type: impl Into<String>) -> Self {
        Self {
            office_name: office_name.into(),
            document_type: document_type.into(),
        }
    }
}

/// The pipeline stages a document can fail in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Analysis,
    Correction,
    Extraction,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Analysis => "analysis",
            Stage::Correction => "correction",
            Stage::Extraction => "extraction",
            Stage::Write => "write",
        };
        f.write_str(s)
    }
}

/// Lifecycle of one document within a batch.
///
/// `Discovered → Analyzed → Corrected → Extracted → Written`, or
/// `Failed(stage)` at any transition. Failed documents are not revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Discovered,
    Analyzed,
    Corrected,
    Extracted,
    Written,
    Failed(Stage),
}

impl DocumentState {
    /// State after the stage this one waits on completes. Terminal states
    /// stay put.
    pub fn advance(self) -> DocumentState {
        match self {
            DocumentState::Discovered => DocumentState::Analyzed,
            DocumentState::Analyzed => DocumentState::Corrected,
            DocumentState::Corrected => DocumentState::Extracted,
            DocumentState::Extracted => DocumentState::Written,
            terminal => terminal,
        }
    }
}

/// Result of running one document through analysis, correction, and
/// extraction.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub path: PathBuf,
    pub pages: Vec<CorrectedPage>,
    pub record: MetadataRecord,
    /// Number of extraction calls it took (1 = first try).
    pub extraction_attempts: u32,
}

impl ProcessedDocument {
    pub fn degraded_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.is_degraded()).count()
    }
}

/// What happened to one document in a batch.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentOutcome {
    pub path: PathBuf,
    pub filename: String,
    pub state: DocumentState,
    pub degraded_pages: usize,
    pub extraction_attempts: u32,
    pub error: Option<String>,
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub documents: Vec<DocumentOutcome>,
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn written(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| d.state == DocumentState::Written)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| matches!(d.state, DocumentState::Failed(_)))
            .count()
    }

    pub fn total(&self) -> usize {
        self.documents.len()
    }
}
