//! The CSV store and its schema-merging writer.
//!
//! Every append is a full read-modify-rewrite: the header grows to the union
//! of the old columns and the new row's fields, old rows are re-keyed by
//! column name and padded with empty cells, and the new row goes last.
//! Nothing already written is ever dropped.
//!
//! The rewrite goes to a temporary file in the store's directory which is
//! then renamed over the store, so a crash mid-write leaves the previous
//! version intact. Appends through one [`CsvStore`] are serialised by an
//! internal mutex; separate processes writing the same file must coordinate
//! on their own.

use crate::error::PipelineError;
use crate::output::{BatchMetadata, MetadataRecord};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Columns every row starts with, in this order.
pub const LEADING_COLUMNS: [&str; 3] = ["office_name", "document_type", "filename"];

/// One row to append: batch metadata, file name, and extracted fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    cells: Vec<(String, String)>,
}

impl CsvRow {
    /// Combine the leading columns with a record's fields.
    pub fn new(batch: &BatchMetadata, filename: impl Into<String>, record: &MetadataRecord) -> Self {
        let mut cells = vec![
            (LEADING_COLUMNS[0].to_string(), batch.office_name.clone()),
            (LEADING_COLUMNS[1].to_string(), batch.document_type.clone()),
            (LEADING_COLUMNS[2].to_string(), filename.into()),
        ];
        for (k, v) in record.iter() {
            if !LEADING_COLUMNS.contains(&k) {
                cells.push((k.to_string(), v.to_string()));
            }
        }
        Self { cells }
    }

    /// Build a row from raw `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cells: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(k, _)| k.as_str())
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
    }
}

/// Header plus rows, as read from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreContents {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl StoreContents {
    /// Cell at (`row`, `column`), if both exist.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.header.iter().position(|h| h == column)?;
        self.rows.get(row)?.get(col).map(String::as_str)
    }
}

/// A CSV file whose header only ever grows.
#[derive(Debug)]
pub struct CsvStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current header and rows. `Ok(None)` if the store does not
    /// exist yet.
    ///
    /// Short rows are padded to the header width. Cells beyond the header
    /// have no column to live in and are left out of the result with a
    /// warning; [`CsvStore::append`] and [`CsvStore::rewrite`] refuse such a
    /// file instead.
    pub fn read(&self) -> Result<Option<StoreContents>, PipelineError> {
        self.load(false)
    }

    /// With `strict`, a file that a rewrite could not reproduce is an error:
    /// a header naming a column twice, or a row with non-empty cells past
    /// the header.
    fn load(&self, strict: bool) -> Result<Option<StoreContents>, PipelineError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let read_err = |detail: String| PipelineError::StoreReadFailed {
            path: self.path.clone(),
            detail,
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| read_err(e.to_string()))?;

        let header: Vec<String> = reader
            .headers()
            .map_err(|e| read_err(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();

        if strict {
            let mut seen = HashSet::new();
            if let Some(dup) = header.iter().find(|col| !seen.insert(col.as_str())) {
                return Err(read_err(format!(
                    "column '{dup}' appears more than once in the header"
                )));
            }
        }

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| read_err(e.to_string()))?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            if row.len() > header.len() {
                let surplus = row[header.len()..].iter().any(|c| !c.is_empty());
                if strict && surplus {
                    return Err(read_err(format!(
                        "row {} has {} cells for {} columns",
                        i + 1,
                        row.len(),
                        header.len()
                    )));
                }
                if surplus {
                    warn!(
                        "{}: row {} has {} cells for {} columns; ignoring the surplus",
                        self.path.display(),
                        i + 1,
                        row.len(),
                        header.len()
                    );
                }
                row.truncate(header.len());
            }
            row.resize(header.len(), String::new());
            rows.push(row);
        }

        Ok(Some(StoreContents { header, rows }))
    }

    /// Append `row`, widening the header as needed. Returns the header now
    /// on disk.
    ///
    /// Fails with [`PipelineError::StoreReadFailed`] and leaves the file
    /// untouched if the existing contents could not be rewritten intact.
    pub fn append(&self, row: &CsvRow) -> Result<Vec<String>, PipelineError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| PipelineError::Internal("store lock poisoned".into()))?;

        let existing = self.load(true)?;
        let header = merge_columns(row, existing.as_ref().map(|c| c.header.as_slice()));

        let mut rows: Vec<Vec<String>> = match existing {
            Some(contents) => rows_under_header(&contents, &header),
            None => Vec::new(),
        };
        rows.push(
            header
                .iter()
                .map(|col| row.get(col).unwrap_or_default().to_string())
                .collect(),
        );

        self.write_atomic(&header, &rows)?;
        info!(
            "{}: {} rows, {} columns",
            self.path.display(),
            rows.len(),
            header.len()
        );
        Ok(header)
    }

    /// Rewrite the store from its own contents without adding a row.
    ///
    /// Pads short rows; otherwise reproduces the same cells. Refuses the
    /// same files [`CsvStore::append`] does.
    pub fn rewrite(&self) -> Result<(), PipelineError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| PipelineError::Internal("store lock poisoned".into()))?;

        match self.load(true)? {
            Some(contents) => self.write_atomic(&contents.header, &contents.rows),
            None => Ok(()),
        }
    }

    fn write_atomic(&self, header: &[String], rows: &[Vec<String>]) -> Result<(), PipelineError> {
        let write_err = |detail: String| PipelineError::StoreWriteFailed {
            path: self.path.clone(),
            detail,
        };

        // Replace the file a symlinked store points at, not the link.
        let target = std::fs::canonicalize(&self.path).unwrap_or_else(|_| self.path.clone());
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| write_err(e.to_string()))?;

        let tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| write_err(e.to_string()))?;
        if let Ok(meta) = std::fs::metadata(&target) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(|e| write_err(e.to_string()))?;
        }
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file());
            writer
                .write_record(header)
                .map_err(|e| write_err(e.to_string()))?;
            for row in rows {
                writer
                    .write_record(row)
                    .map_err(|e| write_err(e.to_string()))?;
            }
            writer.flush().map_err(|e| write_err(e.to_string()))?;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|e| write_err(e.to_string()))?;
        tmp.persist(&target)
            .map_err(|e| write_err(e.error.to_string()))?;

        debug!("Rewrote {}", self.path.display());
        Ok(())
    }
}

/// Final column order: leading columns, the row's own fields, then any
/// existing column the first two did not cover.
pub fn merge_columns(row: &CsvRow, existing: Option<&[String]>) -> Vec<String> {
    let mut header: Vec<String> = LEADING_COLUMNS.iter().map(|c| c.to_string()).collect();
    for col in row.columns() {
        if !header.iter().any(|h| h == col) {
            header.push(col.to_string());
        }
    }
    if let Some(existing) = existing {
        for col in existing {
            if !header.iter().any(|h| h == col) {
                header.push(col.clone());
            }
        }
    }
    header
}

/// Re-key existing rows onto `header`, padding new columns with "".
fn rows_under_header(contents: &StoreContents, header: &[String]) -> Vec<Vec<String>> {
    let position: HashMap<&str, usize> = contents
        .header
        .iter()
        .enumerate()
        .map(|(i, col)| (col.as_str(), i))
        .collect();

    contents
        .rows
        .iter()
        .map(|row| {
            header
                .iter()
                .map(|col| {
                    position
                        .get(col.as_str())
                        .and_then(|&i| row.get(i))
                        .cloned()
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect()
}
