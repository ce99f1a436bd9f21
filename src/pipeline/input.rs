//! Input handling: read a document from disk and discover batch inputs.
//!
//! Reading maps I/O failures onto the analyzer's error taxonomy so a
//! missing or unreadable file surfaces as an OCR-stage failure rather than
//! a generic I/O error.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Read the raw bytes of a document.
pub async fn read_document(path: &Path) -> Result<Vec<u8>, PipelineError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            debug!("Read {} ({} bytes)", path.display(), bytes.len());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(PipelineError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(PipelineError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(e) => Err(PipelineError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// True if `path` has an extension on the configured allow-list.
pub fn is_supported(path: &Path, config: &PipelineConfig) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| config.accepts_extension(e))
        .unwrap_or(false)
}

/// List every supported file under `dir`, sorted by path.
///
/// Entries that cannot be read mid-walk are skipped with a warning; only an
/// unreadable root is an error.
pub fn discover_documents(dir: &Path, config: &PipelineConfig) -> Result<Vec<PathBuf>, PipelineError> {
    let meta = std::fs::metadata(dir).map_err(|e| PipelineError::DirectoryUnreadable {
        path: dir.to_path_buf(),
        detail: e.to_string(),
    })?;
    if !meta.is_dir() {
        return Err(PipelineError::DirectoryUnreadable {
            path: dir.to_path_buf(),
            detail: "not a directory".into(),
        });
    }

    let mut walker = WalkDir::new(dir).follow_links(true);
    if !config.recursive {
        walker = walker.max_depth(1);
    }

    let mut found = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(PipelineError::DirectoryUnreadable {
                    path: dir.to_path_buf(),
                    detail: e.to_string(),
                })
            }
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() && is_supported(entry.path(), config) {
            found.push(entry.into_path());
        }
    }

    found.sort();
    debug!("Discovered {} documents under {}", found.len(), dir.display());
    Ok(found)
}
