use std::path::PathBuf;

use thiserror::Error;

/// Configuration-level failures that abort the run before or while writing.
///
/// Per-document and per-asset problems are not errors at this level; they are
/// collected in the [`ImportReport`](crate::ImportReport) and the run carries
/// on.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source root not found or not a directory: {0}")]
    SourceNotFound(PathBuf),

    #[error("no HTML documents found under: {0}")]
    NoDocuments(PathBuf),

    #[error("output root {output} overlaps the source tree {source_root}")]
    OutputOverlapsSource { output: PathBuf, source_root: PathBuf },

    #[error("converter '{0}' is not available (is it installed and on PATH?)")]
    ConverterUnavailable(String),
}

pub type Result<T> = std::result::Result<T, ImportError>;
