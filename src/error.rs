use crate::types::FileId;

/// Errors raised by ingestion, the connection store, merging and export.
///
/// Missing join values, unreachable files and absent fields are not errors:
/// the merge skips them and only logs at `debug`/`trace` level.
#[derive(Debug, thiserror::Error)]
pub enum MapperError {
    /// Upload content could not be parsed as JSON
    #[error("Error parsing file {file}: {message}")]
    Parse { file: String, message: String },

    /// Merge requested without enough files or connections
    #[error("Merging needs at least 2 files and 1 connection (have {files} files, {connections} connections)")]
    Precondition { files: usize, connections: usize },

    /// Both ends of a connection point at the same file
    #[error("Cannot connect two fields of the same file: {0}")]
    SelfConnection(FileId),

    #[error("File not found: {0}")]
    UnknownFile(FileId),

    /// A name or stem matches more than one ingested file
    #[error("File reference '{reference}' matches {count} files; use a file id or position")]
    AmbiguousFile { reference: String, count: usize },

    #[error("Field '{field}' not found in file {file}")]
    UnknownField { file: FileId, field: String },

    #[error("No merged data to export")]
    NothingToExport,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MapperError>;
