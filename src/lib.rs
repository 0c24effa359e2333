//! # fieldmap - connection-graph field mapper for JSON datasets
//!
//! Merges several JSON datasets into one denormalized dataset. Fields of
//! different files are declared equal through *connections*; the files and
//! connections form an undirected graph that is walked from a primary file,
//! pulling the selected fields of every reachable file into the primary
//! file's records.
//!
//! ## Modules
//!
//! - **structure**: flattened field discovery and dotted-path access
//! - **ingest**: parsing uploads and reducing documents to record lists
//! - **session**: files, field selections and connections
//! - **merge**: connection graph, join indexes, propagation and projection
//! - **export**: JSON / NDJSON output
//! - **config**: TOML mapping files
//!
//! ## Quick Start
//!
//! ```rust
//! use fieldmap::Session;
//! use serde_json::json;
//!
//! # fn main() -> fieldmap::Result<()> {
//! let mut session = Session::new();
//! let users = session.ingest_value("users.json", json!([{"id": "1", "k": "x"}]));
//! let extra = session.ingest_value("extra.json", json!([{"k": "x", "v": "hello"}]));
//!
//! session.add_connection(&users, "k", &extra, "k")?;
//!
//! let output = session.merge(Some(&users))?;
//! assert_eq!(output.records.len(), 1);
//! assert_eq!(output.records[0]["v"], "hello");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod merge;
pub mod session;
pub mod structure;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{MapperError, Result};
pub use export::{OutputFormat, RecordWriter};
pub use merge::{ConnectionGraph, JoinIndex, MergeInput, MergeOutput, MergeReport};
pub use session::Session;
pub use structure::{extract_structure, get_nested_value};
pub use types::{
    Connection, ConnectionId, FieldSelection, FileDataset, FileId, MergedRecord, Structure, TypeLabel,
};
