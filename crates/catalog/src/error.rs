//! Error types for the catalog crate.
//!
//! Every variant here is a startup failure: once a catalog has loaded it is
//! immutable and lookups cannot fail.

use thiserror::Error;

/// Errors that can occur while loading the reference catalog
#[derive(Error, Debug)]
pub enum CatalogLoadError {
    /// File could not be found or opened
    #[error("Failed to open catalog file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading the source
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A record (or the header) couldn't be parsed
    ///
    /// `line` is 1-based and counts the header row.
    #[error("Parse error at line {line} in {source_name}: {reason}")]
    ParseError {
        source_name: String,
        line: u64,
        reason: String,
    },

    /// The configured identifier column is not in the header
    #[error("Identifier column '{column}' not found in {source_name}")]
    MissingIdColumn { source_name: String, column: String },

    /// A row has an empty or unusable identifier
    #[error("Invalid identifier '{value}' at line {line} in {source_name}")]
    InvalidIdentifier {
        source_name: String,
        line: u64,
        value: String,
    },

    /// Two rows share the same identifier
    #[error("Duplicate identifier {id} at line {line} (first seen at line {first_line})")]
    DuplicateId {
        id: String,
        line: u64,
        first_line: u64,
    },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, CatalogLoadError>;
