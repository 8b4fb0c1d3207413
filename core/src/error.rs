use std::path::PathBuf;

use thiserror::Error;

use crate::DocId;

/// Errors produced while building, loading or querying the index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("document not found: {0}")]
    DocumentNotFound(DocId),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record at {}:{line}: {reason}", .path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid operator [{0}]")]
    InvalidOperator(String),

    /// Query and document vectors must have one dimension per query token.
    /// Seeing this means the ranking code built them inconsistently.
    #[error("vector length mismatch: query has {query} dimensions, document has {document}")]
    VectorLengthMismatch { query: usize, document: usize },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IndexError::Io { path: path.into(), source }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        IndexError::MalformedRecord { path: path.into(), line, reason: reason.into() }
    }

    /// True for errors caused by the caller's query rather than by the index or the host.
    pub fn is_user_error(&self) -> bool {
        matches!(self, IndexError::InvalidQuery(_) | IndexError::InvalidOperator(_))
    }
}
