//! Index build and query configuration.
//!
//! Every field has a default, so a partial JSON file (or none at all) is a valid
//! configuration. Command-line flags in the binaries override file values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Number of documents in the reference corpus.
pub const DEFAULT_NUM_DOCUMENTS: u32 = 7945;

/// Documents per block.
pub const DEFAULT_BLOCK_CAPACITY: u32 = 1000;

/// Buffered merge output, in bytes, before it is flushed to the merged index.
pub const DEFAULT_MERGE_FLUSH_BYTES: usize = 100_000;

/// Number of ranked results returned per query.
pub const DEFAULT_TOP_K: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding the corpus, one `{doc_id}.txt` file per document.
    pub data_dir: PathBuf,
    /// Directory receiving block files, the merged index and caches.
    pub index_dir: PathBuf,
    /// Corpus size N; document ids are `1..=N`.
    pub num_documents: u32,
    pub block_capacity: u32,
    pub merge_flush_bytes: usize,
    pub top_k: usize,
    /// Keep block files after a successful merge.
    pub keep_blocks: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            index_dir: PathBuf::from("index"),
            num_documents: DEFAULT_NUM_DOCUMENTS,
            block_capacity: DEFAULT_BLOCK_CAPACITY,
            merge_flush_bytes: DEFAULT_MERGE_FLUSH_BYTES,
            top_k: DEFAULT_TOP_K,
            keep_blocks: true,
        }
    }
}

impl IndexConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
        let config: IndexConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_capacity == 0 {
            return Err(IndexError::Config("block_capacity must be at least 1".into()));
        }
        if self.num_documents == 0 {
            return Err(IndexError::Config("num_documents must be at least 1".into()));
        }
        if self.top_k == 0 {
            return Err(IndexError::Config("top_k must be at least 1".into()));
        }
        Ok(())
    }
}
