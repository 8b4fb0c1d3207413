//! Per-document token counts used to normalize ranking scores.
//!
//! Cached on disk as one JSON object keyed by doc id text: `{"1": 120, "2": 45}`.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::persist::write_atomic;
use crate::posting::DocId;
use crate::source::DocumentSource;
use crate::tokenizer::Analyzer;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentLengths {
    lengths: BTreeMap<DocId, u32>,
}

impl DocumentLengths {
    pub fn get(&self, doc_id: DocId) -> Option<u32> {
        self.lengths.get(&doc_id).copied()
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Read documents `1..=num_documents` and count their tokens.
    pub fn compute(source: &dyn DocumentSource, analyzer: &dyn Analyzer, num_documents: u32) -> Result<Self> {
        let lengths = (1..=num_documents)
            .into_par_iter()
            .map(|doc_id| -> Result<(DocId, u32)> {
                let text = source.read_document(doc_id)?;
                Ok((doc_id, analyzer.token_count(&text)))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self { lengths })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        write_atomic(path, json.as_bytes())
    }

    /// Load the cache at `path`, or compute it from the corpus and write it there.
    pub fn load_or_compute(
        path: &Path,
        source: &dyn DocumentSource,
        analyzer: &dyn Analyzer,
        num_documents: u32,
    ) -> Result<Self> {
        let start = Instant::now();
        if path.is_file() {
            let lengths = Self::load(path)?;
            tracing::info!(docs = lengths.len(), elapsed_ms = start.elapsed().as_millis() as u64, "document lengths loaded");
            return Ok(lengths);
        }
        let lengths = Self::compute(source, analyzer, num_documents)?;
        lengths.save(path)?;
        tracing::info!(docs = lengths.len(), elapsed_ms = start.elapsed().as_millis() as u64, "document lengths computed");
        Ok(lengths)
    }
}

impl FromIterator<(DocId, u32)> for DocumentLengths {
    fn from_iter<I: IntoIterator<Item = (DocId, u32)>>(iter: I) -> Self {
        Self { lengths: iter.into_iter().collect() }
    }
}
