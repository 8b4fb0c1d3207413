//! Single-pass in-memory indexing of one document range.
//!
//! A [`Block`] owns postings for a contiguous id range only. Documents are fed
//! in ascending id order, so appending to a posting list keeps it sorted, and
//! term keys are kept sorted by insertion as they are first seen, so the block
//! can be written in term order without sorting its postings.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;

use crate::error::{IndexError, Result};
use crate::persist::{write_atomic, IndexPaths};
use crate::posting::{DocId, Posting, PostingList, TermRecord};
use crate::source::DocumentSource;
use crate::tokenizer::Analyzer;

/// A block id and the documents it covers. Ids start at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSpec {
    pub id: u32,
    pub docs: RangeInclusive<DocId>,
}

/// Split `1..=num_documents` into consecutive ranges of `capacity` documents;
/// the last range may be shorter.
pub fn partition(num_documents: u32, capacity: u32) -> Result<Vec<BlockSpec>> {
    if capacity == 0 {
        return Err(IndexError::Config("block capacity must be at least 1".into()));
    }
    let mut specs = Vec::with_capacity(num_documents.div_ceil(capacity) as usize);
    let mut start: DocId = 1;
    let mut id = 1;
    while start <= num_documents {
        let end = start.saturating_add(capacity - 1).min(num_documents);
        specs.push(BlockSpec { id, docs: start..=end });
        id += 1;
        start = match end.checked_add(1) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(specs)
}

#[derive(Debug, Default)]
pub struct Block {
    id: u32,
    postings: HashMap<String, PostingList>,
    sorted_terms: Vec<String>,
    last_doc: DocId,
}

impl Block {
    pub fn new(id: u32) -> Self {
        Self { id, ..Self::default() }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn num_terms(&self) -> usize {
        self.sorted_terms.len()
    }

    /// Index every document of `spec`. Any unreadable document fails the whole block.
    pub fn build(spec: &BlockSpec, source: &dyn DocumentSource, analyzer: &dyn Analyzer) -> Result<Self> {
        let mut block = Block::new(spec.id);
        for doc_id in spec.docs.clone() {
            let text = source.read_document(doc_id)?;
            block.add_document(doc_id, &analyzer.normalize(&text));
        }
        Ok(block)
    }

    /// Add one document's term sequence. Documents must arrive in increasing id order.
    pub fn add_document(&mut self, doc_id: DocId, terms: &[String]) {
        debug_assert!(doc_id > self.last_doc, "documents must be added in increasing id order");
        self.last_doc = doc_id;

        let mut freqs: HashMap<&str, u32> = HashMap::new();
        for term in terms {
            *freqs.entry(term.as_str()).or_insert(0) += 1;
        }
        for (term, tf) in freqs {
            match self.postings.get_mut(term) {
                Some(list) => list.push(Posting::new(doc_id, tf)),
                None => {
                    self.postings.insert(term.to_string(), vec![Posting::new(doc_id, tf)]);
                    if let Err(pos) = self.sorted_terms.binary_search_by(|t| t.as_str().cmp(term)) {
                        self.sorted_terms.insert(pos, term.to_string());
                    }
                }
            }
        }
    }

    pub fn postings(&self, term: &str) -> Option<&[Posting]> {
        self.postings.get(term).map(Vec::as_slice)
    }

    /// Records in ascending term order, consuming the block.
    pub fn into_records(mut self) -> impl Iterator<Item = TermRecord> {
        let terms = std::mem::take(&mut self.sorted_terms);
        terms.into_iter().map(move |term| {
            let postings = self.postings.remove(&term).unwrap_or_default();
            TermRecord { term, postings }
        })
    }

    /// Serialize to `path`, one record per line. Returns the number of terms written.
    pub fn write_to(self, path: &Path) -> Result<usize> {
        let mut out = String::new();
        let mut n = 0;
        for record in self.into_records() {
            out.push_str(&record.to_line()?);
            out.push('\n');
            n += 1;
        }
        write_atomic(path, out.as_bytes())?;
        Ok(n)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSummary {
    pub id: u32,
    pub num_docs: u32,
    pub num_terms: usize,
}

/// Build and write one block file.
pub fn build_block(
    spec: &BlockSpec,
    paths: &IndexPaths,
    source: &dyn DocumentSource,
    analyzer: &dyn Analyzer,
) -> Result<BlockSummary> {
    let start = Instant::now();
    let block = Block::build(spec, source, analyzer)?;
    let block_id = block.id();
    let num_terms = block.write_to(&paths.block(block_id))?;
    let num_docs = spec.docs.end() - spec.docs.start() + 1;
    tracing::info!(
        block_id,
        num_docs,
        num_terms,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "block written"
    );
    Ok(BlockSummary { id: block_id, num_docs, num_terms })
}

/// Build all blocks in parallel. Blocks share no state; each writes its own file.
/// Returns summaries in block-id order, or the first error encountered.
pub fn build_blocks(
    specs: &[BlockSpec],
    paths: &IndexPaths,
    source: &dyn DocumentSource,
    analyzer: &dyn Analyzer,
) -> Result<Vec<BlockSummary>> {
    paths.ensure_root()?;
    specs.par_iter().map(|spec| build_block(spec, paths, source, analyzer)).collect()
}
