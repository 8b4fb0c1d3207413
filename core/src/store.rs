//! Load-once caches over the index directory and the query entry points.
//!
//! [`IndexStore`] owns every read model. Each is loaded on first use behind a
//! [`LoadOnce`] and is immutable afterwards, so queries never lock once warm.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use parking_lot::Mutex;

use crate::codec::{CompressedIndex, PostingLookup, Representation, UncompressedIndex};
use crate::config::IndexConfig;
use crate::doclen::DocumentLengths;
use crate::error::Result;
use crate::persist::{load_meta, IndexPaths};
use crate::posting::{DocId, Posting, RecordReader};
use crate::query::BooleanQuery;
use crate::ranking::{Ranker, ScoredDoc};
use crate::source::{DirectorySource, DocumentSource};
use crate::tokenizer::{Analyzer, EnglishAnalyzer};

/// A value built at most once.
///
/// Concurrent first callers serialize on the init guard and only one of them
/// runs the loader. A failed load stores nothing, so a later call retries.
pub struct LoadOnce<T> {
    cell: OnceLock<T>,
    init: Mutex<()>,
    loads: AtomicUsize,
}

impl<T> Default for LoadOnce<T> {
    fn default() -> Self {
        Self { cell: OnceLock::new(), init: Mutex::new(()), loads: AtomicUsize::new(0) }
    }
}

impl<T> LoadOnce<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn get_or_try_load<F>(&self, load: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let _guard = self.init.lock();
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let value = load()?;
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(self.cell.get_or_init(|| value))
    }

    /// Number of successful loads; never more than one.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

/// Full postings with term frequencies, for ranking.
#[derive(Debug, Default, Clone)]
pub struct PostingStore {
    postings: HashMap<String, Vec<Posting>>,
}

impl PostingStore {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut postings = HashMap::new();
        for record in RecordReader::open(path)? {
            let record = record?;
            postings.insert(record.term, record.postings);
        }
        Ok(Self { postings })
    }

    /// Sorted postings of `term`; empty when the term is not indexed.
    pub fn postings(&self, term: &str) -> &[Posting] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings(term).len()
    }

    pub fn num_terms(&self) -> usize {
        self.postings.len()
    }
}

impl FromIterator<(String, Vec<Posting>)> for PostingStore {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Posting>)>>(iter: I) -> Self {
        Self { postings: iter.into_iter().collect() }
    }
}

fn timed<T>(what: &'static str, load: impl FnOnce() -> Result<T>) -> Result<T> {
    let start = Instant::now();
    let value = load()?;
    tracing::info!(what, elapsed_ms = start.elapsed().as_millis() as u64, "loaded");
    Ok(value)
}

/// Corpus size for idf and the length table. The build's `meta.json` records
/// how many documents were actually indexed and takes precedence over the
/// configured value; indexes without one fall back to the configuration.
fn indexed_num_documents(paths: &IndexPaths, configured: u32) -> u32 {
    if !paths.meta().is_file() {
        return configured;
    }
    match load_meta(paths) {
        Ok(meta) => {
            if meta.num_documents != configured {
                tracing::info!(
                    configured,
                    indexed = meta.num_documents,
                    "using document count recorded in meta.json"
                );
            }
            meta.num_documents
        }
        Err(e) => {
            tracing::warn!(error = %e, configured, "unreadable meta.json; using configured document count");
            configured
        }
    }
}

/// Read models and collaborators for one index directory.
pub struct IndexStore {
    paths: IndexPaths,
    num_documents: u32,
    top_k: usize,
    source: Arc<dyn DocumentSource>,
    analyzer: Arc<dyn Analyzer>,
    uncompressed: LoadOnce<UncompressedIndex>,
    compressed: LoadOnce<CompressedIndex>,
    postings: LoadOnce<PostingStore>,
    doc_lengths: LoadOnce<DocumentLengths>,
}

impl IndexStore {
    pub fn new(config: &IndexConfig, source: Arc<dyn DocumentSource>, analyzer: Arc<dyn Analyzer>) -> Self {
        let paths = IndexPaths::new(&config.index_dir);
        let num_documents = indexed_num_documents(&paths, config.num_documents);
        Self {
            paths,
            num_documents,
            top_k: config.top_k,
            source,
            analyzer,
            uncompressed: LoadOnce::new(),
            compressed: LoadOnce::new(),
            postings: LoadOnce::new(),
            doc_lengths: LoadOnce::new(),
        }
    }

    /// Documents from `config.data_dir`, English analysis.
    pub fn open(config: &IndexConfig) -> Self {
        Self::new(config, Arc::new(DirectorySource::new(&config.data_dir)), Arc::new(EnglishAnalyzer))
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    pub fn num_documents(&self) -> u32 {
        self.num_documents
    }

    pub fn analyzer(&self) -> &dyn Analyzer {
        self.analyzer.as_ref()
    }

    pub fn uncompressed(&self) -> Result<&UncompressedIndex> {
        self.uncompressed.get_or_try_load(|| {
            timed("uncompressed index", || UncompressedIndex::load(self.paths.merged_index()))
        })
    }

    pub fn compressed(&self) -> Result<&CompressedIndex> {
        self.compressed.get_or_try_load(|| {
            timed("compressed index", || {
                let index = CompressedIndex::load(self.paths.merged_index())?;
                tracing::debug!(
                    terms = index.num_terms(),
                    dictionary_bytes = index.dictionary_len(),
                    postings_bytes = index.postings_len(),
                    buckets = index.num_buckets(),
                    "compressed index layout"
                );
                Ok(index)
            })
        })
    }

    pub fn lookup_model(&self, representation: Representation) -> Result<&dyn PostingLookup> {
        let model: &dyn PostingLookup = match representation {
            Representation::Uncompressed => self.uncompressed()?,
            Representation::Compressed => self.compressed()?,
        };
        Ok(model)
    }

    pub fn postings(&self) -> Result<&PostingStore> {
        self.postings.get_or_try_load(|| timed("posting store", || PostingStore::load(self.paths.merged_index())))
    }

    pub fn doc_lengths(&self) -> Result<&DocumentLengths> {
        self.doc_lengths.get_or_try_load(|| {
            DocumentLengths::load_or_compute(
                &self.paths.doc_lengths(),
                self.source.as_ref(),
                self.analyzer.as_ref(),
                self.num_documents,
            )
        })
    }

    /// Evaluate a boolean query. The query is validated before any index is loaded.
    pub fn boolean_search(&self, query: &str, representation: Representation) -> Result<Vec<DocId>> {
        let start = Instant::now();
        let parsed = BooleanQuery::parse(query, self.analyzer())?;
        let result = parsed.evaluate(self.lookup_model(representation)?);
        tracing::info!(query, ?representation, hits = result.len(), elapsed_us = start.elapsed().as_micros() as u64, "search");
        Ok(result)
    }

    /// Top-k documents for a free-text query.
    pub fn rank(&self, query: &str) -> Result<Vec<ScoredDoc>> {
        let start = Instant::now();
        let ranker = Ranker::new(self.postings()?, self.doc_lengths()?, self.num_documents).with_top_k(self.top_k);
        let result = ranker.rank(query, self.analyzer())?;
        tracing::info!(query, hits = result.len(), elapsed_us = start.elapsed().as_micros() as u64, "rank");
        Ok(result)
    }

    /// Load every cache now rather than on first query.
    pub fn warm(&self) -> Result<()> {
        self.uncompressed()?;
        self.compressed()?;
        self.postings()?;
        self.doc_lengths()?;
        Ok(())
    }

    pub fn is_warm(&self) -> bool {
        self.uncompressed.get().is_some()
            && self.compressed.get().is_some()
            && self.postings.get().is_some()
            && self.doc_lengths.get().is_some()
    }
}
