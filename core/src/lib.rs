//! Blocked single-pass (SPIMI) inverted index construction with boolean and
//! TF-IDF ranked retrieval.
//!
//! Build: [`block`] indexes fixed-size document ranges into sorted block files,
//! [`merge`] streams them through a k-way merge into one merged index.
//! Query: [`codec`] loads doc-id-only read models for [`query`], and
//! [`store::PostingStore`] keeps term frequencies for [`ranking`].
//! [`store::IndexStore`] ties the read models together behind load-once caches.

pub mod block;
pub mod build;
pub mod codec;
pub mod config;
pub mod doclen;
pub mod error;
pub mod merge;
pub mod persist;
pub mod posting;
pub mod query;
pub mod ranking;
pub mod source;
pub mod store;
pub mod tokenizer;

pub use build::{BuildReport, IndexBuilder};
pub use codec::{CompressedIndex, PostingLookup, Representation, UncompressedIndex};
pub use config::IndexConfig;
pub use doclen::DocumentLengths;
pub use error::{IndexError, Result};
pub use posting::{DocId, Posting, PostingList, TermRecord};
pub use ranking::ScoredDoc;
pub use source::{DirectorySource, DocumentSource, MemorySource};
pub use store::{IndexStore, PostingStore};
pub use tokenizer::{Analyzer, EnglishAnalyzer};
