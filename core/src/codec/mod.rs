//! Doc-id-only read models over the merged index.
//!
//! Both models drop term frequencies; boolean retrieval never needs them.
//! Ranking reads the merged index separately through [`crate::store::PostingStore`].

mod compressed;
mod uncompressed;

pub use compressed::{CompressedIndex, SEPARATOR};
pub use uncompressed::UncompressedIndex;

use crate::posting::DocId;

pub trait PostingLookup: Send + Sync {
    /// Sorted doc ids containing `term`; empty when the term is not indexed.
    fn lookup(&self, term: &str) -> Vec<DocId>;

    fn num_terms(&self) -> usize;
}

/// Which read model a boolean query runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Representation {
    #[default]
    Uncompressed,
    Compressed,
}
