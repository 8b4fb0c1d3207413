use std::collections::HashMap;
use std::path::Path;

use super::PostingLookup;
use crate::error::Result;
use crate::posting::{DocId, RecordReader};

/// Term -> doc ids, one map entry per term.
#[derive(Debug, Default, Clone)]
pub struct UncompressedIndex {
    postings: HashMap<String, Vec<DocId>>,
}

impl UncompressedIndex {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut postings = HashMap::new();
        for record in RecordReader::open(path)? {
            let record = record?;
            let ids = record.doc_ids().collect();
            postings.insert(record.term, ids);
        }
        Ok(Self { postings })
    }
}

impl PostingLookup for UncompressedIndex {
    fn lookup(&self, term: &str) -> Vec<DocId> {
        self.postings.get(term).cloned().unwrap_or_default()
    }

    fn num_terms(&self) -> usize {
        self.postings.len()
    }
}
