//! Front-coded term dictionary with leading-byte buckets.
//!
//! All terms live in one byte arena, joined by [`SEPARATOR`], in merged-index
//! (sorted) order. A term is addressed by the offset of its first byte. The
//! bucket table maps a leading byte to the offset of the first term starting
//! with it, so a lookup only scans the terms sharing the queried term's leading byte.
//! Posting lists are kept in a second arena as `.`-joined lowercase hex doc
//! ids, reachable from the term's dictionary offset.

use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

use super::PostingLookup;
use crate::error::{IndexError, Result};
use crate::posting::{DocId, RecordReader};

pub const SEPARATOR: u8 = b'.';

/// Highest byte examined when searching for the end of a bucket.
const BUCKET_SCAN_LIMIT: u8 = b'z' + 1;

#[derive(Debug, Clone)]
pub struct CompressedIndex {
    dictionary: Vec<u8>,
    buckets: [Option<usize>; 256],
    postings: Vec<u8>,
    offsets: HashMap<usize, Range<usize>>,
}

impl Default for CompressedIndex {
    fn default() -> Self {
        Self {
            dictionary: Vec::new(),
            buckets: [None; 256],
            postings: Vec::new(),
            offsets: HashMap::new(),
        }
    }
}

impl CompressedIndex {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = RecordReader::open(path)?;
        let mut index = CompressedIndex::default();
        let mut last_term: Option<String> = None;
        while let Some(record) = reader.next_record()? {
            if last_term.as_deref().is_some_and(|prev| prev >= record.term.as_str()) {
                return Err(IndexError::malformed(
                    reader.path(),
                    reader.line_no(),
                    format!("term {} is out of order", record.term),
                ));
            }
            index
                .push(&record.term, record.doc_ids())
                .map_err(|reason| IndexError::malformed(reader.path(), reader.line_no(), reason))?;
            last_term = Some(record.term);
        }
        Ok(index)
    }

    /// Append a term. Terms must be pushed in ascending byte order.
    pub fn push(&mut self, term: &str, doc_ids: impl IntoIterator<Item = DocId>) -> std::result::Result<(), String> {
        let bytes = term.as_bytes();
        let Some(&lead) = bytes.first() else {
            return Err("empty term".into());
        };
        if bytes.contains(&SEPARATOR) {
            return Err(format!("term {term} contains the dictionary separator"));
        }

        if !self.dictionary.is_empty() {
            self.dictionary.push(SEPARATOR);
        }
        let offset = self.dictionary.len();
        if self.buckets[lead as usize].is_none() {
            self.buckets[lead as usize] = Some(offset);
        }
        self.dictionary.extend_from_slice(bytes);

        let start = self.postings.len();
        for (i, doc_id) in doc_ids.into_iter().enumerate() {
            if i > 0 {
                self.postings.push(SEPARATOR);
            }
            self.postings.extend_from_slice(format!("{doc_id:x}").as_bytes());
        }
        self.offsets.insert(offset, start..self.postings.len());
        Ok(())
    }

    /// Size of the term dictionary arena in bytes.
    pub fn dictionary_len(&self) -> usize {
        self.dictionary.len()
    }

    /// Size of the encoded postings arena in bytes.
    pub fn postings_len(&self) -> usize {
        self.postings.len()
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.iter().filter(|b| b.is_some()).count()
    }

    /// Dictionary offset of `term`, if indexed.
    fn find(&self, term: &[u8]) -> Option<usize> {
        let lead = *term.first()?;
        let start = self.buckets[lead as usize]?;
        let end = (lead.saturating_add(1)..=BUCKET_SCAN_LIMIT)
            .find_map(|b| self.buckets[b as usize])
            .unwrap_or(self.dictionary.len());

        let mut offset = start;
        for candidate in self.dictionary.get(start..end)?.split(|&b| b == SEPARATOR) {
            if candidate == term {
                return Some(offset);
            }
            offset += candidate.len() + 1;
        }
        None
    }

    fn decode(&self, offset: usize) -> Vec<DocId> {
        let Some(range) = self.offsets.get(&offset) else {
            return Vec::new();
        };
        self.postings[range.clone()]
            .split(|&b| b == SEPARATOR)
            .filter_map(|hex| std::str::from_utf8(hex).ok())
            .filter_map(|hex| DocId::from_str_radix(hex, 16).ok())
            .collect()
    }
}

impl PostingLookup for CompressedIndex {
    fn lookup(&self, term: &str) -> Vec<DocId> {
        match self.find(term.as_bytes()) {
            Some(offset) => self.decode(offset),
            None => Vec::new(),
        }
    }

    fn num_terms(&self) -> usize {
        self.offsets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(entries: &[(&str, &[DocId])]) -> CompressedIndex {
        let mut index = CompressedIndex::default();
        for (term, ids) in entries {
            index.push(term, ids.iter().copied()).unwrap();
        }
        index
    }

    #[test]
    fn layout_matches_offsets() {
        let idx = index(&[("apple", &[30, 90]), ("banana", &[30]), ("blackberry", &[30, 80, 90, 110])]);
        assert_eq!(idx.dictionary, b"apple.banana.blackberry");
        assert_eq!(idx.buckets[b'a' as usize], Some(0));
        assert_eq!(idx.buckets[b'b' as usize], Some(6));
        assert_eq!(idx.num_buckets(), 2);
        assert_eq!(&idx.postings[idx.offsets[&13].clone()], b"1e.50.5a.6e");
    }

    #[test]
    fn looks_up_every_term() {
        let entries: &[(&str, &[DocId])] = &[
            ("apple", &[30, 90]),
            ("apricot", &[1]),
            ("banana", &[30]),
            ("blackberry", &[30, 80, 90, 110]),
            ("durian", &[80, 110]),
            ("zucchini", &[4096]),
        ];
        let idx = index(entries);
        for (term, ids) in entries {
            assert_eq!(idx.lookup(term), ids.to_vec(), "{term}");
        }
        assert_eq!(idx.num_terms(), entries.len());
    }

    #[test]
    fn absent_terms_are_empty() {
        let idx = index(&[("apple", &[1]), ("banana", &[2]), ("durian", &[3])]);
        for term in ["", "app", "apples", "avocado", "cherry", "c", "zzz", "Apple"] {
            assert!(idx.lookup(term).is_empty(), "{term}");
        }
    }

    #[test]
    fn bucket_past_scan_limit_reaches_dictionary_end() {
        let idx = index(&[("alpha", &[1]), ("~tilde", &[2]), ("~twiddle", &[3])]);
        assert_eq!(idx.lookup("~twiddle"), vec![3]);
        assert_eq!(idx.lookup("alpha"), vec![1]);
    }

    #[test]
    fn rejects_separator_and_empty_terms() {
        let mut idx = CompressedIndex::default();
        assert!(idx.push("a.b", [1]).is_err());
        assert!(idx.push("", [1]).is_err());
    }

    #[test]
    fn load_rejects_unsorted_terms() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.txt");
        std::fs::write(&path, "{\"b\":[[1,1]]}\n{\"a\":[[2,1]]}\n").unwrap();
        assert!(matches!(CompressedIndex::load(&path), Err(IndexError::MalformedRecord { line: 2, .. })));
    }
}
