//! Posting lists and the line-oriented record format shared by block files and
//! the merged index.
//!
//! Each line is a JSON object with exactly one key, the term, mapped to its
//! posting list as `[doc_id, tf]` pairs:
//!
//! ```text
//! {"appl":[[1,2],[7,1]]}
//! ```
//!
//! Lines are parsed independently so files can be streamed.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{IndexError, Result};

pub type DocId = u32;

/// One `(doc_id, tf)` entry. Serialized as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(DocId, u32)", into = "(DocId, u32)")]
pub struct Posting {
    pub doc_id: DocId,
    pub tf: u32,
}

impl Posting {
    pub fn new(doc_id: DocId, tf: u32) -> Self {
        Self { doc_id, tf }
    }
}

impl From<(DocId, u32)> for Posting {
    fn from((doc_id, tf): (DocId, u32)) -> Self {
        Self { doc_id, tf }
    }
}

impl From<Posting> for (DocId, u32) {
    fn from(p: Posting) -> Self {
        (p.doc_id, p.tf)
    }
}

/// Sorted by `doc_id`, strictly increasing.
pub type PostingList = Vec<Posting>;

/// Checks the posting-list invariant: ids >= 1, strictly increasing, tf >= 1.
pub fn check_postings(postings: &[Posting]) -> std::result::Result<(), String> {
    if postings.is_empty() {
        return Err("empty posting list".into());
    }
    let mut prev: DocId = 0;
    for p in postings {
        if p.doc_id == 0 {
            return Err("doc id must be >= 1".into());
        }
        if p.tf == 0 {
            return Err(format!("tf must be >= 1 (doc {})", p.doc_id));
        }
        if p.doc_id <= prev {
            return Err(format!("doc ids not strictly increasing ({} after {})", p.doc_id, prev));
        }
        prev = p.doc_id;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermRecord {
    pub term: String,
    pub postings: PostingList,
}

impl Serialize for TermRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.term, &self.postings)?;
        map.end()
    }
}

impl TermRecord {
    pub fn new(term: impl Into<String>, postings: PostingList) -> Self {
        Self { term: term.into(), postings }
    }

    /// Strict parse of one record line. `path` and `line_no` only feed the error.
    pub fn parse_line(line: &str, path: &Path, line_no: usize) -> Result<Self> {
        let SingleEntry(term, postings) =
            serde_json::from_str(line).map_err(|e| IndexError::malformed(path, line_no, e.to_string()))?;
        if term.is_empty() {
            return Err(IndexError::malformed(path, line_no, "empty term"));
        }
        check_postings(&postings).map_err(|reason| IndexError::malformed(path, line_no, reason))?;
        Ok(Self { term, postings })
    }

    /// The record as a single line, without the trailing newline.
    pub fn to_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.postings.iter().map(|p| p.doc_id)
    }
}

/// A JSON object holding exactly one `term: postings` entry. Duplicate keys
/// count as a second entry rather than overwriting the first.
struct SingleEntry(String, PostingList);

impl<'de> Deserialize<'de> for SingleEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SingleEntryVisitor;

        impl<'de> Visitor<'de> for SingleEntryVisitor {
            type Value = SingleEntry;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object with exactly one term")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<SingleEntry, A::Error> {
                let term: String = map
                    .next_key()?
                    .ok_or_else(|| de::Error::custom("expected exactly one term per record, found none"))?;
                let postings: PostingList = map.next_value()?;
                if let Some(extra) = map.next_key::<String>()? {
                    return Err(de::Error::custom(format!(
                        "expected exactly one term per record, found a second term {extra:?}"
                    )));
                }
                Ok(SingleEntry(term, postings))
            }
        }

        deserializer.deserialize_map(SingleEntryVisitor)
    }
}

/// Streams records from a block file or merged index, one line at a time.
pub struct RecordReader {
    reader: BufReader<File>,
    path: PathBuf,
    line_no: usize,
    buf: String,
}

impl RecordReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| IndexError::io(&path, e))?;
        Ok(Self { reader: BufReader::new(file), path, line_no: 0, buf: String::new() })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Line number of the last line read, starting at 1.
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    /// Next record, `None` at end of file. Blank lines are skipped.
    pub fn next_record(&mut self) -> Result<Option<TermRecord>> {
        loop {
            self.buf.clear();
            let n = self.reader.read_line(&mut self.buf).map_err(|e| IndexError::io(&self.path, e))?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = self.buf.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                continue;
            }
            return TermRecord::parse_line(line, &self.path, self.line_no).map(Some);
        }
    }
}

impl Iterator for RecordReader {
    type Item = Result<TermRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
