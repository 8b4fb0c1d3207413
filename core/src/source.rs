//! Where raw document text comes from.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::DocId;

pub trait DocumentSource: Send + Sync {
    /// Raw text of `doc_id`; `DocumentNotFound` when the id has no backing document.
    fn read_document(&self, doc_id: DocId) -> Result<String>;
}

/// A directory with one `{doc_id}.txt` file per document.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn path_for(&self, doc_id: DocId) -> PathBuf {
        self.root.join(format!("{doc_id}.txt"))
    }
}

impl DocumentSource for DirectorySource {
    fn read_document(&self, doc_id: DocId) -> Result<String> {
        let path = self.path_for(doc_id);
        match std::fs::read(&path) {
            // Some corpus files are not valid UTF-8; keep what can be decoded.
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(IndexError::DocumentNotFound(doc_id)),
            Err(e) => Err(IndexError::io(path, e)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    docs: HashMap<DocId, String>,
}

impl MemorySource {
    pub fn new() -> Self { Self::default() }

    /// Documents numbered `1..` in iteration order.
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let docs = texts.into_iter().zip(1..).map(|(text, id)| (id, text.into())).collect();
        Self { docs }
    }

    pub fn insert(&mut self, doc_id: DocId, text: impl Into<String>) {
        self.docs.insert(doc_id, text.into());
    }

    pub fn len(&self) -> usize { self.docs.len() }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }
}

impl DocumentSource for MemorySource {
    fn read_document(&self, doc_id: DocId) -> Result<String> {
        self.docs.get(&doc_id).cloned().ok_or(IndexError::DocumentNotFound(doc_id))
    }
}
