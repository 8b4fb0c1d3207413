use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_documents: u32,
    pub block_capacity: u32,
    pub num_blocks: u32,
    pub num_terms: usize,
    pub created_at: String,
    pub version: u32,
}

/// On-disk layout of an index directory.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn block(&self, block_id: u32) -> PathBuf { self.root.join(format!("blk{block_id}.txt")) }
    pub fn merged_index(&self) -> PathBuf { self.root.join("index.txt") }
    pub fn doc_lengths(&self) -> PathBuf { self.root.join("doclen.txt") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }

    pub fn ensure_root(&self) -> Result<()> {
        create_dir_all(&self.root).map_err(|e| IndexError::io(&self.root, e))
    }
}

/// Write `bytes` to a sibling temp file, then rename it over `path`, so readers
/// never observe a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    let mut f = File::create(&tmp).map_err(|e| IndexError::io(&tmp, e))?;
    f.write_all(bytes).map_err(|e| IndexError::io(&tmp, e))?;
    f.sync_all().map_err(|e| IndexError::io(&tmp, e))?;
    drop(f);
    std::fs::rename(&tmp, path).map_err(|e| IndexError::io(path, e))
}

/// Sibling of `path` that in-progress writes go to before the final rename.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    paths.ensure_root()?;
    let json = serde_json::to_string_pretty(meta)?;
    write_atomic(&paths.meta(), json.as_bytes())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let path = paths.meta();
    let mut f = File::open(&path).map_err(|e| IndexError::io(&path, e))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf).map_err(|e| IndexError::io(&path, e))?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let paths = IndexPaths::new("/idx");
        assert_eq!(paths.block(3), PathBuf::from("/idx/blk3.txt"));
        assert_eq!(paths.merged_index(), PathBuf::from("/idx/index.txt"));
        assert_eq!(paths.doc_lengths(), PathBuf::from("/idx/doclen.txt"));
    }

    #[test]
    fn meta_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("nested"));
        let meta = MetaFile {
            num_documents: 10,
            block_capacity: 4,
            num_blocks: 3,
            num_terms: 17,
            created_at: "2024-01-01T00:00:00Z".into(),
            version: FORMAT_VERSION,
        };
        save_meta(&paths, &meta).unwrap();
        assert_eq!(load_meta(&paths).unwrap(), meta);
        assert!(!paths.root.join("meta.json.tmp").exists());
    }
}
