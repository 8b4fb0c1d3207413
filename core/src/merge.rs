//! K-way merge of block files into the merged index.
//!
//! One cursor per block file holds that file's next unread record. Each round
//! takes the smallest buffered term, concatenates the posting lists of every
//! cursor positioned on it in cursor order, emits the result and advances those
//! cursors. Blocks cover disjoint, increasing id ranges, so concatenating in
//! block-id order yields an already sorted list.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::{IndexError, Result};
use crate::persist::{tmp_path, IndexPaths};
use crate::posting::{PostingList, RecordReader, TermRecord};

struct Cursor {
    reader: RecordReader,
    head: Option<TermRecord>,
}

impl Cursor {
    fn advance(&mut self) -> Result<()> {
        self.head = self.reader.next_record()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub terms: usize,
    pub postings: usize,
    pub flushes: usize,
}

pub struct BlockMerger {
    cursors: Vec<Cursor>,
    flush_bytes: usize,
}

impl BlockMerger {
    /// Open every block file up front; a missing block aborts before any output exists.
    pub fn open(paths: &IndexPaths, block_ids: &[u32], flush_bytes: usize) -> Result<Self> {
        let files: Vec<PathBuf> = block_ids.iter().map(|&id| paths.block(id)).collect();
        Self::open_files(&files, flush_bytes)
    }

    pub fn open_files(files: &[PathBuf], flush_bytes: usize) -> Result<Self> {
        let mut cursors = files
            .iter()
            .map(|path| Ok(Cursor { reader: RecordReader::open(path)?, head: None }))
            .collect::<Result<Vec<_>>>()?;
        for cursor in cursors.iter_mut() {
            cursor.advance()?;
        }
        Ok(Self { cursors, flush_bytes })
    }

    /// Merge into `output`. Records stream into a sibling temp file that
    /// replaces `output` only once every block has merged cleanly, so a failed
    /// merge leaves any previous index untouched.
    pub fn merge_into(mut self, output: &Path) -> Result<MergeStats> {
        let start = Instant::now();
        let tmp = tmp_path(output);
        let stats = match self.write_merged(&tmp) {
            Ok(stats) => stats,
            Err(e) => {
                if let Err(rm) = std::fs::remove_file(&tmp) {
                    tracing::warn!(path = %tmp.display(), error = %rm, "could not remove partial merge output");
                }
                return Err(e);
            }
        };
        std::fs::rename(&tmp, output).map_err(|e| IndexError::io(output, e))?;

        tracing::info!(
            blocks = self.cursors.len(),
            terms = stats.terms,
            postings = stats.postings,
            flushes = stats.flushes,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "merge complete"
        );
        Ok(stats)
    }

    fn write_merged(&mut self, path: &Path) -> Result<MergeStats> {
        let mut out = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| IndexError::io(path, e))?;

        let mut stats = MergeStats::default();
        let mut buffer = String::new();
        while let Some(record) = self.next_merged()? {
            tracing::debug!(term = %record.term, postings = record.postings.len(), "merge");
            stats.terms += 1;
            stats.postings += record.postings.len();
            buffer.push_str(&record.to_line()?);
            buffer.push('\n');
            if buffer.len() > self.flush_bytes {
                flush(&mut out, &mut buffer, path)?;
                stats.flushes += 1;
            }
        }
        if !buffer.is_empty() {
            flush(&mut out, &mut buffer, path)?;
            stats.flushes += 1;
        }
        out.sync_all().map_err(|e| IndexError::io(path, e))?;
        Ok(stats)
    }

    /// The next globally merged record, or `None` once every cursor is exhausted.
    pub fn next_merged(&mut self) -> Result<Option<TermRecord>> {
        let min_term = match self.cursors.iter().filter_map(|c| c.head.as_ref()).map(|r| &r.term).min() {
            Some(term) => term.clone(),
            None => return Ok(None),
        };

        let mut postings = PostingList::new();
        for cursor in self.cursors.iter_mut() {
            let matches = cursor.head.as_ref().is_some_and(|r| r.term == min_term);
            if !matches {
                continue;
            }
            if let Some(record) = cursor.head.take() {
                if let (Some(last), Some(first)) = (postings.last(), record.postings.first()) {
                    if first.doc_id <= last.doc_id {
                        return Err(IndexError::malformed(
                            cursor.reader.path(),
                            cursor.reader.line_no(),
                            format!(
                                "term {min_term}: doc {} does not follow doc {} from an earlier block",
                                first.doc_id, last.doc_id
                            ),
                        ));
                    }
                }
                postings.extend(record.postings);
            }
            cursor.advance()?;
        }
        Ok(Some(TermRecord { term: min_term, postings }))
    }
}

fn flush(out: &mut File, buffer: &mut String, path: &Path) -> Result<()> {
    tracing::debug!(bytes = buffer.len(), path = %path.display(), "flush merged records");
    out.write_all(buffer.as_bytes()).map_err(|e| IndexError::io(path, e))?;
    buffer.clear();
    Ok(())
}

/// Merge blocks `1..=num_blocks` from `paths` into the merged index.
pub fn merge_blocks(paths: &IndexPaths, num_blocks: u32, flush_bytes: usize) -> Result<MergeStats> {
    let ids: Vec<u32> = (1..=num_blocks).collect();
    BlockMerger::open(paths, &ids, flush_bytes)?.merge_into(&paths.merged_index())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posting::Posting;

    fn write_block(paths: &IndexPaths, id: u32, lines: &[&str]) {
        let mut body = lines.join("\n");
        body.push('\n');
        std::fs::write(paths.block(id), body).unwrap();
    }

    fn read_all(path: &Path) -> Vec<TermRecord> {
        RecordReader::open(path).unwrap().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn merges_and_concatenates_in_block_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        write_block(&paths, 1, &[r#"{"apple":[[1,2]]}"#, r#"{"cherry":[[2,1]]}"#]);
        write_block(&paths, 2, &[r#"{"banana":[[3,1]]}"#, r#"{"cherry":[[4,3]]}"#]);
        write_block(&paths, 3, &[r#"{"apple":[[5,1],[6,4]]}"#]);

        let stats = merge_blocks(&paths, 3, 1 << 20).unwrap();
        assert_eq!(stats, MergeStats { terms: 3, postings: 6, flushes: 1 });

        let merged = read_all(&paths.merged_index());
        assert_eq!(
            merged,
            vec![
                TermRecord::new("apple", vec![Posting::new(1, 2), Posting::new(5, 1), Posting::new(6, 4)]),
                TermRecord::new("banana", vec![Posting::new(3, 1)]),
                TermRecord::new("cherry", vec![Posting::new(2, 1), Posting::new(4, 3)]),
            ]
        );
    }

    #[test]
    fn small_threshold_flushes_often_without_changing_output() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        write_block(&paths, 1, &[r#"{"a":[[1,1]]}"#, r#"{"b":[[1,1]]}"#, r#"{"c":[[2,1]]}"#]);
        write_block(&paths, 2, &[r#"{"b":[[3,1]]}"#, r#"{"d":[[4,1]]}"#]);

        let stats = merge_blocks(&paths, 2, 1).unwrap();
        assert_eq!(stats.terms, 4);
        assert_eq!(stats.flushes, 4);
        let text = std::fs::read_to_string(paths.merged_index()).unwrap();
        assert_eq!(text, "{\"a\":[[1,1]]}\n{\"b\":[[1,1],[3,1]]}\n{\"c\":[[2,1]]}\n{\"d\":[[4,1]]}\n");
    }

    #[test]
    fn missing_block_aborts_before_output() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        write_block(&paths, 1, &[r#"{"a":[[1,1]]}"#]);

        let err = merge_blocks(&paths, 2, 100).unwrap_err();
        assert!(matches!(err, IndexError::Io { .. }));
        assert!(!paths.merged_index().exists());
    }

    #[test]
    fn malformed_line_aborts_merge() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        write_block(&paths, 1, &[r#"{"a":[[1,1]]}"#, r#"{"b":"oops"}"#]);

        let err = merge_blocks(&paths, 1, 100).unwrap_err();
        assert!(matches!(err, IndexError::MalformedRecord { line: 2, .. }));
    }

    #[test]
    fn out_of_order_blocks_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        write_block(&paths, 1, &[r#"{"a":[[5,1]]}"#]);
        write_block(&paths, 2, &[r#"{"a":[[2,1]]}"#]);

        let err = merge_blocks(&paths, 2, 100).unwrap_err();
        assert!(matches!(err, IndexError::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn failed_merge_keeps_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        write_block(&paths, 1, &[r#"{"a":[[1,1]]}"#, r#"{"c":[[2,1]]}"#, r#"{"e":[[3,1]]}"#]);
        write_block(&paths, 2, &[r#"{"b":[[4,1]]}"#, r#"{"d":[[5,1]]}"#, r#"{"f":[[6,1]]}"#]);
        merge_blocks(&paths, 2, 1).unwrap();
        let good = std::fs::read(paths.merged_index()).unwrap();

        write_block(
            &paths,
            2,
            &[r#"{"b":[[4,1]]}"#, r#"{"d":[[5,1]]}"#, r#"{"f":[[6,1]]}"#, r#"{"zzz":"oops"}"#],
        );
        let err = merge_blocks(&paths, 2, 1).unwrap_err();
        assert!(matches!(err, IndexError::MalformedRecord { line: 4, .. }));
        assert_eq!(std::fs::read(paths.merged_index()).unwrap(), good);
        assert!(!tmp_path(&paths.merged_index()).exists());
    }
}
