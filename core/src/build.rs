//! The construction pipeline: partition, build blocks in parallel, merge.

use std::time::Instant;

use crate::block::{build_blocks, partition, BlockSummary};
use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::merge::{merge_blocks, MergeStats};
use crate::persist::{now_rfc3339, save_meta, IndexPaths, MetaFile, FORMAT_VERSION};
use crate::source::DocumentSource;
use crate::tokenizer::Analyzer;

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub blocks: Vec<BlockSummary>,
    pub merge: MergeStats,
    pub meta: MetaFile,
}

pub struct IndexBuilder<'a> {
    config: &'a IndexConfig,
    source: &'a dyn DocumentSource,
    analyzer: &'a dyn Analyzer,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(config: &'a IndexConfig, source: &'a dyn DocumentSource, analyzer: &'a dyn Analyzer) -> Self {
        Self { config, source, analyzer }
    }

    pub fn run(&self) -> Result<BuildReport> {
        self.config.validate()?;
        let paths = IndexPaths::new(&self.config.index_dir);

        let start = Instant::now();
        let specs = partition(self.config.num_documents, self.config.block_capacity)?;
        // The merge must not start until every block file is complete.
        let blocks = build_blocks(&specs, &paths, self.source, self.analyzer)?;
        let split_ms = start.elapsed().as_millis() as u64;

        let merge_start = Instant::now();
        let num_blocks = blocks.len() as u32;
        let merge = merge_blocks(&paths, num_blocks, self.config.merge_flush_bytes)?;
        let merge_ms = merge_start.elapsed().as_millis() as u64;

        if !self.config.keep_blocks {
            for spec in &specs {
                let path = paths.block(spec.id);
                std::fs::remove_file(&path).map_err(|e| IndexError::io(&path, e))?;
            }
        }

        let meta = MetaFile {
            num_documents: self.config.num_documents,
            block_capacity: self.config.block_capacity,
            num_blocks,
            num_terms: merge.terms,
            created_at: now_rfc3339(),
            version: FORMAT_VERSION,
        };
        save_meta(&paths, &meta)?;

        tracing::info!(
            block_capacity = self.config.block_capacity,
            num_blocks,
            split_ms,
            merge_flush_bytes = self.config.merge_flush_bytes,
            merge_ms,
            num_terms = merge.terms,
            "index build complete"
        );
        Ok(BuildReport { blocks, merge, meta })
    }
}
