use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use spindex_core::merge::merge_blocks;
use spindex_core::persist::{load_meta, IndexPaths};
use spindex_core::{
    DirectorySource, DocumentLengths, EnglishAnalyzer, IndexBuilder, IndexConfig, IndexStore, Representation,
};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "spindex")]
#[command(about = "Build and query a blocked inverted index", long_about = None)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// JSON configuration file; flags below override its values
    #[arg(long, env = "SPINDEX_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Corpus directory with one {doc_id}.txt per document
    #[arg(long, env = "SPINDEX_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,
    /// Index directory for blocks, merged index and caches
    #[arg(long, env = "SPINDEX_INDEX_DIR", global = true)]
    index_dir: Option<PathBuf>,
    /// Corpus size; counted from the data directory when omitted
    #[arg(long, global = true)]
    num_documents: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build blocks from the corpus and merge them into one index
    Build {
        /// Documents per block
        #[arg(long)]
        block_capacity: Option<u32>,
        /// Merge output buffered before each flush, in bytes
        #[arg(long)]
        merge_flush_bytes: Option<usize>,
        /// Delete block files after a successful merge
        #[arg(long, default_value_t = false)]
        discard_blocks: bool,
    },
    /// Merge existing block files 1..=N into the merged index
    Merge {
        /// Number of block files; read from meta.json when omitted
        #[arg(long)]
        blocks: Option<u32>,
        #[arg(long)]
        merge_flush_bytes: Option<usize>,
    },
    /// Compute (or load) the document length cache
    Doclen,
    /// Boolean query, e.g. "hillary AND clinton NOT trip"
    Search {
        query: String,
        /// Use the compressed dictionary instead of the plain term map
        #[arg(long, default_value_t = false)]
        compressed: bool,
    },
    /// Ranked free-text query
    Rank {
        query: String,
        #[arg(long)]
        top_k: Option<usize>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let mut config = load_config(&cli.common)?;

    let start = Instant::now();
    match cli.command {
        Commands::Build { block_capacity, merge_flush_bytes, discard_blocks } => {
            if let Some(cap) = block_capacity { config.block_capacity = cap; }
            if let Some(bytes) = merge_flush_bytes { config.merge_flush_bytes = bytes; }
            config.keep_blocks = !discard_blocks;
            config.validate()?;
            let source = DirectorySource::new(&config.data_dir);
            let report = IndexBuilder::new(&config, &source, &EnglishAnalyzer)
                .run()
                .with_context(|| format!("building index in {}", config.index_dir.display()))?;
            println!(
                "blocks: {}\nterms: {}\npostings: {}\nflushes: {}",
                report.blocks.len(), report.merge.terms, report.merge.postings, report.merge.flushes
            );
        }
        Commands::Merge { blocks, merge_flush_bytes } => {
            let paths = IndexPaths::new(&config.index_dir);
            let blocks = match blocks {
                Some(n) => n,
                None => load_meta(&paths).context("no --blocks given and meta.json is unreadable")?.num_blocks,
            };
            let flush = merge_flush_bytes.unwrap_or(config.merge_flush_bytes);
            let stats = merge_blocks(&paths, blocks, flush).context("merging blocks")?;
            println!("terms: {}\npostings: {}\nflushes: {}", stats.terms, stats.postings, stats.flushes);
        }
        Commands::Doclen => {
            let paths = IndexPaths::new(&config.index_dir);
            paths.ensure_root()?;
            let source = DirectorySource::new(&config.data_dir);
            let lengths =
                DocumentLengths::load_or_compute(&paths.doc_lengths(), &source, &EnglishAnalyzer, config.num_documents)?;
            println!("documents: {}", lengths.len());
        }
        Commands::Search { query, compressed } => {
            let store = IndexStore::open(&config);
            let repr = if compressed { Representation::Compressed } else { Representation::Uncompressed };
            let hits = store.boolean_search(&query, repr)?;
            println!("{}", serde_json::to_string(&hits)?);
        }
        Commands::Rank { query, top_k } => {
            if let Some(k) = top_k { config.top_k = k; }
            config.validate()?;
            let store = IndexStore::open(&config);
            let hits = store.rank(&query)?;
            println!("{}", serde_json::to_string_pretty(&hits)?);
        }
    }
    tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "done");
    Ok(())
}

fn load_config(args: &CommonArgs) -> Result<IndexConfig> {
    let mut config = match &args.config {
        Some(path) => IndexConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => IndexConfig::default(),
    };
    if let Some(dir) = &args.data_dir { config.data_dir = dir.clone(); }
    if let Some(dir) = &args.index_dir { config.index_dir = dir.clone(); }
    match args.num_documents {
        Some(n) => config.num_documents = n,
        None if args.config.is_none() && config.data_dir.is_dir() => {
            config.num_documents = count_documents(&config.data_dir)?;
            tracing::info!(num_documents = config.num_documents, "counted corpus documents");
        }
        None => {}
    }
    Ok(config)
}

/// Number of `{doc_id}.txt` files, checking that ids are exactly `1..=count`.
fn count_documents(dir: &Path) -> Result<u32> {
    let mut ids: Vec<u32> = Vec::new();
    for entry in WalkDir::new(dir).max_depth(1).into_iter().filter_map(|e| e.ok()) {
        let p = entry.path();
        if !p.is_file() || p.extension().and_then(|s| s.to_str()) != Some("txt") {
            continue;
        }
        if let Some(id) = p.file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse().ok()) {
            ids.push(id);
        }
    }
    ids.sort_unstable();
    if ids.is_empty() {
        bail!("no {{doc_id}}.txt documents in {}", dir.display());
    }
    if ids.iter().zip(1..).any(|(&id, expected)| id != expected) {
        bail!("document ids in {} are not a dense 1..=N range", dir.display());
    }
    Ok(ids.len() as u32)
}
