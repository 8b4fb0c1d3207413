use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use spindex_core::{IndexConfig, IndexStore};
use spindex_server::build_app_with_store;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// JSON configuration file; flags below override its values
    #[arg(long, env = "SPINDEX_CONFIG")]
    config: Option<PathBuf>,
    /// Index directory path
    #[arg(long, env = "SPINDEX_INDEX_DIR")]
    index_dir: Option<PathBuf>,
    /// Corpus directory, needed to compute document lengths on first ranked query
    #[arg(long, env = "SPINDEX_DATA_DIR")]
    data_dir: Option<PathBuf>,
    /// Corpus size for indexes built without meta.json
    #[arg(long)]
    num_documents: Option<u32>,
    /// Load every index before accepting connections
    #[arg(long, default_value_t = false)]
    warm: bool,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => IndexConfig::from_json_file(path).with_context(|| format!("reading config {}", path.display()))?,
        None => IndexConfig::default(),
    };
    if let Some(dir) = args.index_dir { config.index_dir = dir; }
    if let Some(dir) = args.data_dir { config.data_dir = dir; }
    if let Some(n) = args.num_documents { config.num_documents = n; }
    config.validate()?;

    let store = Arc::new(IndexStore::open(&config));
    if args.warm {
        let warm_store = store.clone();
        tokio::task::spawn_blocking(move || warm_store.warm()).await??;
    }
    let app: Router = build_app_with_store(store);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, index_dir = %config.index_dir.display(), "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
