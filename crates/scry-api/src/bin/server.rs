//! scry server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite ledger, and serves the JSON API over HTTP. On first
//! boot an optional seed file populates the document store.

use std::{
  net::SocketAddr,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use scry_api::{
  AppState, ServerConfig, cache::AnalyticsCache, identity::SessionMirror,
};
use scry_core::{ledger::SearchLedger, types::NewDocument};
use scry_store_sqlite::SqliteLedger;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "scry search-analytics server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("SCRY"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite ledger.
  let ledger = SqliteLedger::open(&store_path)
    .await
    .with_context(|| format!("failed to open ledger at {store_path:?}"))?;

  if let Some(seed_path) = &server_cfg.seed_path {
    seed_documents(&ledger, seed_path).await?;
  }

  // Build application state.
  let state = AppState {
    ledger:   Arc::new(ledger),
    cache:    Arc::new(AnalyticsCache::new(Duration::from_secs(
      server_cfg.cache_ttl_secs,
    ))),
    sessions: Arc::new(SessionMirror::new()),
    config:   Arc::new(server_cfg.clone()),
  };

  let app = scry_api::router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(
    listener,
    app.into_make_service_with_connect_info::<SocketAddr>(),
  )
  .await
  .context("server error")?;

  Ok(())
}

/// Populate the document store from a JSON seed file, skipped when the table
/// already has rows.
async fn seed_documents(ledger: &SqliteLedger, path: &Path) -> anyhow::Result<()> {
  if !ledger.list_documents().await?.is_empty() {
    return Ok(());
  }

  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read seed file {path:?}"))?;
  let documents: Vec<NewDocument> =
    serde_json::from_str(&raw).context("failed to parse seed file")?;

  let count = documents.len();
  for document in documents {
    ledger.add_document(document).await?;
  }
  tracing::info!("seeded {count} documents from {path:?}");
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
