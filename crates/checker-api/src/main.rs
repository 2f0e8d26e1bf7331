//! checker-server binary.
//!
//! Reads `checker.toml` (or the path specified with `--config`) layered under
//! `CHECKER_*` environment variables, opens the SQLite store, and serves the
//! JSON API over HTTP.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use checker_api::{AppState, ServerConfig};
use checker_engine::Engine;
use checker_indexer::IndexerClient;
use checker_llm::{Gateway, OpenAiBackend};
use checker_store_sqlite::SqliteStore;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Grant application checker server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "checker.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("CHECKER"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let indexer = IndexerClient::new(&server_cfg.indexer_url, server_cfg.request_timeout())
    .context("failed to build indexer client")?;
  let backend = OpenAiBackend::new(server_cfg.openai_config())
    .context("failed to build completion backend")?;
  let gateway = Gateway::new(backend, server_cfg.gateway_config());

  tracing::info!(
    indexer = indexer.endpoint(),
    model = %server_cfg.openai_model,
    environment = ?server_cfg.environment,
    "starting checker"
  );

  let engine = Engine::new(
    Arc::new(store),
    Arc::new(indexer),
    Arc::new(gateway),
    server_cfg.engine_config(),
  );
  let app = checker_api::router(AppState::new(engine));
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

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
