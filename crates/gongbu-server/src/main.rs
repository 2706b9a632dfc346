//! gongbu-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered under
//! `GONGBU__*` environment variables, opens the SQLite store, and serves the
//! lesson pipeline API over HTTP.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for a `[[users]]` entry:
//!
//! ```
//! cargo run -p gongbu-server -- --hash-password
//! ```
//!
//! # Catalog seeding
//!
//! ```
//! cargo run -p gongbu-server -- --seed catalog.json
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use gongbu_api::AppState;
use gongbu_llm::{LlmGateway, OpenAiProvider};
use gongbu_server::{Catalog, FsBlobStore, ServerConfig};
use gongbu_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Gongbu lesson pipeline server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Load grammar patterns and teaching vocab from a JSON catalog and exit.
  #[arg(long, value_name = "CATALOG")]
  seed: Option<PathBuf>,
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

  // Helper mode: hash a password and exit.
  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("GONGBU")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Helper mode: seed the catalog and exit.
  if let Some(path) = cli.seed {
    let raw = tokio::fs::read_to_string(&path)
      .await
      .with_context(|| format!("failed to read catalog {path:?}"))?;
    let catalog: Catalog = serde_json::from_str(&raw).context("malformed catalog")?;
    let tally = gongbu_server::seed(&store, catalog)
      .await
      .context("failed to seed catalog")?;
    tracing::info!(patterns = tally.patterns, vocab = tally.vocab, "catalog seeded");
    return Ok(());
  }

  anyhow::ensure!(!server_cfg.llm.api_key.is_empty(), "llm.api_key is not configured");
  if server_cfg.users.is_empty() {
    tracing::warn!("no users configured; every pipeline request will be rejected");
  }

  let provider = OpenAiProvider::new(server_cfg.llm.provider_config())
    .context("failed to build LLM client")?;
  tracing::info!(model = provider.model(), "LLM provider ready");
  let gateway = LlmGateway::new(provider, server_cfg.llm.gateway_config());

  let blobs = server_cfg
    .blob_root
    .as_deref()
    .map(|root| FsBlobStore::new(expand_tilde(root)));
  if blobs.is_none() {
    tracing::info!("no blob_root configured; snapshots must be supplied by asset_id");
  }

  let state = AppState::new(store, gateway, blobs);
  let app = gongbu_server::app(state, server_cfg.users.clone());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
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
