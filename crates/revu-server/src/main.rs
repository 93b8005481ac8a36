//! revu server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) and `REVU_*`
//! environment variables, opens an in-process SQLite store, and serves the
//! JSON API over HTTP.
//!
//! # Bootstrapping an admin
//!
//! Accounts are created through signup with the `user` role. To promote one:
//!
//! ```
//! cargo run -p revu-server --bin server -- --grant-role alice=admin
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use revu_core::{
  account::{AccountPatch, Role},
  store::AccountStore,
};
use revu_server::ServerConfig;
use revu_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "revu review API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Set the role of an existing account and exit.
  #[arg(long, value_name = "USERNAME=ROLE", value_parser = parse_grant)]
  grant_role: Option<(String, Role)>,
}

fn parse_grant(s: &str) -> Result<(String, Role), String> {
  let (username, role) = s
    .split_once('=')
    .ok_or_else(|| format!("expected USERNAME=ROLE, got {s:?}"))?;
  let role = role
    .parse()
    .map_err(|_| format!("unknown role {role:?}"))?;
  Ok((username.to_owned(), role))
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
    .add_source(config::Environment::with_prefix("REVU"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Helper mode: change a role and exit.
  if let Some((username, role)) = cli.grant_role {
    let account = store
      .get_account(&username)
      .await?
      .with_context(|| format!("no account named {username:?}"))?;
    let patch = AccountPatch { role: Some(role), ..Default::default() };
    store
      .update_account(account.account_id, patch)
      .await?
      .with_context(|| format!("account {username:?} vanished"))?;
    println!("{username} is now {role}");
    return Ok(());
  }

  let notifier = server_cfg
    .notifier()
    .context("failed to set up mail transport")?;
  let state =
    revu_server::build_state(Arc::new(store), notifier, &server_cfg);

  let app = revu_server::router(state);
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
