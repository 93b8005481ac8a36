//! HTTP server assembly for revu.
//!
//! Wires a store, the JWT codec and a mail transport into an
//! [`IdentityManager`] and mounts the JSON API under `/api/v1`.

pub mod error;
pub mod mail;
pub mod token;

pub use error::Error;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::Router;
use revu_api::{AppState, Backend};
use revu_core::identity::{IdentityManager, Notifier};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use mail::{FileNotifier, LogNotifier};
use token::JwtCodec;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `REVU_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:           String,
  #[serde(default = "default_port")]
  pub port:           u16,
  #[serde(default = "default_store_path")]
  pub store_path:     PathBuf,
  /// HS256 signing secret for access tokens.
  pub token_secret:   String,
  #[serde(default = "default_token_ttl_secs")]
  pub token_ttl_secs: u64,
  #[serde(default = "default_mail_from")]
  pub mail_from:      String,
  /// When set, confirmation mails are written here instead of logged.
  #[serde(default)]
  pub mail_dir:       Option<PathBuf>,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8000 }
fn default_store_path() -> PathBuf { PathBuf::from("revu.db") }
fn default_token_ttl_secs() -> u64 { 86_400 }
fn default_mail_from() -> String { "noreply@revu.local".into() }

impl ServerConfig {
  pub fn token_ttl(&self) -> Duration { Duration::from_secs(self.token_ttl_secs) }

  /// The mail transport this configuration asks for.
  pub fn notifier(&self) -> error::Result<Arc<dyn Notifier>> {
    let notifier: Arc<dyn Notifier> = match &self.mail_dir {
      Some(dir) => Arc::new(FileNotifier::new(self.mail_from.clone(), dir)?),
      None => Arc::new(LogNotifier::new(self.mail_from.clone())),
    };
    Ok(notifier)
  }
}

// ─── Application state ───────────────────────────────────────────────────────

/// Assemble handler state from a store, a notifier and the configuration.
pub fn build_state<S: Backend>(
  store: Arc<S>,
  notifier: Arc<dyn Notifier>,
  config: &ServerConfig,
) -> AppState<S> {
  let tokens = Arc::new(JwtCodec::new(config.token_secret.as_bytes()));
  let identity = IdentityManager::new(
    store.clone(),
    tokens,
    notifier,
    config.token_ttl(),
  );
  AppState { store, identity: Arc::new(identity) }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S: Backend>(state: AppState<S>) -> Router {
  Router::new()
    .nest("/api/v1", revu_api::api_router(state))
    .layer(TraceLayer::new_for_http())
}
