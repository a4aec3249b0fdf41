//! JSON HTTP surface for scry.
//!
//! Exposes an axum [`Router`] backed by any [`scry_core::ledger::SearchLedger`].
//! TLS and transport concerns are the caller's responsibility.

pub mod analytics;
pub mod cache;
pub mod documents;
pub mod error;
pub mod format;
pub mod identity;
pub mod pending;
pub mod search;

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{
  Router,
  http::HeaderMap,
  routing::{get, post},
};
use scry_core::ledger::SearchLedger;
use serde::Deserialize;

use cache::AnalyticsCache;
use identity::SessionMirror;

pub use error::ApiError;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,

  /// Name of the durable identifier cookie.
  #[serde(default = "default_cookie_name")]
  pub cookie_name: String,

  /// Analytics cache time-to-live, seconds.
  #[serde(default = "default_cache_ttl_secs")]
  pub cache_ttl_secs: u64,

  /// JSON file of documents to seed on first boot.
  #[serde(default)]
  pub seed_path: Option<PathBuf>,
}

fn default_cookie_name() -> String { "user_identifier".to_string() }

fn default_cache_ttl_secs() -> u64 { 300 }

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<L: SearchLedger> {
  pub ledger:   Arc<L>,
  pub cache:    Arc<AnalyticsCache>,
  pub sessions: Arc<SessionMirror>,
  pub config:   Arc<ServerConfig>,
}

// Manual impl: `#[derive(Clone)]` would demand `L: Clone`.
impl<L: SearchLedger> Clone for AppState<L> {
  fn clone(&self) -> Self {
    Self {
      ledger:   Arc::clone(&self.ledger),
      cache:    Arc::clone(&self.cache),
      sessions: Arc::clone(&self.sessions),
      config:   Arc::clone(&self.config),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised router for `state`.
pub fn router<L>(state: AppState<L>) -> Router
where
  L: SearchLedger + 'static,
{
  Router::new()
    .route("/documents", get(documents::list::<L>))
    .route("/search", get(search::handler::<L>))
    .route("/analytics", get(analytics::handler::<L>))
    .route("/my_searches", get(analytics::my_searches::<L>))
    .route("/ip_searches", get(analytics::ip_searches::<L>))
    .route("/my_top_documents", get(analytics::my_top_documents::<L>))
    .route("/set_identifier", post(identity::set_identifier::<L>))
    .route("/process_pending_searches", post(pending::handler::<L>))
    .with_state(state)
}

// ─── Request IP ──────────────────────────────────────────────────────────────

/// Resolve the client IP: first `X-Forwarded-For` hop if present, else the
/// peer address.
pub(crate) fn client_ip(headers: &HeaderMap, addr: SocketAddr) -> String {
  headers
    .get("x-forwarded-for")
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.split(',').next())
    .map(|s| s.trim().to_owned())
    .filter(|s| !s.is_empty())
    .unwrap_or_else(|| addr.ip().to_string())
}

#[cfg(test)]
mod tests;
