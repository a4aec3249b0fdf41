//! Handler for `POST /process_pending_searches` — replay of the client's
//! durable pending-search queue.
//!
//! Individual malformed entries are skipped, never fatal to the batch.
//! Replayed finals go through the same recorder as live ones, so a retried
//! batch behaves exactly like repeated real final searches.

use std::net::SocketAddr;

use axum::{
  Json,
  extract::{ConnectInfo, State},
  http::HeaderMap,
};
use axum_extra::extract::cookie::CookieJar;
use scry_core::{ledger::SearchLedger, types::PendingSearch};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{ApiError, AppState, client_ip, identity};

#[derive(Debug, Deserialize)]
pub struct PendingBody {
  pub pending_searches: Option<Vec<Value>>,
}

/// `POST /process_pending_searches {pending_searches: [{query, isFinal, timestamp}, …]}`
pub async fn handler<L>(
  State(state): State<AppState<L>>,
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
  headers: HeaderMap,
  jar: CookieJar,
  Json(body): Json<PendingBody>,
) -> Result<(CookieJar, Json<Value>), ApiError>
where
  L: SearchLedger,
{
  let Some(entries) = body.pending_searches else {
    return Err(ApiError::BadRequest("invalid pending searches data".into()));
  };

  let (user_id, jar) = identity::ensure_identifier(jar, &state);
  let ip = client_ip(&headers, addr);

  let mut processed = 0u32;
  for entry in entries {
    let pending: PendingSearch = match serde_json::from_value(entry) {
      Ok(p) => p,
      Err(e) => {
        tracing::warn!("skipping malformed pending search: {e}");
        continue;
      }
    };

    let term = pending.query.trim().to_owned();
    if term.is_empty() || !pending.is_final {
      continue;
    }

    // Recompute the result count server-side; the client's count at enqueue
    // time may be stale or missing.
    let results_count = match state.ledger.search_documents(&term).await {
      Ok(documents) => documents.len() as u32,
      Err(e) => {
        tracing::warn!(%term, "skipping pending search, document lookup failed: {e}");
        continue;
      }
    };

    match state
      .ledger
      .record_final(&term, &user_id, &ip, results_count)
      .await
    {
      Ok(_) => processed += 1,
      Err(e) => tracing::warn!(%term, "failed to replay pending search: {e}"),
    }
  }

  Ok((jar, Json(json!({ "success": true, "processed": processed }))))
}
