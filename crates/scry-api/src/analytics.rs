//! Handlers for the aggregated-analytics reads.
//!
//! `GET /analytics` goes through the read-through cache for the caller's own
//! view; the scope-widening parameters (`global`, `user_id`, `ip`) are
//! computed fresh from the ledger.

use std::net::SocketAddr;

use axum::{
  Json,
  extract::{ConnectInfo, Query, State},
  http::HeaderMap,
};
use axum_extra::extract::cookie::CookieJar;
use scry_core::{
  ledger::SearchLedger,
  types::{AnalyticsView, TermSummary},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
  ApiError, AppState, client_ip,
  format::{format_query_brief, format_query_record, format_term_summary, format_top_document},
  identity,
};

const SCOPED_READ_CAP: u32 = 20;

// ─── GET /analytics ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct AnalyticsParams {
  #[serde(default)]
  pub global:  bool,
  pub user_id: Option<String>,
  pub ip:      Option<String>,
}

/// `GET /analytics[?global=true][&user_id=…][&ip=…]`
pub async fn handler<L>(
  State(state): State<AppState<L>>,
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
  headers: HeaderMap,
  jar: CookieJar,
  Query(params): Query<AnalyticsParams>,
) -> Result<(CookieJar, Json<Value>), ApiError>
where
  L: SearchLedger,
{
  let (resolved, jar) = identity::ensure_identifier(jar, &state);
  let ip = client_ip(&headers, addr);

  let mut is_user_specific = true;
  let view = if params.global {
    is_user_specific = false;
    global_view(&state).await?
  } else if let Some(user_id) =
    params.user_id.as_deref().filter(|u| *u != resolved)
  {
    // Another identifier's view: computed fresh, never cached under ours.
    compute_view(&state, user_id).await.map_err(ApiError::store)?
  } else if let Some(scope_ip) = params.ip.as_deref() {
    let mut view = cached_view(&state, &resolved).await?;
    view.top_searches = state
      .ledger
      .top_searches_from_ip(scope_ip, 10)
      .await
      .map_err(ApiError::store)?;
    view
  } else {
    cached_view(&state, &resolved).await?
  };

  let body = json!({
    "user_identifier": resolved,
    "ip_address": ip,
    "is_user_specific": is_user_specific,
    "top_searches": view
      .top_searches
      .iter()
      .map(|q| format_term_summary(&TermSummary::Query(q.clone())))
      .collect::<Vec<_>>(),
    "top_documents": view
      .top_documents
      .iter()
      .map(format_top_document)
      .collect::<Vec<_>>(),
    "stats": {
      "total_unique_searches": view.totals.unique_terms,
      "total_documents_found": view.totals.documents_surfaced,
      "total_appearances": view.totals.total_appearances,
    },
  });
  Ok((jar, Json(body)))
}

/// Compute the per-user view straight from the ledger.
async fn compute_view<L: SearchLedger>(
  state: &AppState<L>,
  user_id: &str,
) -> Result<AnalyticsView, L::Error> {
  Ok(AnalyticsView {
    top_searches:  state.ledger.top_searches_for_user(user_id, 10).await?,
    top_documents: state.ledger.top_documents_for_user(user_id, 10).await?,
    totals:        state.ledger.analytics_totals(user_id).await?,
  })
}

/// Read-through: serve the unexpired snapshot if present, else compute from
/// the ledger and store it with the configured TTL.
async fn cached_view<L: SearchLedger>(
  state: &AppState<L>,
  user_id: &str,
) -> Result<AnalyticsView, ApiError> {
  if let Some(view) = state.cache.get(user_id) {
    return Ok(view);
  }
  let view = compute_view(state, user_id).await.map_err(ApiError::store)?;
  state.cache.put(user_id, view.clone());
  Ok(view)
}

async fn global_view<L: SearchLedger>(
  state: &AppState<L>,
) -> Result<AnalyticsView, ApiError> {
  Ok(AnalyticsView {
    top_searches:  state
      .ledger
      .top_searches_global(10)
      .await
      .map_err(ApiError::store)?,
    top_documents: state
      .ledger
      .top_documents_global(10)
      .await
      .map_err(ApiError::store)?,
    totals:        state
      .ledger
      .analytics_totals_global()
      .await
      .map_err(ApiError::store)?,
  })
}

// ─── Scoped ledger reads ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ScopeParams {
  pub user_id: Option<String>,
  pub ip:      Option<String>,
}

/// `GET /my_searches[?user_id=…]`
pub async fn my_searches<L>(
  State(state): State<AppState<L>>,
  jar: CookieJar,
  Query(params): Query<ScopeParams>,
) -> Result<(CookieJar, Json<Value>), ApiError>
where
  L: SearchLedger,
{
  let (resolved, jar) = identity::ensure_identifier(jar, &state);
  let user_id = params.user_id.unwrap_or(resolved);

  let searches = state
    .ledger
    .top_searches_for_user(&user_id, SCOPED_READ_CAP)
    .await
    .map_err(ApiError::store)?;

  Ok((
    jar,
    Json(json!({
      "user_identifier": user_id,
      "searches": searches.iter().map(format_query_brief).collect::<Vec<_>>(),
    })),
  ))
}

/// `GET /ip_searches[?ip=…]`
pub async fn ip_searches<L>(
  State(state): State<AppState<L>>,
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
  headers: HeaderMap,
  Query(params): Query<ScopeParams>,
) -> Result<Json<Value>, ApiError>
where
  L: SearchLedger,
{
  let ip = params.ip.unwrap_or_else(|| client_ip(&headers, addr));

  let searches = state
    .ledger
    .top_searches_from_ip(&ip, SCOPED_READ_CAP)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(json!({
    "ip_address": ip,
    "searches": searches.iter().map(format_query_record).collect::<Vec<_>>(),
  })))
}

/// `GET /my_top_documents[?user_id=…]`
pub async fn my_top_documents<L>(
  State(state): State<AppState<L>>,
  jar: CookieJar,
  Query(params): Query<ScopeParams>,
) -> Result<(CookieJar, Json<Value>), ApiError>
where
  L: SearchLedger,
{
  let (resolved, jar) = identity::ensure_identifier(jar, &state);
  let user_id = params.user_id.unwrap_or(resolved);

  let documents = state
    .ledger
    .top_documents_for_user(&user_id, SCOPED_READ_CAP)
    .await
    .map_err(ApiError::store)?;

  Ok((
    jar,
    Json(json!({
      "user_identifier": user_id,
      "documents": documents.iter().map(format_top_document).collect::<Vec<_>>(),
    })),
  ))
}
