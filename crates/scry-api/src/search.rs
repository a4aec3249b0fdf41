//! Handler for `GET /search` — the hot path of the pipeline.
//!
//! Document results are the primary payload: no error in the analytics or
//! appearance path may suppress or delay them. Analytics failures are logged
//! and swallowed.

use std::net::SocketAddr;

use axum::{
  Json,
  extract::{ConnectInfo, Query, State},
  http::{HeaderMap, StatusCode},
  response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use scry_core::{ledger::SearchLedger, types::TermSummary};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{AppState, client_ip, format::format_term_summary, identity};

#[derive(Debug, Deserialize, Default)]
pub struct SearchParams {
  #[serde(default)]
  pub query:    String,
  #[serde(default)]
  pub is_final: bool,
}

/// `GET /search?query=<term>&is_final=<bool>`
pub async fn handler<L>(
  State(state): State<AppState<L>>,
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
  headers: HeaderMap,
  jar: CookieJar,
  Query(params): Query<SearchParams>,
) -> Response
where
  L: SearchLedger,
{
  let (user_id, jar) = identity::ensure_identifier(jar, &state);
  let ip = client_ip(&headers, addr);
  let term = params.query.trim().to_owned();

  let result = if term.is_empty() {
    state.ledger.list_documents().await
  } else {
    state.ledger.search_documents(&term).await
  };

  let documents = match result {
    Ok(documents) => documents,
    Err(e) => {
      tracing::error!("document search failed: {e}");
      let body = json!({
        "documents": [],
        "total": 0,
        "error": "an error occurred during search",
        "analytics": { "user_identifier": user_id, "ip_address": ip },
      });
      return (jar, (StatusCode::INTERNAL_SERVER_ERROR, Json(body)))
        .into_response();
    }
  };

  let mut search_saved = false;
  if params.is_final && !term.is_empty() {
    match state
      .ledger
      .record_final(&term, &user_id, &ip, documents.len() as u32)
      .await
    {
      Ok(_) => {
        search_saved = true;
        if !documents.is_empty() {
          let ids: Vec<i64> = documents.iter().map(|d| d.id).collect();
          if let Err(e) = state.ledger.record_appearances(&ids, &user_id).await {
            tracing::error!("appearance tracking failed: {e}");
          }
        }
      }
      Err(e) => tracing::error!("search analytics failed: {e}"),
    }
  }

  let top_searches = top_terms_for(&state, &user_id).await;
  let trending = trending_terms(&state).await;

  let body = json!({
    "documents": documents,
    "total": documents.len(),
    "analytics": {
      "top_searches": top_searches,
      "trending_searches": trending,
      "user_identifier": user_id,
      "ip_address": ip,
      "is_final_search": params.is_final,
      "search_saved": search_saved,
    },
  });
  (jar, Json(body)).into_response()
}

async fn top_terms_for<L: SearchLedger>(
  state: &AppState<L>,
  user_id: &str,
) -> Vec<Value> {
  match state.ledger.top_terms_for_user(user_id, 5).await {
    Ok(terms) => terms
      .into_iter()
      .map(|t| format_term_summary(&TermSummary::RawTerm(t)))
      .collect(),
    Err(e) => {
      tracing::warn!("top terms unavailable: {e}");
      Vec::new()
    }
  }
}

async fn trending_terms<L: SearchLedger>(state: &AppState<L>) -> Vec<Value> {
  match state.ledger.top_terms_global(5).await {
    Ok(terms) => terms
      .into_iter()
      .map(|t| json!({ "term": t.term, "count": t.total_searches }))
      .collect(),
    Err(e) => {
      tracing::warn!("trending terms unavailable: {e}");
      Vec::new()
    }
  }
}
