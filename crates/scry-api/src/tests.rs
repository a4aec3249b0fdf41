//! Handler tests against an in-memory ledger, driven through
//! `tower::ServiceExt::oneshot`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
  Router,
  body::Body,
  extract::ConnectInfo,
  http::{Method, Request, StatusCode, header},
};
use scry_core::{ledger::SearchLedger, types::NewDocument};
use scry_store_sqlite::SqliteLedger;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{AppState, ServerConfig, cache::AnalyticsCache, identity::SessionMirror};

fn test_config() -> ServerConfig {
  ServerConfig {
    host:           "127.0.0.1".into(),
    port:           0,
    store_path:     ":memory:".into(),
    cookie_name:    "user_identifier".into(),
    cache_ttl_secs: 300,
    seed_path:      None,
  }
}

async fn app() -> (Router, AppState<SqliteLedger>) {
  let ledger = SqliteLedger::open_in_memory().await.expect("ledger");
  let state = AppState {
    ledger:   Arc::new(ledger),
    cache:    Arc::new(AnalyticsCache::new(Duration::from_secs(300))),
    sessions: Arc::new(SessionMirror::new()),
    config:   Arc::new(test_config()),
  };
  (crate::router(state.clone()), state)
}

fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
  let builder = Request::builder().method(method).uri(uri);
  let mut req = match body {
    Some(v) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(v.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };
  // oneshot bypasses the connect-info make-service; inject the peer address.
  req
    .extensions_mut()
    .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
  req
}

fn with_identifier(mut req: Request<Body>, id: &str) -> Request<Body> {
  let cookie = format!("user_identifier={id}");
  req
    .headers_mut()
    .insert(header::COOKIE, cookie.parse().unwrap());
  req
}

async fn body_json(response: axum::response::Response) -> Value {
  let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
    .await
    .unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

fn doc(title: &str, content: &str) -> NewDocument {
  NewDocument {
    title:    title.into(),
    content:  content.into(),
    author:   None,
    category: None,
  }
}

// ─── Documents ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn documents_lists_everything() {
  let (app, state) = app().await;
  state.ledger.add_document(doc("Ruby", "intro")).await.unwrap();
  state.ledger.add_document(doc("Cats", "meow")).await.unwrap();

  let response = app
    .oneshot(request(Method::GET, "/documents", None))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);

  let body = body_json(response).await;
  assert_eq!(body.as_array().unwrap().len(), 2);
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn intermediate_search_is_not_recorded() {
  let (app, state) = app().await;
  state.ledger.add_document(doc("Ruby", "intro")).await.unwrap();

  let response = app
    .oneshot(with_identifier(
      request(Method::GET, "/search?query=ruby&is_final=false", None),
      "u1",
    ))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);

  let body = body_json(response).await;
  assert_eq!(body["total"], 1);
  assert_eq!(body["analytics"]["search_saved"], false);
  assert!(state.ledger.top_searches_for_user("u1", 20).await.unwrap().is_empty());
}

#[tokio::test]
async fn final_search_records_ledger_and_appearances() {
  let (app, state) = app().await;
  let d = state.ledger.add_document(doc("Ruby", "intro")).await.unwrap();

  let response = app
    .oneshot(with_identifier(
      request(Method::GET, "/search?query=ruby&is_final=true", None),
      "u1",
    ))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);

  let body = body_json(response).await;
  assert_eq!(body["analytics"]["search_saved"], true);
  assert_eq!(body["analytics"]["user_identifier"], "u1");

  let rows = state.ledger.top_searches_for_user("u1", 20).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].term, "ruby");
  assert_eq!(rows[0].search_count, 1);
  assert_eq!(rows[0].results_count, 1);

  let tops = state.ledger.top_documents_for_user("u1", 20).await.unwrap();
  assert_eq!(tops.len(), 1);
  assert_eq!(tops[0].document.id, d.id);
}

#[tokio::test]
async fn blank_final_query_returns_all_and_records_nothing() {
  let (app, state) = app().await;
  state.ledger.add_document(doc("Ruby", "intro")).await.unwrap();

  let response = app
    .oneshot(with_identifier(
      request(Method::GET, "/search?query=%20%20&is_final=true", None),
      "u1",
    ))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);

  let body = body_json(response).await;
  assert_eq!(body["total"], 1);
  assert_eq!(body["analytics"]["search_saved"], false);
  assert!(state.ledger.top_searches_for_user("u1", 20).await.unwrap().is_empty());
}

#[tokio::test]
async fn search_mints_identifier_when_absent() {
  let (app, _state) = app().await;

  let response = app
    .oneshot(request(Method::GET, "/search?query=x&is_final=false", None))
    .await
    .unwrap();

  let has_cookie = response
    .headers()
    .get_all(header::SET_COOKIE)
    .iter()
    .any(|v| v.to_str().unwrap().starts_with("user_identifier="));
  assert!(has_cookie);

  let body = body_json(response).await;
  assert!(!body["analytics"]["user_identifier"].as_str().unwrap().is_empty());
}

// ─── Pending replay ──────────────────────────────────────────────────────────

#[tokio::test]
async fn pending_replay_skips_malformed_entries() {
  let (app, state) = app().await;
  state.ledger.add_document(doc("Cats", "meow")).await.unwrap();

  let body = json!({
    "pending_searches": [
      { "query": "cats", "isFinal": true, "timestamp": 1_700_000_000_000u64 },
      { "query": "   ",  "isFinal": true, "timestamp": 1_700_000_000_000u64 },
      { "nonsense": 42 },
      { "query": "dogs", "isFinal": false, "timestamp": 1_700_000_000_000u64 },
    ],
  });

  let response = app
    .oneshot(with_identifier(
      request(Method::POST, "/process_pending_searches", Some(body)),
      "u1",
    ))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);

  let body = body_json(response).await;
  assert_eq!(body["processed"], 1);

  let rows = state.ledger.top_searches_for_user("u1", 20).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].term, "cats");
}

#[tokio::test]
async fn pending_replay_without_payload_is_bad_request() {
  let (app, _state) = app().await;

  let response = app
    .oneshot(request(
      Method::POST,
      "/process_pending_searches",
      Some(json!({})),
    ))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pending_replay_twice_increments_twice() {
  let (app, state) = app().await;
  state.ledger.add_document(doc("Cats", "meow")).await.unwrap();

  let payload = json!({
    "pending_searches": [
      { "query": "cats", "isFinal": true, "timestamp": 1_700_000_000_000u64 },
    ],
  });

  for _ in 0..2 {
    let response = app
      .clone()
      .oneshot(with_identifier(
        request(Method::POST, "/process_pending_searches", Some(payload.clone())),
        "u1",
      ))
      .await
      .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
  }

  // Same semantics as two real final searches: one row, count of two.
  let rows = state.ledger.top_searches_for_user("u1", 20).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].search_count, 2);
}

// ─── Identifier pinning ──────────────────────────────────────────────────────

#[tokio::test]
async fn set_identifier_requires_user_id() {
  let (app, _state) = app().await;

  let response = app
    .oneshot(request(Method::POST, "/set_identifier", Some(json!({}))))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn set_identifier_pins_cookie() {
  let (app, _state) = app().await;

  let response = app
    .oneshot(request(
      Method::POST,
      "/set_identifier",
      Some(json!({ "user_id": "chosen-id" })),
    ))
    .await
    .unwrap();
  assert_eq!(response.status(), StatusCode::OK);

  let has_cookie = response
    .headers()
    .get_all(header::SET_COOKIE)
    .iter()
    .any(|v| v.to_str().unwrap().starts_with("user_identifier=chosen-id"));
  assert!(has_cookie);

  let body = body_json(response).await;
  assert_eq!(body["user_identifier"], "chosen-id");
}

// ─── Analytics ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn analytics_serves_cached_snapshot_within_ttl() {
  let (app, state) = app().await;
  state.ledger.add_document(doc("Cats", "meow")).await.unwrap();
  state.ledger.record_final("cats", "u1", "127.0.0.1", 1).await.unwrap();

  let first = app
    .clone()
    .oneshot(with_identifier(request(Method::GET, "/analytics", None), "u1"))
    .await
    .unwrap();
  let first = body_json(first).await;
  assert_eq!(first["stats"]["total_unique_searches"], 1);

  // The ledger moves, but the cached snapshot wins until the TTL expires.
  state.ledger.record_final("dogs", "u1", "127.0.0.1", 0).await.unwrap();

  let second = app
    .oneshot(with_identifier(request(Method::GET, "/analytics", None), "u1"))
    .await
    .unwrap();
  let second = body_json(second).await;
  assert_eq!(second["stats"]["total_unique_searches"], 1);
}

#[tokio::test]
async fn analytics_global_scope_bypasses_user_cache() {
  let (app, state) = app().await;
  state.ledger.record_final("cats", "u1", "127.0.0.1", 0).await.unwrap();
  state.ledger.record_final("dogs", "u2", "127.0.0.2", 0).await.unwrap();

  let response = app
    .oneshot(with_identifier(
      request(Method::GET, "/analytics?global=true", None),
      "u1",
    ))
    .await
    .unwrap();
  let body = body_json(response).await;
  assert_eq!(body["is_user_specific"], false);
  assert_eq!(body["stats"]["total_unique_searches"], 2);
}

#[tokio::test]
async fn my_searches_scoped_to_identifier() {
  let (app, state) = app().await;
  state.ledger.record_final("cats", "u1", "127.0.0.1", 0).await.unwrap();
  state.ledger.record_final("dogs", "u2", "127.0.0.1", 0).await.unwrap();

  let response = app
    .oneshot(with_identifier(request(Method::GET, "/my_searches", None), "u1"))
    .await
    .unwrap();
  let body = body_json(response).await;
  assert_eq!(body["user_identifier"], "u1");
  let searches = body["searches"].as_array().unwrap();
  assert_eq!(searches.len(), 1);
  assert_eq!(searches[0]["term"], "cats");
}

#[tokio::test]
async fn ip_searches_scoped_to_address() {
  let (app, state) = app().await;
  state.ledger.record_final("cats", "u1", "10.0.0.9", 0).await.unwrap();

  let response = app
    .oneshot(request(Method::GET, "/ip_searches?ip=10.0.0.9", None))
    .await
    .unwrap();
  let body = body_json(response).await;
  assert_eq!(body["ip_address"], "10.0.0.9");
  assert_eq!(body["searches"].as_array().unwrap().len(), 1);
}
