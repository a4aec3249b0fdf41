//! Async HTTP client wrapping the scry JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use scry_core::types::{Document, PendingSearch};
use serde::Deserialize;
use serde_json::Value;

/// The search envelope as served by `GET /search`.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
  pub documents: Vec<Document>,
  pub total:     u64,
  /// Opaque analytics block: top searches, trending terms, identifier echo.
  pub analytics: Value,
}

#[derive(Debug, Deserialize)]
struct ReplayResponse {
  processed: u32,
}

/// Async HTTP client for the scry JSON API.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based. The cookie
/// store keeps the server-minted identifier stable across requests.
#[derive(Clone)]
pub struct ApiClient {
  client:   Client,
  base_url: String,
}

impl ApiClient {
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .cookie_store(true)
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self {
      client,
      base_url: base_url.into(),
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{path}", self.base_url.trim_end_matches('/'))
  }

  /// `GET /documents`
  pub async fn list_documents(&self) -> Result<Vec<Document>> {
    let resp = self
      .client
      .get(self.url("/documents"))
      .send()
      .await
      .context("GET /documents failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /documents → {}", resp.status()));
    }
    resp.json().await.context("deserialising documents")
  }

  /// `GET /search?query=<term>&is_final=<bool>`
  pub async fn search(&self, term: &str, is_final: bool) -> Result<SearchResponse> {
    let resp = self
      .client
      .get(self.url("/search"))
      .query(&[("query", term), ("is_final", &is_final.to_string())])
      .send()
      .await
      .context("GET /search failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /search → {}", resp.status()));
    }
    resp.json().await.context("deserialising search response")
  }

  /// `GET /analytics`
  pub async fn analytics(&self) -> Result<Value> {
    let resp = self
      .client
      .get(self.url("/analytics"))
      .send()
      .await
      .context("GET /analytics failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET /analytics → {}", resp.status()));
    }
    resp.json().await.context("deserialising analytics")
  }

  /// `POST /process_pending_searches` — returns how many entries the server
  /// accepted and recorded.
  pub async fn process_pending_searches(
    &self,
    entries: &[PendingSearch],
  ) -> Result<u32> {
    let resp = self
      .client
      .post(self.url("/process_pending_searches"))
      .json(&serde_json::json!({ "pending_searches": entries }))
      .send()
      .await
      .context("POST /process_pending_searches failed")?;

    if !resp.status().is_success() {
      return Err(anyhow!("POST /process_pending_searches → {}", resp.status()));
    }
    let body: ReplayResponse = resp
      .json()
      .await
      .context("deserialising replay response")?;
    Ok(body.processed)
  }
}
