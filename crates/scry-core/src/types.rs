//! Domain types shared across the scry crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Documents ───────────────────────────────────────────────────────────────

/// A searchable document. Owned by the store; read-only from the analytics
/// pipeline's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
  pub id:       i64,
  pub title:    String,
  pub content:  String,
  pub author:   Option<String>,
  pub category: Option<String>,
}

/// Input for [`SearchLedger::add_document`](crate::ledger::SearchLedger).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
  pub title:    String,
  pub content:  String,
  #[serde(default)]
  pub author:   Option<String>,
  #[serde(default)]
  pub category: Option<String>,
}

// ─── Search queries ──────────────────────────────────────────────────────────

/// One row per distinct `(term, user_identifier, ip_address)` triple.
///
/// Created on the first final search with that triple; the counter is bumped
/// and `results_count`/`last_searched_at` refreshed on every subsequent final
/// search. Rows may be deleted by the prune pass when superseded by a more
/// specific final term from the same user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
  pub id:               i64,
  pub term:             String,
  pub user_identifier:  String,
  pub ip_address:       String,
  pub search_count:     u32,
  pub results_count:    u32,
  pub last_searched_at: Option<DateTime<Utc>>,
  pub created_at:       DateTime<Utc>,
}

/// The fact that a document surfaced in the result set of a final search.
///
/// At most one row per `(document_id, search_query_id)` pair, ever.
/// `view_count` is set to 1 at creation and never incremented; the per-user
/// appearance count for a document is the number of distinct final queries
/// that surfaced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appearance {
  pub document_id:     i64,
  pub search_query_id: i64,
  pub view_count:      u32,
}

// ─── Aggregated analytics ────────────────────────────────────────────────────

/// A globally-aggregated term: `search_count` summed over every user/IP row
/// carrying that term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermCount {
  pub term:           String,
  pub total_searches: u32,
}

/// A document with its appearance count within some scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopDocument {
  pub document:    Document,
  pub appearances: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsTotals {
  /// Distinct terms searched within the scope.
  pub unique_terms:       u32,
  /// Distinct documents that ever surfaced for the scope's final searches.
  pub documents_surfaced: u32,
  /// Total appearance events within the scope.
  pub total_appearances:  u32,
}

/// The derived per-scope analytics view. Never stored independently; always
/// rebuildable from the ledger. The cache holds an expendable copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsView {
  pub top_searches:  Vec<SearchQuery>,
  pub top_documents: Vec<TopDocument>,
  pub totals:        AnalyticsTotals,
}

/// A search term as it appears in an analytics response.
///
/// Some reads produce only the raw term string (e.g. the compact
/// `top_searches` list in the search envelope); others produce the full
/// ledger row. The API layer has one formatting function per variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermSummary {
  RawTerm(String),
  Query(SearchQuery),
}

// ─── Pending-search replay ───────────────────────────────────────────────────

/// One entry of the client's durable pending-search queue, and the wire shape
/// of the replay batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSearch {
  pub query:     String,
  #[serde(rename = "isFinal")]
  pub is_final:  bool,
  /// Milliseconds since the Unix epoch, client clock.
  pub timestamp: i64,
}
