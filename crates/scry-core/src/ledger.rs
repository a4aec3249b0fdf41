//! The `SearchLedger` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g. `scry-store-sqlite`).
//! The API layer depends on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::types::{
  AnalyticsTotals, Document, NewDocument, SearchQuery, TermCount, TopDocument,
};

/// Abstraction over the relational ledger behind the analytics pipeline.
///
/// The document side is a black box from the pipeline's perspective:
/// `search_documents` is plain substring matching with no ranking. The
/// analytics side carries the real contract: `record_final` runs its upsert
/// and prune pass as one atomic unit, and `record_appearances` is
/// first-write-wins per `(document, query)` pair.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait SearchLedger: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Documents ─────────────────────────────────────────────────────────

  /// Persist a new document. Used for seeding and tests.
  fn add_document(
    &self,
    input: NewDocument,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + '_;

  /// All documents, in insertion order.
  fn list_documents(
    &self,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  /// Substring search over title and content. A blank term matches
  /// everything.
  fn search_documents<'a>(
    &'a self,
    term: &'a str,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + 'a;

  // ── Recorder ──────────────────────────────────────────────────────────

  /// Record one final search: upsert the `(term, user, ip)` row (bumping
  /// `search_count`, refreshing `results_count` and `last_searched_at`),
  /// then prune the user's typing-intermediate terms.
  ///
  /// Both steps run inside a single transaction; if the upsert fails the
  /// prune must not run, and no partial state is visible to readers. A
  /// concurrent final search for the same triple must resolve as an update,
  /// not a uniqueness failure.
  fn record_final<'a>(
    &'a self,
    term: &'a str,
    user_identifier: &'a str,
    ip_address: &'a str,
    results_count: u32,
  ) -> impl Future<Output = Result<SearchQuery, Self::Error>> + Send + 'a;

  /// Record that each document surfaced for the user's most recent final
  /// query. Creation is conditional on absence; repeated calls for the same
  /// pair are no-ops. Returns the number of rows actually created.
  fn record_appearances<'a>(
    &'a self,
    document_ids: &'a [i64],
    user_identifier: &'a str,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + 'a;

  // ── Ledger reads ──────────────────────────────────────────────────────

  fn top_searches_for_user<'a>(
    &'a self,
    user_identifier: &'a str,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<SearchQuery>, Self::Error>> + Send + 'a;

  fn top_searches_from_ip<'a>(
    &'a self,
    ip_address: &'a str,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<SearchQuery>, Self::Error>> + Send + 'a;

  /// Just the term strings, most-searched first. Feeds the compact
  /// `top_searches` list in the search response envelope.
  fn top_terms_for_user<'a>(
    &'a self,
    user_identifier: &'a str,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  fn top_documents_for_user<'a>(
    &'a self,
    user_identifier: &'a str,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<TopDocument>, Self::Error>> + Send + 'a;

  fn analytics_totals<'a>(
    &'a self,
    user_identifier: &'a str,
  ) -> impl Future<Output = Result<AnalyticsTotals, Self::Error>> + Send + 'a;

  // ── Global scope ──────────────────────────────────────────────────────

  /// Terms aggregated across all users, by summed search count.
  fn top_terms_global(
    &self,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<TermCount>, Self::Error>> + Send + '_;

  /// Ungrouped ledger rows across all users, by search count.
  fn top_searches_global(
    &self,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<SearchQuery>, Self::Error>> + Send + '_;

  fn top_documents_global(
    &self,
    limit: u32,
  ) -> impl Future<Output = Result<Vec<TopDocument>, Self::Error>> + Send + '_;

  fn analytics_totals_global(
    &self,
  ) -> impl Future<Output = Result<AnalyticsTotals, Self::Error>> + Send + '_;
}
