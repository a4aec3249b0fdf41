//! JSON shaping for analytics responses.
//!
//! [`TermSummary`] replaces the duck-typed "string or record" shaping the
//! pipeline used to do: one explicit formatting function per variant, with
//! [`format_term_summary`] as the single dispatch point.

use chrono::Utc;
use scry_core::types::{SearchQuery, TermSummary, TopDocument};
use serde_json::{Value, json};

pub fn format_term_summary(summary: &TermSummary) -> Value {
  match summary {
    TermSummary::RawTerm(term) => format_raw_term(term),
    TermSummary::Query(query) => format_query_record(query),
  }
}

/// A bare term carries placeholder counters.
fn format_raw_term(term: &str) -> Value {
  json!({
    "term": term,
    "count": 1,
    "results": 0,
    "last_searched": Utc::now(),
  })
}

/// The full ledger row, scope keys included.
pub fn format_query_record(query: &SearchQuery) -> Value {
  json!({
    "term": query.term,
    "count": query.search_count,
    "results": query.results_count,
    "last_searched": query.last_searched_at,
    "user_identifier": query.user_identifier,
    "ip_address": query.ip_address,
  })
}

/// The ledger row without scope keys, for reads already scoped to a user.
pub fn format_query_brief(query: &SearchQuery) -> Value {
  json!({
    "term": query.term,
    "count": query.search_count,
    "results": query.results_count,
    "last_searched": query.last_searched_at,
  })
}

pub fn format_top_document(top: &TopDocument) -> Value {
  json!({
    "id": top.document.id,
    "title": top.document.title,
    "category": top.document.category,
    "appearances": top.appearances,
  })
}
