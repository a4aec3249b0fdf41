//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings.

use chrono::{DateTime, Utc};
use scry_core::types::{Document, SearchQuery};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Raw row structs ─────────────────────────────────────────────────────────

/// A `documents` row as read straight out of SQLite.
pub struct RawDocument {
  pub id:       i64,
  pub title:    String,
  pub content:  String,
  pub author:   Option<String>,
  pub category: Option<String>,
}

impl RawDocument {
  pub fn into_document(self) -> Document {
    Document {
      id:       self.id,
      title:    self.title,
      content:  self.content,
      author:   self.author,
      category: self.category,
    }
  }
}

/// A `search_queries` row as read straight out of SQLite.
pub struct RawSearchQuery {
  pub id:               i64,
  pub term:             String,
  pub user_identifier:  String,
  pub ip_address:       String,
  pub search_count:     u32,
  pub results_count:    u32,
  pub last_searched_at: Option<String>,
  pub created_at:       String,
}

impl RawSearchQuery {
  pub fn into_search_query(self) -> Result<SearchQuery> {
    Ok(SearchQuery {
      id:               self.id,
      term:             self.term,
      user_identifier:  self.user_identifier,
      ip_address:       self.ip_address,
      search_count:     self.search_count,
      results_count:    self.results_count,
      last_searched_at: self
        .last_searched_at
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}
