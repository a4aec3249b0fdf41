//! [`SqliteLedger`] — the SQLite implementation of [`SearchLedger`].

use std::{path::Path, sync::Arc};

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use scry_core::{
  ledger::SearchLedger,
  prune::{HalfPrefixPrune, PruneStrategy},
  types::{
    AnalyticsTotals, Document, NewDocument, SearchQuery, TermCount, TopDocument,
  },
};

use crate::{
  Error, Result,
  encode::{RawDocument, RawSearchQuery, encode_dt},
  schema::SCHEMA,
};

const QUERY_COLUMNS: &str = "id, term, user_identifier, ip_address, \
                             search_count, results_count, last_searched_at, created_at";

fn map_query_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSearchQuery> {
  Ok(RawSearchQuery {
    id:               row.get(0)?,
    term:             row.get(1)?,
    user_identifier:  row.get(2)?,
    ip_address:       row.get(3)?,
    search_count:     row.get(4)?,
    results_count:    row.get(5)?,
    last_searched_at: row.get(6)?,
    created_at:       row.get(7)?,
  })
}

fn map_document_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDocument> {
  Ok(RawDocument {
    id:       row.get(0)?,
    title:    row.get(1)?,
    content:  row.get(2)?,
    author:   row.get(3)?,
    category: row.get(4)?,
  })
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// A scry ledger backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteLedger {
  conn:  tokio_rusqlite::Connection,
  prune: Arc<dyn PruneStrategy>,
}

impl SqliteLedger {
  /// Open (or create) a ledger at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, Arc::new(HalfPrefixPrune)).await
  }

  /// Open an in-memory ledger — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, Arc::new(HalfPrefixPrune)).await
  }

  /// Replace the prune strategy. The recorder's transactional contract is
  /// unaffected by the choice of strategy.
  pub fn with_prune_strategy(mut self, strategy: Arc<dyn PruneStrategy>) -> Self {
    self.prune = strategy;
    self
  }

  async fn init(
    conn: tokio_rusqlite::Connection,
    prune: Arc<dyn PruneStrategy>,
  ) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, prune })
  }

  async fn query_rows(
    &self,
    sql: &'static str,
    params: Vec<Box<dyn rusqlite::ToSql + Send>>,
  ) -> Result<Vec<SearchQuery>> {
    let raws: Vec<RawSearchQuery> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(sql)?;
        let refs: Vec<&dyn rusqlite::ToSql> =
          params.iter().map(|p| p.as_ref() as &dyn rusqlite::ToSql).collect();
        let rows = stmt
          .query_map(refs.as_slice(), map_query_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSearchQuery::into_search_query).collect()
  }

  async fn top_documents_where(
    &self,
    user: Option<String>,
    limit: u32,
  ) -> Result<Vec<TopDocument>> {
    let rows: Vec<(RawDocument, u32)> = self
      .conn
      .call(move |conn| {
        let sql = if user.is_some() {
          "SELECT d.id, d.title, d.content, d.author, d.category,
                  COUNT(a.search_query_id) AS appearances
           FROM documents d
           JOIN appearances a     ON a.document_id = d.id
           JOIN search_queries q  ON q.id = a.search_query_id
           WHERE q.user_identifier = ?1
           GROUP BY d.id
           ORDER BY appearances DESC
           LIMIT ?2"
        } else {
          "SELECT d.id, d.title, d.content, d.author, d.category,
                  COUNT(a.search_query_id) AS appearances
           FROM documents d
           JOIN appearances a ON a.document_id = d.id
           GROUP BY d.id
           ORDER BY appearances DESC
           LIMIT ?1"
        };

        let mut stmt = conn.prepare(sql)?;
        let map = |row: &rusqlite::Row<'_>| {
          Ok((map_document_row(row)?, row.get::<_, u32>(5)?))
        };
        let rows = if let Some(user) = user {
          stmt
            .query_map(rusqlite::params![user, limit], map)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          stmt
            .query_map(rusqlite::params![limit], map)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    Ok(
      rows
        .into_iter()
        .map(|(raw, appearances)| TopDocument {
          document: raw.into_document(),
          appearances,
        })
        .collect(),
    )
  }
}

// ─── SearchLedger impl ───────────────────────────────────────────────────────

impl SearchLedger for SqliteLedger {
  type Error = Error;

  // ── Documents ─────────────────────────────────────────────────────────────

  async fn add_document(&self, input: NewDocument) -> Result<Document> {
    let now_str = encode_dt(Utc::now());
    let NewDocument { title, content, author, category } = input;

    let raw: RawDocument = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO documents (title, content, author, category, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![title, content, author, category, now_str],
        )?;
        let id = conn.last_insert_rowid();
        let raw = conn.query_row(
          "SELECT id, title, content, author, category FROM documents WHERE id = ?1",
          rusqlite::params![id],
          map_document_row,
        )?;
        Ok(raw)
      })
      .await?;

    Ok(raw.into_document())
  }

  async fn list_documents(&self) -> Result<Vec<Document>> {
    let raws: Vec<RawDocument> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT id, title, content, author, category FROM documents ORDER BY id",
        )?;
        let rows = stmt
          .query_map([], map_document_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawDocument::into_document).collect())
  }

  async fn search_documents(&self, term: &str) -> Result<Vec<Document>> {
    let term = term.trim().to_owned();
    if term.is_empty() {
      return self.list_documents().await;
    }
    let pattern = format!("%{term}%");

    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, title, content, author, category FROM documents
           WHERE title LIKE ?1 OR content LIKE ?1
           ORDER BY id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![pattern], map_document_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawDocument::into_document).collect())
  }

  // ── Recorder ──────────────────────────────────────────────────────────────

  async fn record_final(
    &self,
    term: &str,
    user_identifier: &str,
    ip_address: &str,
    results_count: u32,
  ) -> Result<SearchQuery> {
    let term = term.trim().to_owned();
    if term.is_empty() {
      return Err(Error::Core(scry_core::Error::BlankTerm));
    }

    let user = user_identifier.to_owned();
    let ip = ip_address.to_owned();
    let now_str = encode_dt(Utc::now());
    let strategy = Arc::clone(&self.prune);

    let raw: RawSearchQuery = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        // ON CONFLICT makes a concurrent insert for the same triple resolve
        // as an update rather than a uniqueness failure.
        tx.execute(
          "INSERT INTO search_queries
             (term, user_identifier, ip_address,
              search_count, results_count, last_searched_at, created_at)
           VALUES (?1, ?2, ?3, 1, ?4, ?5, ?5)
           ON CONFLICT (term, user_identifier, ip_address) DO UPDATE SET
             search_count     = search_count + 1,
             results_count    = excluded.results_count,
             last_searched_at = excluded.last_searched_at",
          rusqlite::params![term, user, ip, results_count, now_str],
        )?;

        let raw = tx.query_row(
          &format!(
            "SELECT {QUERY_COLUMNS} FROM search_queries
             WHERE term = ?1 AND user_identifier = ?2 AND ip_address = ?3"
          ),
          rusqlite::params![term, user, ip],
          map_query_row,
        )?;

        // Prune pass: delete the user's typing-intermediate terms. Runs only
        // after a successful upsert, inside the same transaction. Candidates
        // are filtered through the strategy in Rust so the rule stays
        // pluggable; per-user row counts are small.
        let candidates: Vec<(i64, String)> = {
          let mut stmt = tx.prepare(
            "SELECT id, term FROM search_queries
             WHERE user_identifier = ?1 AND id != ?2",
          )?;
          let rows = stmt
            .query_map(rusqlite::params![user, raw.id], |row| {
              Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          rows
        };

        for (candidate_id, candidate_term) in candidates {
          if strategy.supersedes(&term, &candidate_term) {
            tx.execute(
              "DELETE FROM search_queries WHERE id = ?1",
              rusqlite::params![candidate_id],
            )?;
          }
        }

        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_search_query()
  }

  async fn record_appearances(
    &self,
    document_ids: &[i64],
    user_identifier: &str,
  ) -> Result<u32> {
    let ids = document_ids.to_vec();
    let user = user_identifier.to_owned();
    let now_str = encode_dt(Utc::now());

    let created: u32 = self
      .conn
      .call(move |conn| {
        // The most recently created query for this user is the one the
        // recorder just saved.
        let query_id: Option<i64> = conn
          .query_row(
            "SELECT id FROM search_queries
             WHERE user_identifier = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
            rusqlite::params![user],
            |row| row.get(0),
          )
          .optional()?;

        let Some(query_id) = query_id else {
          tracing::warn!(%user, "no search query on record, skipping appearances");
          return Ok(0);
        };

        let mut created = 0u32;
        for document_id in ids {
          // First-write-wins: repeated calls for the same pair are no-ops.
          created += conn.execute(
            "INSERT OR IGNORE INTO appearances
               (document_id, search_query_id, view_count, created_at)
             VALUES (?1, ?2, 1, ?3)",
            rusqlite::params![document_id, query_id, now_str],
          )? as u32;
        }
        Ok(created)
      })
      .await?;

    Ok(created)
  }

  // ── Ledger reads ──────────────────────────────────────────────────────────

  async fn top_searches_for_user(
    &self,
    user_identifier: &str,
    limit: u32,
  ) -> Result<Vec<SearchQuery>> {
    self
      .query_rows(
        "SELECT id, term, user_identifier, ip_address, \
                search_count, results_count, last_searched_at, created_at \
         FROM search_queries \
         WHERE user_identifier = ?1 \
         ORDER BY search_count DESC \
         LIMIT ?2",
        vec![
          Box::new(user_identifier.to_owned()),
          Box::new(limit),
        ],
      )
      .await
  }

  async fn top_searches_from_ip(
    &self,
    ip_address: &str,
    limit: u32,
  ) -> Result<Vec<SearchQuery>> {
    self
      .query_rows(
        "SELECT id, term, user_identifier, ip_address, \
                search_count, results_count, last_searched_at, created_at \
         FROM search_queries \
         WHERE ip_address = ?1 \
         ORDER BY search_count DESC \
         LIMIT ?2",
        vec![Box::new(ip_address.to_owned()), Box::new(limit)],
      )
      .await
  }

  async fn top_terms_for_user(
    &self,
    user_identifier: &str,
    limit: u32,
  ) -> Result<Vec<String>> {
    let user = user_identifier.to_owned();
    let terms: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT term FROM search_queries
           WHERE user_identifier = ?1
           ORDER BY search_count DESC
           LIMIT ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user, limit], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(terms)
  }

  async fn top_documents_for_user(
    &self,
    user_identifier: &str,
    limit: u32,
  ) -> Result<Vec<TopDocument>> {
    self
      .top_documents_where(Some(user_identifier.to_owned()), limit)
      .await
  }

  async fn analytics_totals(&self, user_identifier: &str) -> Result<AnalyticsTotals> {
    let user = user_identifier.to_owned();
    let totals = self
      .conn
      .call(move |conn| {
        let unique_terms: u32 = conn.query_row(
          "SELECT COUNT(*) FROM search_queries WHERE user_identifier = ?1",
          rusqlite::params![user],
          |row| row.get(0),
        )?;
        let documents_surfaced: u32 = conn.query_row(
          "SELECT COUNT(DISTINCT a.document_id)
           FROM appearances a
           JOIN search_queries q ON q.id = a.search_query_id
           WHERE q.user_identifier = ?1",
          rusqlite::params![user],
          |row| row.get(0),
        )?;
        let total_appearances: u32 = conn.query_row(
          "SELECT COUNT(*)
           FROM appearances a
           JOIN search_queries q ON q.id = a.search_query_id
           WHERE q.user_identifier = ?1",
          rusqlite::params![user],
          |row| row.get(0),
        )?;
        Ok(AnalyticsTotals { unique_terms, documents_surfaced, total_appearances })
      })
      .await?;
    Ok(totals)
  }

  // ── Global scope ──────────────────────────────────────────────────────────

  async fn top_terms_global(&self, limit: u32) -> Result<Vec<TermCount>> {
    let rows: Vec<TermCount> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT term, SUM(search_count) AS total_searches
           FROM search_queries
           GROUP BY term
           ORDER BY total_searches DESC
           LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit], |row| {
            Ok(TermCount { term: row.get(0)?, total_searches: row.get(1)? })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn top_searches_global(&self, limit: u32) -> Result<Vec<SearchQuery>> {
    self
      .query_rows(
        "SELECT id, term, user_identifier, ip_address, \
                search_count, results_count, last_searched_at, created_at \
         FROM search_queries \
         ORDER BY search_count DESC \
         LIMIT ?1",
        vec![Box::new(limit)],
      )
      .await
  }

  async fn top_documents_global(&self, limit: u32) -> Result<Vec<TopDocument>> {
    self.top_documents_where(None, limit).await
  }

  async fn analytics_totals_global(&self) -> Result<AnalyticsTotals> {
    let totals = self
      .conn
      .call(|conn| {
        let unique_terms: u32 = conn.query_row(
          "SELECT COUNT(DISTINCT term) FROM search_queries",
          [],
          |row| row.get(0),
        )?;
        let documents_surfaced: u32 = conn.query_row(
          "SELECT COUNT(DISTINCT document_id) FROM appearances",
          [],
          |row| row.get(0),
        )?;
        let total_appearances: u32 =
          conn.query_row("SELECT COUNT(*) FROM appearances", [], |row| row.get(0))?;
        Ok(AnalyticsTotals { unique_terms, documents_surfaced, total_appearances })
      })
      .await?;
    Ok(totals)
  }
}
