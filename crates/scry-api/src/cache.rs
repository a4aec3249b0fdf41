//! Read-through, time-boxed cache of per-user aggregated analytics.
//!
//! Cache-aside with TTL-only invalidation: a final search that changes the
//! ledger is not reflected here until the entry expires. If stronger
//! consistency is ever needed, add explicit invalidation on `record_final`
//! rather than shortening the TTL.

use std::{
  collections::HashMap,
  sync::Mutex,
  time::{Duration, Instant},
};

use scry_core::types::AnalyticsView;

struct CacheEntry {
  cached_at: Instant,
  view:      AnalyticsView,
}

/// In-process per-identifier cache of [`AnalyticsView`] snapshots.
///
/// Any internal failure (a poisoned lock) degrades to pass-through: reads
/// miss and writes are dropped, with a log line. Ledger correctness is
/// unaffected, only hit rate.
pub struct AnalyticsCache {
  ttl:     Duration,
  entries: Mutex<HashMap<String, CacheEntry>>,
}

impl AnalyticsCache {
  pub fn new(ttl: Duration) -> Self {
    Self { ttl, entries: Mutex::new(HashMap::new()) }
  }

  /// Return the unexpired snapshot for `key`, if any. Expired entries are
  /// dropped on the way out.
  pub fn get(&self, key: &str) -> Option<AnalyticsView> {
    let mut entries = match self.entries.lock() {
      Ok(guard) => guard,
      Err(e) => {
        tracing::warn!("analytics cache unavailable: {e}");
        return None;
      }
    };

    match entries.get(key) {
      Some(entry) if entry.cached_at.elapsed() < self.ttl => {
        Some(entry.view.clone())
      }
      Some(_) => {
        entries.remove(key);
        None
      }
      None => None,
    }
  }

  pub fn put(&self, key: &str, view: AnalyticsView) {
    match self.entries.lock() {
      Ok(mut entries) => {
        entries
          .insert(key.to_owned(), CacheEntry { cached_at: Instant::now(), view });
      }
      Err(e) => tracing::warn!("analytics cache unavailable: {e}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use scry_core::types::{AnalyticsTotals, AnalyticsView};

  fn view(unique_terms: u32) -> AnalyticsView {
    AnalyticsView {
      top_searches:  vec![],
      top_documents: vec![],
      totals:        AnalyticsTotals {
        unique_terms,
        documents_surfaced: 0,
        total_appearances: 0,
      },
    }
  }

  #[test]
  fn hit_within_ttl_returns_snapshot() {
    let cache = AnalyticsCache::new(Duration::from_secs(60));
    cache.put("u1", view(3));

    // A later put under a different key does not disturb u1's snapshot.
    cache.put("u2", view(9));
    let got = cache.get("u1").expect("hit");
    assert_eq!(got.totals.unique_terms, 3);
  }

  #[test]
  fn stale_snapshot_served_until_expiry() {
    // Documented staleness: the cached view wins even if the ledger moved.
    let cache = AnalyticsCache::new(Duration::from_secs(60));
    cache.put("u1", view(3));
    cache.put("u1", view(4));
    assert_eq!(cache.get("u1").unwrap().totals.unique_terms, 4);
  }

  #[test]
  fn expired_entry_misses() {
    let cache = AnalyticsCache::new(Duration::ZERO);
    cache.put("u1", view(3));
    assert!(cache.get("u1").is_none());
  }

  #[test]
  fn unknown_key_misses() {
    let cache = AnalyticsCache::new(Duration::from_secs(60));
    assert!(cache.get("nobody").is_none());
  }
}
