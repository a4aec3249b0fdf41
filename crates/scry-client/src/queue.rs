//! Durable pending-search queue.
//!
//! Final searches that cannot reach the server (offline, page closing) are
//! appended to a JSON file and replayed as a batch on the next start. The
//! file is rewritten whole on every change; entries survive process crashes
//! but a corrupt file is treated as empty rather than blocking startup.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use scry_core::types::PendingSearch;

/// File-backed queue of final searches awaiting replay.
#[derive(Debug, Clone)]
pub struct PendingQueue {
  path: PathBuf,
}

impl PendingQueue {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Read every queued entry. A missing or unreadable file yields an empty
  /// queue; replay must never be blocked by a bad file.
  pub fn load(&self) -> Vec<PendingSearch> {
    let raw = match std::fs::read_to_string(&self.path) {
      Ok(raw) => raw,
      Err(_) => return Vec::new(),
    };
    match serde_json::from_str(&raw) {
      Ok(entries) => entries,
      Err(error) => {
        tracing::warn!(%error, path = %self.path.display(), "discarding corrupt pending queue");
        Vec::new()
      }
    }
  }

  /// Append a final search, stamped with the current wall clock.
  pub fn enqueue_final(&self, term: &str) -> Result<()> {
    let mut entries = self.load();
    entries.push(PendingSearch {
      query:     term.to_owned(),
      is_final:  true,
      timestamp: Utc::now().timestamp_millis(),
    });
    self.write(&entries)
  }

  /// Drop every queued entry.
  pub fn clear(&self) -> Result<()> {
    if self.path.exists() {
      std::fs::remove_file(&self.path)
        .with_context(|| format!("failed to clear queue {:?}", self.path))?;
    }
    Ok(())
  }

  fn write(&self, entries: &[PendingSearch]) -> Result<()> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {parent:?}"))?;
    }
    let raw = serde_json::to_string(entries).context("serialising pending queue")?;
    std::fs::write(&self.path, raw)
      .with_context(|| format!("failed to write queue {:?}", self.path))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn queue_in(dir: &tempfile::TempDir) -> PendingQueue {
    PendingQueue::new(dir.path().join("pending_searches.json"))
  }

  #[test]
  fn missing_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    assert!(queue_in(&dir).load().is_empty());
  }

  #[test]
  fn enqueued_entries_round_trip_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let queue = queue_in(&dir);

    queue.enqueue_final("cats").unwrap();
    queue.enqueue_final("dogs").unwrap();

    let entries = queue.load();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].query, "cats");
    assert_eq!(entries[1].query, "dogs");
    assert!(entries.iter().all(|e| e.is_final));
  }

  #[test]
  fn clear_empties_the_queue() {
    let dir = tempfile::tempdir().unwrap();
    let queue = queue_in(&dir);

    queue.enqueue_final("cats").unwrap();
    queue.clear().unwrap();
    assert!(queue.load().is_empty());
  }

  #[test]
  fn corrupt_file_is_treated_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let queue = queue_in(&dir);

    std::fs::write(queue.path(), "{not json").unwrap();
    assert!(queue.load().is_empty());

    // And the queue stays usable afterwards.
    queue.enqueue_final("cats").unwrap();
    assert_eq!(queue.load().len(), 1);
  }

  #[test]
  fn entries_serialise_with_wire_field_names() {
    let dir = tempfile::tempdir().unwrap();
    let queue = queue_in(&dir);

    queue.enqueue_final("cats").unwrap();
    let raw = std::fs::read_to_string(queue.path()).unwrap();
    assert!(raw.contains("\"isFinal\":true"));
  }
}
