//! Single-flight guard for search dispatches.
//!
//! At most one search request is in flight at a time; a dispatch arriving
//! while another is live is dropped, not queued. The session's debounce makes
//! dropped intermediates harmless, and finality deadlines are re-checked
//! before debounce so a final is never the casualty.

use std::sync::atomic::{AtomicBool, Ordering};

/// Outcome of a guarded dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchResult {
  /// The request ran and succeeded.
  Completed,
  /// The request ran and failed.
  Failed,
  /// Another request was already in flight; this one was discarded.
  Dropped,
}

/// In-flight flag shared between the event loop and request futures.
#[derive(Debug, Default)]
pub struct Dispatcher {
  in_flight: AtomicBool,
}

impl Dispatcher {
  pub fn new() -> Self {
    Self::default()
  }

  /// Claim the in-flight slot. Returns false if a request already holds it.
  pub fn try_begin(&self) -> bool {
    self
      .in_flight
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  /// Release the slot. Must run on every exit path, success or failure.
  pub fn finish(&self) {
    self.in_flight.store(false, Ordering::Release);
  }

  pub fn is_busy(&self) -> bool {
    self.in_flight.load(Ordering::Acquire)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn second_begin_is_refused_until_finish() {
    let dispatcher = Dispatcher::new();

    assert!(dispatcher.try_begin());
    assert!(dispatcher.is_busy());
    assert!(!dispatcher.try_begin());

    dispatcher.finish();
    assert!(!dispatcher.is_busy());
    assert!(dispatcher.try_begin());
  }

  #[test]
  fn finish_after_failure_reopens_the_slot() {
    let dispatcher = Dispatcher::new();

    assert!(dispatcher.try_begin());
    // The request failed; the flag must still clear.
    dispatcher.finish();
    assert!(dispatcher.try_begin());
  }
}
