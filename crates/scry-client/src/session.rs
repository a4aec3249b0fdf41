//! The typing-finality state machine.
//!
//! Converts a raw keystroke stream into intermediate search dispatches and
//! exactly one final search per uninterrupted typing burst. Time is injected
//! as [`Instant`] so the machine itself owns no timers; the driver arms a
//! single wakeup for [`SearchSession::next_deadline`] and calls
//! [`SearchSession::on_tick`] when it passes.

use std::time::{Duration, Instant};

/// Inactivity window after which the last typed value becomes final.
pub const FINALITY_DELAY: Duration = Duration::from_millis(1000);

/// Debounce window for intermediate dispatches while typing.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(300);

// ─── Events and actions ──────────────────────────────────────────────────────

/// An input event fed into the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
  /// The input field now holds this value (possibly empty).
  Keystroke(String),
  /// Explicit cancel key or clear action.
  Clear,
  /// The page lost focus with the session still live.
  FocusLost,
  /// The page is closing; only durable work is possible.
  Unload,
}

/// An effect the driver must carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  /// Dispatch a search shown to the user but not recorded to analytics.
  DispatchIntermediate(String),
  /// Dispatch the single final search of this burst.
  DispatchFinal(String),
  /// Durably enqueue a final intent without dispatching (page is closing).
  EnqueueFinal(String),
  /// Input was cleared: fetch the unscoped listing.
  FetchAll,
  /// Clear displayed results.
  ClearResults,
  /// Surface the transient "final search" notification.
  NotifyFinal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
  Idle,
  Typing,
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// Per-input-stream state. One finality deadline is live at a time by
/// construction: every keystroke replaces it rather than stacking timers.
#[derive(Debug)]
pub struct SearchSession {
  mode:          Mode,
  term:          String,
  finalize_at:   Option<Instant>,
  debounce_at:   Option<Instant>,
  last_input_at: Option<Instant>,
}

impl Default for SearchSession {
  fn default() -> Self {
    Self::new()
  }
}

impl SearchSession {
  pub fn new() -> Self {
    Self {
      mode:          Mode::Idle,
      term:          String::new(),
      finalize_at:   None,
      debounce_at:   None,
      last_input_at: None,
    }
  }

  /// The last non-empty typed value, if any.
  pub fn current_term(&self) -> &str {
    &self.term
  }

  /// The next instant at which [`on_tick`](Self::on_tick) has work to do.
  pub fn next_deadline(&self) -> Option<Instant> {
    match (self.finalize_at, self.debounce_at) {
      (Some(f), Some(d)) => Some(f.min(d)),
      (Some(f), None) => Some(f),
      (None, Some(d)) => Some(d),
      (None, None) => None,
    }
  }

  /// Feed an input event; returns the effects to carry out.
  pub fn on_event(&mut self, event: Event, now: Instant) -> Vec<Action> {
    match event {
      Event::Keystroke(value) => self.on_keystroke(value, now),
      Event::Clear => {
        self.reset();
        vec![Action::ClearResults, Action::FetchAll]
      }
      Event::FocusLost => {
        if self.term.is_empty() {
          return Vec::new();
        }
        // Guaranteed finalization: dispatch now regardless of timer state.
        let term = self.term.clone();
        self.cancel_timers();
        self.mode = Mode::Idle;
        vec![Action::DispatchFinal(term)]
      }
      Event::Unload => {
        // Best effort: no network round-trip is possible, only the durable
        // queue. Replayed on next load.
        if self.mode == Mode::Typing && !self.term.is_empty() {
          vec![Action::EnqueueFinal(self.term.clone())]
        } else {
          Vec::new()
        }
      }
    }
  }

  fn on_keystroke(&mut self, value: String, now: Instant) -> Vec<Action> {
    let value = value.trim().to_owned();

    if value.is_empty() {
      // A final must never fire for a blank term.
      self.reset();
      self.last_input_at = Some(now);
      return vec![Action::FetchAll];
    }

    let first_of_burst = self.mode == Mode::Idle;
    let gap_exceeded = self
      .last_input_at
      .is_none_or(|at| now.duration_since(at) > FINALITY_DELAY);

    self.term = value.clone();
    self.mode = Mode::Typing;
    self.last_input_at = Some(now);
    // A new keystroke always supersedes the previous finality timer.
    self.finalize_at = Some(now + FINALITY_DELAY);

    if first_of_burst || gap_exceeded {
      self.debounce_at = None;
      vec![Action::DispatchIntermediate(value)]
    } else {
      self.debounce_at = Some(now + DEBOUNCE_DELAY);
      Vec::new()
    }
  }

  /// Fire any deadline that has passed. Finality wins if both are due, so a
  /// stale intermediate can never shadow the final dispatch.
  pub fn on_tick(&mut self, now: Instant) -> Vec<Action> {
    if let Some(finalize_at) = self.finalize_at
      && now >= finalize_at
    {
      self.cancel_timers();
      self.mode = Mode::Idle;
      if self.term.is_empty() {
        return Vec::new();
      }
      return vec![
        Action::DispatchFinal(self.term.clone()),
        Action::NotifyFinal(self.term.clone()),
      ];
    }

    if let Some(debounce_at) = self.debounce_at
      && now >= debounce_at
    {
      self.debounce_at = None;
      if self.mode == Mode::Typing {
        return vec![Action::DispatchIntermediate(self.term.clone())];
      }
    }

    Vec::new()
  }

  fn cancel_timers(&mut self) {
    self.finalize_at = None;
    self.debounce_at = None;
  }

  fn reset(&mut self) {
    self.cancel_timers();
    self.mode = Mode::Idle;
    self.term.clear();
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  fn at(t0: Instant, ms: u64) -> Instant {
    t0 + Duration::from_millis(ms)
  }

  fn key(s: &str) -> Event {
    Event::Keystroke(s.into())
  }

  #[test]
  fn first_keystroke_dispatches_immediately() {
    let t0 = Instant::now();
    let mut session = SearchSession::new();

    let actions = session.on_event(key("r"), t0);
    assert_eq!(actions, vec![Action::DispatchIntermediate("r".into())]);
  }

  #[test]
  fn subsequent_keystrokes_debounce() {
    let t0 = Instant::now();
    let mut session = SearchSession::new();

    session.on_event(key("r"), t0);
    let actions = session.on_event(key("ru"), at(t0, 100));
    assert!(actions.is_empty());

    // Debounce fires 300 ms after the second keystroke.
    let actions = session.on_tick(at(t0, 400));
    assert_eq!(actions, vec![Action::DispatchIntermediate("ru".into())]);
  }

  #[test]
  fn burst_ends_in_exactly_one_final_with_last_value() {
    let t0 = Instant::now();
    let mut session = SearchSession::new();

    session.on_event(key("r"), t0);
    session.on_event(key("ru"), at(t0, 100));
    session.on_event(key("rub"), at(t0, 200));
    session.on_event(key("ruby"), at(t0, 300));

    let actions = session.on_tick(at(t0, 1300));
    assert_eq!(actions, vec![
      Action::DispatchFinal("ruby".into()),
      Action::NotifyFinal("ruby".into()),
    ]);

    // No second final, no leftover deadline.
    assert!(session.on_tick(at(t0, 5000)).is_empty());
    assert!(session.next_deadline().is_none());
  }

  #[test]
  fn new_keystroke_supersedes_finality_timer() {
    let t0 = Instant::now();
    let mut session = SearchSession::new();

    session.on_event(key("r"), t0);
    session.on_event(key("ru"), at(t0, 900));

    // The original deadline (t0 + 1000) passes without a final.
    assert!(session.on_tick(at(t0, 1000)).is_empty());

    // The superseding deadline fires with the latest value.
    let actions = session.on_tick(at(t0, 1900));
    assert_eq!(actions[0], Action::DispatchFinal("ru".into()));
  }

  #[test]
  fn gap_longer_than_finality_dispatches_immediately() {
    let t0 = Instant::now();
    let mut session = SearchSession::new();

    session.on_event(key("r"), t0);
    session.on_tick(at(t0, 1000)); // finalizes "r"

    // Well past the previous input: immediate, no debounce.
    let actions = session.on_event(key("re"), at(t0, 2500));
    assert_eq!(actions, vec![Action::DispatchIntermediate("re".into())]);
  }

  #[test]
  fn empty_value_cancels_everything_and_fetches_all() {
    let t0 = Instant::now();
    let mut session = SearchSession::new();

    session.on_event(key("ru"), t0);
    let actions = session.on_event(key(""), at(t0, 100));
    assert_eq!(actions, vec![Action::FetchAll]);
    assert!(session.next_deadline().is_none());

    // No final ever fires for the cancelled burst.
    assert!(session.on_tick(at(t0, 5000)).is_empty());
  }

  #[test]
  fn whitespace_only_value_counts_as_empty() {
    let t0 = Instant::now();
    let mut session = SearchSession::new();

    let actions = session.on_event(key("   "), t0);
    assert_eq!(actions, vec![Action::FetchAll]);
    assert!(session.next_deadline().is_none());
  }

  #[test]
  fn clear_cancels_timers_and_clears_results() {
    let t0 = Instant::now();
    let mut session = SearchSession::new();

    session.on_event(key("ru"), t0);
    let actions = session.on_event(Event::Clear, at(t0, 100));
    assert_eq!(actions, vec![Action::ClearResults, Action::FetchAll]);
    assert!(session.on_tick(at(t0, 5000)).is_empty());
  }

  #[test]
  fn focus_loss_forces_final() {
    let t0 = Instant::now();
    let mut session = SearchSession::new();

    session.on_event(key("cats"), t0);
    let actions = session.on_event(Event::FocusLost, at(t0, 200));
    assert_eq!(actions, vec![Action::DispatchFinal("cats".into())]);

    // The finality timer was consumed by the forced final.
    assert!(session.on_tick(at(t0, 5000)).is_empty());
  }

  #[test]
  fn focus_loss_with_no_term_is_a_noop() {
    let t0 = Instant::now();
    let mut session = SearchSession::new();
    assert!(session.on_event(Event::FocusLost, t0).is_empty());
  }

  #[test]
  fn unload_while_typing_enqueues_durably() {
    let t0 = Instant::now();
    let mut session = SearchSession::new();

    session.on_event(key("cats"), t0);
    let actions = session.on_event(Event::Unload, at(t0, 100));
    assert_eq!(actions, vec![Action::EnqueueFinal("cats".into())]);
  }

  #[test]
  fn unload_when_idle_is_a_noop() {
    let t0 = Instant::now();
    let mut session = SearchSession::new();

    session.on_event(key("cats"), t0);
    session.on_tick(at(t0, 1000)); // burst already finalized
    assert!(session.on_event(Event::Unload, at(t0, 1100)).is_empty());
  }

  #[test]
  fn finality_wins_over_stale_debounce() {
    let t0 = Instant::now();
    let mut session = SearchSession::new();

    session.on_event(key("r"), t0);
    session.on_event(key("ru"), at(t0, 100));

    // Both deadlines are past by the time the driver wakes up; only the
    // final dispatches.
    let actions = session.on_tick(at(t0, 2000));
    assert_eq!(actions[0], Action::DispatchFinal("ru".into()));
    assert!(!actions.contains(&Action::DispatchIntermediate("ru".into())));
  }

  #[test]
  fn next_deadline_is_the_earliest_timer() {
    let t0 = Instant::now();
    let mut session = SearchSession::new();

    session.on_event(key("r"), t0);
    assert_eq!(session.next_deadline(), Some(at(t0, 1000)));

    session.on_event(key("ru"), at(t0, 100));
    // Debounce (t0+400) precedes finality (t0+1100).
    assert_eq!(session.next_deadline(), Some(at(t0, 400)));
  }
}
