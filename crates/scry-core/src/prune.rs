//! The prune-pass strategy: deciding which earlier search terms look like
//! typing intermediates of a just-finalized term.
//!
//! The heuristic is deliberately pluggable. The default half-prefix rule is
//! known to both under-prune (multi-word terms whose meaningful prefix is
//! shorter than half the string) and over-prune (unrelated terms sharing a
//! long prefix); replacing it must not touch the recorder's transactional
//! contract, so it lives behind this trait.

/// Decides whether an existing search term is superseded by a finalized one.
pub trait PruneStrategy: Send + Sync {
  /// `true` if `candidate` should be pruned once `finalized` is recorded.
  ///
  /// Implementations must never return `true` when `candidate == finalized`.
  fn supersedes(&self, finalized: &str, candidate: &str) -> bool;
}

/// The default rule: a candidate is pruned when, case-insensitively, it
/// starts with the first half (by character count, integer-divided) of the
/// finalized term and is not the finalized term itself.
///
/// Finalizing `"ruby"` prunes `"ru"` and `"rub"`; finalizing
/// `"ruby programming"` prunes anything starting with `"ruby pro"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HalfPrefixPrune;

impl PruneStrategy for HalfPrefixPrune {
  fn supersedes(&self, finalized: &str, candidate: &str) -> bool {
    if candidate == finalized {
      return false;
    }
    let half = finalized.chars().count() / 2;
    let prefix: String = finalized.chars().take(half).collect();
    candidate.to_lowercase().starts_with(&prefix.to_lowercase())
  }
}
