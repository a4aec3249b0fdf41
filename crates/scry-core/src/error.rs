//! Error types for `scry-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A final search was submitted with an empty or whitespace-only term.
  #[error("search term must not be blank")]
  BlankTerm,

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
