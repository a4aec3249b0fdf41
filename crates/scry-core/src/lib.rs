//! Core types and trait definitions for the scry search-analytics ledger.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod error;
pub mod ledger;
pub mod prune;
pub mod types;

pub use error::{Error, Result};
