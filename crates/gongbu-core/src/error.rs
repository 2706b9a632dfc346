//! Error types for `gongbu-core`.
//!
//! Storage backends convert their own errors into [`Error`] so that higher
//! layers can map failure kinds to wire codes without knowing the backend.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("no snapshot asset id supplied and no document exists")]
  SnapshotRequired,

  #[error("no sentences supplied")]
  NoSentences,

  #[error("too many sentences: {0} (max 100)")]
  TooManySentences(usize),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("relational store deadline exceeded")]
  DbTimeout,

  #[error("blob store deadline exceeded")]
  StoreTimeout,

  #[error("blob store unavailable: {0}")]
  StoreUnavailable(String),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Stable machine-readable code used on the wire and in logs.
  pub fn code(&self) -> &'static str {
    match self {
      Error::SnapshotRequired => "SNAPSHOT_ASSET_ID_REQUIRED",
      Error::NoSentences => "NO_SENTENCES",
      Error::TooManySentences(_) => "TOO_MANY_SENTENCES",
      Error::NotFound(_) => "NOT_FOUND",
      Error::InvalidInput(_) => "INVALID_INPUT",
      Error::DbTimeout => "DB_TIMEOUT",
      Error::StoreTimeout => "STORE_TIMEOUT",
      Error::StoreUnavailable(_) => "STORE_UNAVAILABLE",
      Error::Storage(_) | Error::Serialization(_) => "INTERNAL",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
