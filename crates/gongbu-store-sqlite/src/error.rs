//! Error type for `gongbu-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] gongbu_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A stored column could not be decoded into its domain type.
  #[error("decode error: {0}")]
  Decode(String),
}

impl Error {
  /// Classify an error returned from inside a `call` closure.
  ///
  /// Domain failures raised in the closure travel as
  /// `tokio_rusqlite::Error::Other` boxing a [`gongbu_core::Error`]; unwrap
  /// them so callers see the domain kind.
  pub(crate) fn from_call(e: tokio_rusqlite::Error) -> Self {
    match e {
      tokio_rusqlite::Error::Other(inner) => {
        match inner.downcast::<gongbu_core::Error>() {
          Ok(core) => Error::Core(*core),
          Err(inner) => Error::Database(tokio_rusqlite::Error::Other(inner)),
        }
      }
      other => Error::Database(other),
    }
  }
}

impl From<Error> for gongbu_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(core) => core,
      other => gongbu_core::Error::Storage(Box::new(other)),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
