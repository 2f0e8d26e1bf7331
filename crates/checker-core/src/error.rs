//! Error types for `checker-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A pool or application is missing upstream or locally.
  #[error("not found: {0}")]
  NotFound(String),

  /// An operation that must produce a value produced none.
  #[error("unexpected null: {0}")]
  IsNull(String),

  #[error("validation failed: {0}")]
  Validation(String),

  /// Network, HTTP status or timeout failure talking to the indexer or the
  /// reasoning service.
  #[error("transport failure: {0}")]
  Transport(String),

  /// The reasoning service answered, but not with the expected JSON shape.
  #[error("parse failure: {0}")]
  Parse(String),

  /// A background task ended without producing a result.
  #[error("aborted: {0}")]
  Aborted(String),

  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("unknown answer code: {0}")]
  UnknownAnswerCode(i64),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Wrap a storage backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
