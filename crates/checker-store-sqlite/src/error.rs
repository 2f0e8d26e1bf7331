//! Error type for `checker-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] checker_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A column held a value that does not decode into its domain type.
  #[error("decode error: {0}")]
  Decode(String),

  #[error("pool not found: {0}")]
  PoolNotFound(i64),

  #[error("application not found: {0}")]
  ApplicationNotFound(i64),

  /// An answer referenced a question index the pool's rubric does not have.
  #[error("no question at index {question_index} in the rubric of pool {pool_id}")]
  StaleQuestionIndex { pool_id: i64, question_index: u32 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
