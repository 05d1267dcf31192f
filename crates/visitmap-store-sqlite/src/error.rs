//! Error type for `visitmap-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored millisecond timestamp is outside chrono's range.
  #[error("timestamp out of range: {0}")]
  TimestampRange(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
