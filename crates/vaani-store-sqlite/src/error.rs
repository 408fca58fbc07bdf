//! Error type for `vaani-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain failure detected inside the store (missing row, lost race,
  /// policy rejection). Passed through to callers unchanged.
  #[error(transparent)]
  Core(#[from] vaani_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("cannot decode column value: {0}")]
  Decode(String),
}

impl From<Error> for vaani_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(core) => core,
      other => vaani_core::Error::Store(Box::new(other)),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
