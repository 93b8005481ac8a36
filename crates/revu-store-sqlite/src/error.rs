//! Error type for `revu-store-sqlite`.

use rusqlite::ffi;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown role: {0:?}")]
  UnknownRole(String),

  /// A UNIQUE constraint rejected the write.
  #[error("conflict: {0}")]
  Conflict(String),

  /// A referenced category or genre slug does not exist.
  #[error("validation error: {0}")]
  Validation(String),

  #[error("not found: {0}")]
  NotFound(String),
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(e: tokio_rusqlite::Error) -> Self {
    if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
      failure,
      msg,
    )) = &e
      && matches!(
        failure.extended_code,
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
      )
    {
      return Error::Conflict(
        msg.clone().unwrap_or_else(|| "uniqueness violated".to_owned()),
      );
    }
    Error::Database(e)
  }
}

impl From<Error> for revu_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Conflict(m) => revu_core::Error::Conflict(m),
      Error::Validation(m) => revu_core::Error::Validation(m),
      Error::NotFound(m) => revu_core::Error::NotFound(m),
      other => revu_core::Error::Store(Box::new(other)),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
