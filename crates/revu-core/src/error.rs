//! Error types for `revu-core`.

use thiserror::Error;

use crate::policy::DenyReason;

#[derive(Debug, Error)]
pub enum Error {
  /// A field value is malformed or disallowed.
  #[error("validation error: {0}")]
  Validation(String),

  /// A uniqueness rule was violated (username, email, slug, one review per
  /// title and author).
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("invalid confirmation code")]
  InvalidCredential,

  #[error("permission denied: {0}")]
  Permission(DenyReason),

  #[error("notification failed: {0}")]
  Notification(String),

  #[error("token error: {0}")]
  Token(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Stable machine-readable name for the error, used in response bodies.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Validation(_) => "validation",
      Self::Conflict(_) => "conflict",
      Self::NotFound(_) => "not_found",
      Self::InvalidCredential => "invalid_credential",
      Self::Permission(_) => "permission_denied",
      Self::Notification(_) => "notification",
      Self::Token(_) => "token",
      Self::Store(_) => "store",
    }
  }

  /// Convert a backend error; used as `.map_err(Error::from_store)`.
  pub fn from_store<E: Into<Error>>(e: E) -> Self { e.into() }

  pub(crate) fn validation(msg: impl Into<String>) -> Self {
    Self::Validation(msg.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
