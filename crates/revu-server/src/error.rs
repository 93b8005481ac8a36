//! Error type for the server's notifier and token plumbing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("JWT error: {0}")]
  Jwt(#[from] jsonwebtoken::errors::Error),

  #[error("system clock is before the Unix epoch")]
  Clock,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
