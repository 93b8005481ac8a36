//! Outbound mail transports for confirmation codes.

use std::{
  fs,
  path::{Path, PathBuf},
};

use chrono::Utc;
use revu_core::identity::{BoxError, Notifier};
use uuid::Uuid;

use crate::error::Result;

/// Writes each message to the log instead of delivering it.
pub struct LogNotifier {
  from: String,
}

impl LogNotifier {
  pub fn new(from: impl Into<String>) -> Self { Self { from: from.into() } }
}

impl Notifier for LogNotifier {
  fn send(
    &self,
    recipient: &str,
    subject: &str,
    body: &str,
  ) -> Result<(), BoxError> {
    tracing::info!(from = %self.from, to = recipient, subject, body, "outbound mail");
    Ok(())
  }
}

/// Drops one `.eml` file per message into a directory.
pub struct FileNotifier {
  from: String,
  dir:  PathBuf,
}

impl FileNotifier {
  /// Creates `dir` if it does not exist yet.
  pub fn new(from: impl Into<String>, dir: impl Into<PathBuf>) -> Result<Self> {
    let dir = dir.into();
    fs::create_dir_all(&dir)?;
    Ok(Self { from: from.into(), dir })
  }

  pub fn dir(&self) -> &Path { &self.dir }

  fn write(&self, recipient: &str, subject: &str, body: &str) -> Result<PathBuf> {
    let now = Utc::now();
    let name = format!("{}-{}.eml", now.format("%Y%m%d-%H%M%S"), Uuid::new_v4());
    let path = self.dir.join(name);
    let message = format!(
      "From: {}\r\nTo: {recipient}\r\nSubject: {subject}\r\nDate: {}\r\n\
       Content-Type: text/plain; charset=utf-8\r\n\r\n{body}\r\n",
      self.from,
      now.to_rfc2822(),
    );
    fs::write(&path, message)?;
    Ok(path)
  }
}

impl Notifier for FileNotifier {
  fn send(
    &self,
    recipient: &str,
    subject: &str,
    body: &str,
  ) -> Result<(), BoxError> {
    let path = self.write(recipient, subject, body)?;
    tracing::debug!(path = %path.display(), to = recipient, "mail written");
    Ok(())
  }
}
