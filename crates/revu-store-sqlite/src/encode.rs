//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, UUIDs as hyphenated lowercase
//! strings and roles by their lowercase name.

use chrono::{DateTime, Utc};
use revu_core::{
  account::{Account, Role},
  catalog::{Comment, Review},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Role ─────────────────────────────────────────────────────────────────────

pub fn encode_role(role: Role) -> &'static str { role.into() }

pub fn decode_role(s: &str) -> Result<Role> {
  s.parse().map_err(|_| Error::UnknownRole(s.to_owned()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const ACCOUNT_COLUMNS: &str = "account_id, username, email, role, bio, \
                                   first_name, last_name, confirmation_digest, \
                                   created_at";

/// Raw strings read directly from an `accounts` row.
pub struct RawAccount {
  pub account_id:          String,
  pub username:            String,
  pub email:               String,
  pub role:                String,
  pub bio:                 String,
  pub first_name:          String,
  pub last_name:           String,
  pub confirmation_digest: Option<String>,
  pub created_at:          String,
}

impl RawAccount {
  /// Read a row selected with [`ACCOUNT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      account_id:          row.get(0)?,
      username:            row.get(1)?,
      email:               row.get(2)?,
      role:                row.get(3)?,
      bio:                 row.get(4)?,
      first_name:          row.get(5)?,
      last_name:           row.get(6)?,
      confirmation_digest: row.get(7)?,
      created_at:          row.get(8)?,
    })
  }

  pub fn into_account(self) -> Result<Account> {
    Ok(Account {
      account_id:          decode_uuid(&self.account_id)?,
      username:            self.username,
      email:               self.email,
      role:                decode_role(&self.role)?,
      bio:                 self.bio,
      first_name:          self.first_name,
      last_name:           self.last_name,
      confirmation_digest: self.confirmation_digest,
      created_at:          decode_dt(&self.created_at)?,
    })
  }
}

pub const REVIEW_SELECT: &str = "
  SELECT r.id, r.title_id, a.username, r.text, r.score, r.pub_date
  FROM reviews r
  JOIN accounts a ON a.account_id = r.author_id";

/// A `reviews` row joined with its author's username.
pub struct RawReview {
  pub id:       i64,
  pub title_id: i64,
  pub author:   String,
  pub text:     String,
  pub score:    u8,
  pub pub_date: String,
}

impl RawReview {
  /// Read a row selected with [`REVIEW_SELECT`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:       row.get(0)?,
      title_id: row.get(1)?,
      author:   row.get(2)?,
      text:     row.get(3)?,
      score:    row.get(4)?,
      pub_date: row.get(5)?,
    })
  }

  pub fn into_review(self) -> Result<Review> {
    Ok(Review {
      id:       self.id,
      title_id: self.title_id,
      author:   self.author,
      text:     self.text,
      score:    self.score,
      pub_date: decode_dt(&self.pub_date)?,
    })
  }
}

pub const COMMENT_SELECT: &str = "
  SELECT c.id, c.review_id, a.username, c.text, c.pub_date
  FROM comments c
  JOIN accounts a ON a.account_id = c.author_id";

/// A `comments` row joined with its author's username.
pub struct RawComment {
  pub id:        i64,
  pub review_id: i64,
  pub author:    String,
  pub text:      String,
  pub pub_date:  String,
}

impl RawComment {
  /// Read a row selected with [`COMMENT_SELECT`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:        row.get(0)?,
      review_id: row.get(1)?,
      author:    row.get(2)?,
      text:      row.get(3)?,
      pub_date:  row.get(4)?,
    })
  }

  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      id:        self.id,
      review_id: self.review_id,
      author:    self.author,
      text:      self.text,
      pub_date:  decode_dt(&self.pub_date)?,
    })
  }
}
