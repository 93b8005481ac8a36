//! Catalog records: categories, genres, titles, and the ownable reviews and
//! comments attached to them.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

pub const NAME_MAX_LEN: usize = 256;
pub const SLUG_MAX_LEN: usize = 50;
pub const EARLIEST_YEAR: i32 = 1500;
pub const SCORE_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

static SLUG_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug pattern"));

fn validate_name(name: &str) -> Result<()> {
  if name.trim().is_empty() {
    return Err(Error::validation("name is required"));
  }
  if name.chars().count() > NAME_MAX_LEN {
    return Err(Error::validation(format!(
      "name must be at most {NAME_MAX_LEN} characters"
    )));
  }
  Ok(())
}

fn validate_slug(slug: &str) -> Result<()> {
  if slug.len() > SLUG_MAX_LEN {
    return Err(Error::validation(format!(
      "slug must be at most {SLUG_MAX_LEN} characters"
    )));
  }
  if !SLUG_RE.is_match(slug) {
    return Err(Error::validation(format!(
      "slug {slug:?} may contain only latin letters, digits, '-' and '_'"
    )));
  }
  Ok(())
}

fn validate_year(year: i32) -> Result<()> {
  let current = Utc::now().year();
  if !(EARLIEST_YEAR..=current).contains(&year) {
    return Err(Error::validation(format!(
      "year must be between {EARLIEST_YEAR} and {current}"
    )));
  }
  Ok(())
}

fn validate_text(text: &str) -> Result<()> {
  if text.trim().is_empty() {
    return Err(Error::validation("text is required"));
  }
  Ok(())
}

fn validate_score(score: u8) -> Result<()> {
  if !SCORE_RANGE.contains(&score) {
    return Err(Error::validation("score must be between 1 and 10"));
  }
  Ok(())
}

// ─── Categories and genres ───────────────────────────────────────────────────

/// Categories and genres share one shape: a display name and a unique slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
  pub name: String,
  pub slug: String,
}

impl Tag {
  pub fn validate(&self) -> Result<()> {
    validate_name(&self.name)?;
    validate_slug(&self.slug)
  }
}

/// Which of the two slug-keyed collections a [`Tag`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TagKind {
  Category,
  Genre,
}

// ─── Titles ──────────────────────────────────────────────────────────────────

/// A title as read back, with its category and genres expanded and the
/// average review score attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Title {
  pub id:          i64,
  pub name:        String,
  pub year:        i32,
  pub description: Option<String>,
  pub category:    Option<Tag>,
  pub genre:       Vec<Tag>,
  /// Average review score, truncated; `None` without reviews.
  pub rating:      Option<i64>,
}

/// Input for creating a title. Category and genres are referenced by slug.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTitle {
  pub name:        String,
  pub year:        i32,
  pub description: Option<String>,
  pub category:    Option<String>,
  #[serde(default)]
  pub genre:       Vec<String>,
}

impl NewTitle {
  pub fn validate(&self) -> Result<()> {
    validate_name(&self.name)?;
    validate_year(self.year)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TitlePatch {
  pub name:        Option<String>,
  pub year:        Option<i32>,
  pub description: Option<String>,
  /// Absent leaves the category alone; `null` clears it.
  #[serde(default, deserialize_with = "present")]
  pub category:    Option<Option<String>>,
  pub genre:       Option<Vec<String>>,
}

/// Marks a field that appeared in the input, even as `null`.
fn present<'de, D, T>(d: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  Option::<T>::deserialize(d).map(Some)
}

impl TitlePatch {
  pub fn validate(&self) -> Result<()> {
    if let Some(name) = &self.name {
      validate_name(name)?;
    }
    if let Some(year) = self.year {
      validate_year(year)?;
    }
    Ok(())
  }
}

/// Filters accepted when listing titles.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TitleFilter {
  /// Category slug, exact.
  pub category: Option<String>,
  /// Genre slug, exact.
  pub genre:    Option<String>,
  /// Substring of the title name.
  pub name:     Option<String>,
  pub year:     Option<i32>,
}

// ─── Reviews ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
  pub id:       i64,
  pub title_id: i64,
  /// Username of the author.
  pub author:   String,
  pub text:     String,
  pub score:    u8,
  pub pub_date: DateTime<Utc>,
}

/// Body of a review submission; the title and author come from the request.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewBody {
  pub text:  String,
  pub score: u8,
}

impl ReviewBody {
  pub fn validate(&self) -> Result<()> {
    validate_text(&self.text)?;
    validate_score(self.score)
  }
}

#[derive(Debug, Clone)]
pub struct NewReview {
  pub title_id: i64,
  pub author:   String,
  pub text:     String,
  pub score:    u8,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewPatch {
  pub text:  Option<String>,
  pub score: Option<u8>,
}

impl ReviewPatch {
  pub fn validate(&self) -> Result<()> {
    if let Some(text) = &self.text {
      validate_text(text)?;
    }
    if let Some(score) = self.score {
      validate_score(score)?;
    }
    Ok(())
  }
}

// ─── Comments ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
  pub id:        i64,
  pub review_id: i64,
  pub author:    String,
  pub text:      String,
  pub pub_date:  DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentBody {
  pub text: String,
}

impl CommentBody {
  pub fn validate(&self) -> Result<()> { validate_text(&self.text) }
}

#[derive(Debug, Clone)]
pub struct NewComment {
  pub review_id: i64,
  pub author:    String,
  pub text:      String,
}
