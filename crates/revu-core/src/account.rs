//! Accounts: the persistent identity records behind every authenticated
//! subject.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

pub const USERNAME_MAX_LEN: usize = 150;
pub const EMAIL_MAX_LEN: usize = 254;
pub const NAME_MAX_LEN: usize = 150;

/// Reserved because `/users/me/` addresses the caller's own profile.
pub const RESERVED_USERNAME: &str = "me";

static USERNAME_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").expect("email pattern")
});

// ─── Role ────────────────────────────────────────────────────────────────────

/// The role stored on an account. Anonymous callers have no role at all; see
/// [`crate::subject::Subject`].
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  #[default]
  User,
  Moderator,
  Admin,
  Superuser,
}

impl Role {
  pub fn is_admin(self) -> bool { matches!(self, Self::Admin) }

  pub fn is_moderator(self) -> bool { matches!(self, Self::Moderator) }

  pub fn is_superuser(self) -> bool { matches!(self, Self::Superuser) }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Check a username against the allowed pattern, the length limit and the
/// reserved name. The reserved-name check ignores case.
pub fn validate_username(username: &str) -> Result<()> {
  if username.is_empty() {
    return Err(Error::validation("username is required"));
  }
  if username.chars().count() > USERNAME_MAX_LEN {
    return Err(Error::validation(format!(
      "username must be at most {USERNAME_MAX_LEN} characters"
    )));
  }
  if username.eq_ignore_ascii_case(RESERVED_USERNAME) {
    return Err(Error::validation("username \"me\" is reserved"));
  }
  if !USERNAME_RE.is_match(username) {
    return Err(Error::validation(format!(
      "username {username:?} may contain only letters, digits and @/./+/-/_"
    )));
  }
  Ok(())
}

pub fn validate_email(email: &str) -> Result<()> {
  if email.is_empty() {
    return Err(Error::validation("email is required"));
  }
  if email.chars().count() > EMAIL_MAX_LEN {
    return Err(Error::validation(format!(
      "email must be at most {EMAIL_MAX_LEN} characters"
    )));
  }
  if !EMAIL_RE.is_match(email) {
    return Err(Error::validation(format!("{email:?} is not a valid email")));
  }
  Ok(())
}

fn validate_name(field: &str, value: &str) -> Result<()> {
  if value.chars().count() > NAME_MAX_LEN {
    return Err(Error::validation(format!(
      "{field} must be at most {NAME_MAX_LEN} characters"
    )));
  }
  Ok(())
}

// ─── Account ─────────────────────────────────────────────────────────────────

/// A stored identity record.
///
/// The confirmation code is never kept in clear; only its SHA-256 digest is
/// stored and compared.
#[derive(Debug, Clone)]
pub struct Account {
  pub account_id:          Uuid,
  pub username:            String,
  pub email:               String,
  pub role:                Role,
  pub bio:                 String,
  pub first_name:          String,
  pub last_name:           String,
  pub confirmation_digest: Option<String>,
  pub created_at:          DateTime<Utc>,
}

impl Account {
  /// A fresh `user`-role account with empty profile fields. Callers validate
  /// `username` and `email` first.
  pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
    Self {
      account_id:          Uuid::new_v4(),
      username:            username.into(),
      email:               email.into(),
      role:                Role::default(),
      bio:                 String::new(),
      first_name:          String::new(),
      last_name:           String::new(),
      confirmation_digest: None,
      created_at:          Utc::now(),
    }
  }

  /// Apply `patch`, validating every field it touches. `role` is applied as
  /// given.
  pub fn apply(&mut self, patch: AccountPatch) -> Result<()> {
    patch.validate()?;

    let AccountPatch { username, email, first_name, last_name, bio, role } =
      patch;
    if let Some(v) = username { self.username = v; }
    if let Some(v) = email { self.email = v; }
    if let Some(v) = first_name { self.first_name = v; }
    if let Some(v) = last_name { self.last_name = v; }
    if let Some(v) = bio { self.bio = v; }
    if let Some(v) = role { self.role = v; }
    Ok(())
  }

  pub fn profile(&self) -> Profile { Profile::from(self) }
}

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Full account creation input, as accepted from administrators.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccount {
  pub username:   String,
  pub email:      String,
  #[serde(default)]
  pub role:       Role,
  #[serde(default)]
  pub bio:        String,
  #[serde(default)]
  pub first_name: String,
  #[serde(default)]
  pub last_name:  String,
}

impl NewAccount {
  /// Validate and turn into a storable [`Account`] with no confirmation code.
  pub fn into_account(self) -> Result<Account> {
    validate_username(&self.username)?;
    validate_email(&self.email)?;
    validate_name("first_name", &self.first_name)?;
    validate_name("last_name", &self.last_name)?;

    let mut account = Account::new(self.username, self.email);
    account.role = self.role;
    account.bio = self.bio;
    account.first_name = self.first_name;
    account.last_name = self.last_name;
    Ok(account)
  }
}

/// Partial update of an account. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountPatch {
  pub username:   Option<String>,
  pub email:      Option<String>,
  pub first_name: Option<String>,
  pub last_name:  Option<String>,
  pub bio:        Option<String>,
  pub role:       Option<Role>,
}

impl AccountPatch {
  /// Check every field the patch touches.
  pub fn validate(&self) -> Result<()> {
    if let Some(username) = &self.username {
      validate_username(username)?;
    }
    if let Some(email) = &self.email {
      validate_email(email)?;
    }
    if let Some(first_name) = &self.first_name {
      validate_name("first_name", first_name)?;
    }
    if let Some(last_name) = &self.last_name {
      validate_name("last_name", last_name)?;
    }
    Ok(())
  }
}

// ─── Public view ─────────────────────────────────────────────────────────────

/// The publicly visible fields of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub username:   String,
  pub email:      String,
  pub first_name: String,
  pub last_name:  String,
  pub bio:        String,
  pub role:       Role,
}

impl From<&Account> for Profile {
  fn from(a: &Account) -> Self {
    Self {
      username:   a.username.clone(),
      email:      a.email.clone(),
      first_name: a.first_name.clone(),
      last_name:  a.last_name.clone(),
      bio:        a.bio.clone(),
      role:       a.role,
    }
  }
}
