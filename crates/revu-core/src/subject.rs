//! The caller identity resolved for a single request.

use serde::{Deserialize, Serialize};

use crate::account::Role;

/// Who is making a request. Passed explicitly into every core call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Subject {
  #[default]
  Anonymous,
  Authenticated {
    username: String,
    /// The account's role at resolution time, not at token issuance.
    role:     Role,
  },
}

impl Subject {
  pub fn authenticated(username: impl Into<String>, role: Role) -> Self {
    Self::Authenticated { username: username.into(), role }
  }

  pub fn is_authenticated(&self) -> bool {
    matches!(self, Self::Authenticated { .. })
  }

  pub fn username(&self) -> Option<&str> {
    match self {
      Self::Authenticated { username, .. } => Some(username),
      Self::Anonymous => None,
    }
  }

  pub fn role(&self) -> Option<Role> {
    match self {
      Self::Authenticated { role, .. } => Some(*role),
      Self::Anonymous => None,
    }
  }

  pub fn is_admin(&self) -> bool { self.role().is_some_and(Role::is_admin) }

  pub fn is_moderator(&self) -> bool {
    self.role().is_some_and(Role::is_moderator)
  }

  pub fn is_superuser(&self) -> bool {
    self.role().is_some_and(Role::is_superuser)
  }

  /// Whether this subject is the account named `username`.
  pub fn is(&self, username: &str) -> bool { self.username() == Some(username) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn anonymous_satisfies_no_predicate() {
    let s = Subject::Anonymous;
    assert!(!s.is_authenticated());
    assert!(!s.is_admin());
    assert!(!s.is_moderator());
    assert!(!s.is_superuser());
    assert!(!s.is(""));
  }

  #[test]
  fn predicates_follow_role() {
    let s = Subject::authenticated("mod", Role::Moderator);
    assert!(s.is_authenticated());
    assert!(s.is_moderator());
    assert!(!s.is_admin());
    assert!(s.is("mod"));
    assert!(!s.is("other"));
  }
}
