//! Authorization policy engine.
//!
//! Every decision is a pure function of the [`Subject`], the [`Action`] and,
//! for object-scoped requests, the [`Resource`] being touched. Endpoints pick
//! their policies from a fixed table ([`Endpoint::policies`]); all of them
//! must allow.
//!
//! A request without a resource is judged by the collection-level rule only.
//! A request on a resource is judged by the collection-level rule *and* the
//! object-level rule, since acting on an object is also acting on its
//! collection.

use serde::Serialize;

use crate::{Error, Result, subject::Subject};

// ─── Inputs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Action {
  Read,
  Create,
  Update,
  Delete,
}

impl Action {
  /// Reads are the only safe action.
  pub fn is_safe(self) -> bool { matches!(self, Self::Read) }
}

/// The ownership facts of an object-scoped request.
#[derive(Debug, Clone, Copy)]
pub struct Resource<'a> {
  /// Username of the author (reviews, comments) or owner.
  pub owner: &'a str,
}

impl<'a> Resource<'a> {
  pub fn owned_by(owner: &'a str) -> Self { Self { owner } }
}

// ─── Outputs ─────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DenyReason {
  NotAuthenticated,
  InsufficientRole,
  NotOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
  Allow,
  Deny(DenyReason),
}

impl Decision {
  pub fn is_allowed(self) -> bool { matches!(self, Self::Allow) }

  fn from_check(ok: bool, reason: DenyReason) -> Self {
    if ok { Self::Allow } else { Self::Deny(reason) }
  }

  fn and_then(self, next: impl FnOnce() -> Decision) -> Self {
    match self {
      Self::Allow => next(),
      deny => deny,
    }
  }
}

// ─── Policies ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Policy {
  /// Anyone reads; only authenticated admins mutate.
  AdminOrReadOnly,
  /// Anyone reads; authenticated users create; authors, moderators, admins
  /// and superusers mutate existing objects.
  AuthorOrReadOnly,
  /// Admins and superusers only, reads included.
  AdminOrSuperUser,
  /// Anyone reads; only the owner mutates an object.
  OwnerOrReadOnly,
  /// Anyone reads; only superusers mutate an object.
  SuperUserOrReadOnly,
  /// Any authenticated subject, regardless of role.
  Authenticated,
}

impl Policy {
  fn collection(self, subject: &Subject, action: Action) -> Decision {
    use DenyReason::*;
    match self {
      Self::AdminOrReadOnly => {
        if action.is_safe() {
          Decision::Allow
        } else if !subject.is_authenticated() {
          Decision::Deny(NotAuthenticated)
        } else {
          Decision::from_check(subject.is_admin(), InsufficientRole)
        }
      }
      Self::AuthorOrReadOnly => Decision::from_check(
        action.is_safe() || subject.is_authenticated(),
        NotAuthenticated,
      ),
      Self::AdminOrSuperUser => admin_or_superuser(subject),
      Self::OwnerOrReadOnly | Self::SuperUserOrReadOnly => Decision::Allow,
      Self::Authenticated => {
        Decision::from_check(subject.is_authenticated(), NotAuthenticated)
      }
    }
  }

  fn object(
    self,
    subject: &Subject,
    action: Action,
    resource: &Resource<'_>,
  ) -> Decision {
    use DenyReason::*;
    match self {
      Self::AuthorOrReadOnly => Decision::from_check(
        action.is_safe()
          || subject.is(resource.owner)
          || subject.is_admin()
          || subject.is_moderator()
          || subject.is_superuser(),
        NotOwner,
      ),
      Self::AdminOrSuperUser => admin_or_superuser(subject),
      Self::OwnerOrReadOnly => {
        Decision::from_check(action.is_safe() || subject.is(resource.owner), NotOwner)
      }
      Self::SuperUserOrReadOnly => Decision::from_check(
        action.is_safe() || subject.is_superuser(),
        InsufficientRole,
      ),
      Self::AdminOrReadOnly | Self::Authenticated => Decision::Allow,
    }
  }
}

fn admin_or_superuser(subject: &Subject) -> Decision {
  if !subject.is_authenticated() {
    Decision::Deny(DenyReason::NotAuthenticated)
  } else {
    Decision::from_check(
      subject.is_admin() || subject.is_superuser(),
      DenyReason::InsufficientRole,
    )
  }
}

/// Decide a single policy.
pub fn decide(
  subject: &Subject,
  action: Action,
  resource: Option<&Resource<'_>>,
  policy: Policy,
) -> Decision {
  policy
    .collection(subject, action)
    .and_then(|| match resource {
      Some(r) => policy.object(subject, action, r),
      None => Decision::Allow,
    })
}

// ─── Endpoint bindings ───────────────────────────────────────────────────────

/// Every policy-gated surface of the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Endpoint {
  Users,
  OwnProfile,
  Categories,
  Genres,
  Titles,
  Reviews,
  Comments,
}

impl Endpoint {
  pub fn policies(self) -> &'static [Policy] {
    match self {
      Self::Users => &[Policy::Authenticated, Policy::AdminOrSuperUser],
      Self::OwnProfile => &[Policy::Authenticated],
      Self::Categories | Self::Genres | Self::Titles => {
        &[Policy::AdminOrReadOnly]
      }
      Self::Reviews | Self::Comments => &[Policy::AuthorOrReadOnly],
    }
  }
}

/// Check every policy bound to `endpoint`; the first denial wins.
pub fn authorize(
  endpoint: Endpoint,
  subject: &Subject,
  action: Action,
  resource: Option<&Resource<'_>>,
) -> Result<()> {
  for &policy in endpoint.policies() {
    if let Decision::Deny(reason) = decide(subject, action, resource, policy) {
      tracing::debug!(
        %endpoint, %policy, %action, %reason,
        subject = subject.username().unwrap_or("<anonymous>"),
        "request denied"
      );
      return Err(Error::Permission(reason));
    }
  }
  Ok(())
}
