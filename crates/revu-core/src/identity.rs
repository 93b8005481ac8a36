//! Identity and credential management: signup, confirmation codes, access
//! tokens and subject resolution.
//!
//! Signup is a get-or-create on the exact `(username, email)` pair. Each call
//! rotates the confirmation code and mails it out; the code stays redeemable
//! until the next signup call for the same pair replaces it.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
  Error, Result,
  account::{Account, AccountPatch, Role, validate_email, validate_username},
  policy::DenyReason,
  store::AccountStore,
  subject::Subject,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub const CONFIRMATION_SUBJECT: &str = "Your confirmation code";

// ─── Collaborators ───────────────────────────────────────────────────────────

/// Outbound message transport. Delivery is synchronous and never retried.
pub trait Notifier: Send + Sync {
  fn send(
    &self,
    recipient: &str,
    subject: &str,
    body: &str,
  ) -> std::result::Result<(), BoxError>;
}

/// What an access token asserts about its bearer. Resolution goes by
/// `account_id`; usernames can change hands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
  pub account_id: Uuid,
  pub username:   String,
  pub role:       Role,
}

/// Mints and verifies opaque bearer tokens.
pub trait TokenCodec: Send + Sync {
  fn mint(
    &self,
    claims: &Claims,
    ttl: Duration,
  ) -> std::result::Result<String, BoxError>;

  /// `None` for malformed, forged or expired tokens.
  fn verify(&self, token: &str) -> Option<Claims>;
}

// ─── Wire shapes ─────────────────────────────────────────────────────────────

/// Signup input, echoed back on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signup {
  pub username: String,
  pub email:    String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
  pub username:          String,
  pub confirmation_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
  pub token: String,
}

// ─── Codes ───────────────────────────────────────────────────────────────────

fn new_confirmation_code() -> String { Uuid::new_v4().to_string() }

/// Hex SHA-256 of a confirmation code, as stored on the account.
pub fn digest_code(code: &str) -> String {
  hex::encode(Sha256::digest(code.as_bytes()))
}

// ─── Manager ─────────────────────────────────────────────────────────────────

pub struct IdentityManager<S> {
  store:     Arc<S>,
  tokens:    Arc<dyn TokenCodec>,
  notifier:  Arc<dyn Notifier>,
  token_ttl: Duration,
}

impl<S: AccountStore> IdentityManager<S> {
  pub fn new(
    store: Arc<S>,
    tokens: Arc<dyn TokenCodec>,
    notifier: Arc<dyn Notifier>,
    token_ttl: Duration,
  ) -> Self {
    Self { store, tokens, notifier, token_ttl }
  }

  /// Register `(username, email)` or re-issue its confirmation code.
  ///
  /// If the notifier fails the account row has already been written with the
  /// new code; the caller still sees the signup as failed.
  pub async fn signup(&self, request: Signup) -> Result<Signup> {
    let Signup { username, email } = request;
    validate_username(&username)?;
    validate_email(&email)?;

    let by_email = self
      .store
      .get_account_by_email(&email)
      .await
      .map_err(Error::from_store)?;
    if by_email.as_ref().is_some_and(|a| a.username != username) {
      return Err(Error::Conflict("email mismatch".into()));
    }

    let by_username = self
      .store
      .get_account(&username)
      .await
      .map_err(Error::from_store)?;
    if by_username.as_ref().is_some_and(|a| a.email != email) {
      return Err(Error::Conflict("username mismatch".into()));
    }

    let code = new_confirmation_code();
    let digest = digest_code(&code);
    let created = by_username.is_none();
    let account = match by_username {
      Some(account) => {
        let stored = self
          .store
          .set_confirmation_digest(account.account_id, digest)
          .await
          .map_err(Error::from_store)?;
        if !stored {
          return Err(Error::NotFound(format!("account {username:?}")));
        }
        account
      }
      None => {
        let mut account = Account::new(username, email);
        account.confirmation_digest = Some(digest);
        self
          .store
          .upsert_account(account)
          .await
          .map_err(Error::from_store)?
      }
    };

    let body = format!(
      "Dear {}! Your confirmation code: {code}",
      account.username
    );
    if let Err(e) = self.notifier.send(&account.email, CONFIRMATION_SUBJECT, &body)
    {
      tracing::warn!(username = %account.username, error = %e, "confirmation code not delivered");
      return Err(Error::Notification(e.to_string()));
    }

    tracing::info!(username = %account.username, created, "confirmation code issued");
    Ok(Signup { username: account.username, email: account.email })
  }

  /// Exchange a confirmation code for an access token. The code is not
  /// consumed.
  pub async fn issue_token(&self, request: TokenRequest) -> Result<AccessToken> {
    let account = self
      .store
      .get_account(&request.username)
      .await
      .map_err(Error::from_store)?
      .ok_or_else(|| {
        Error::NotFound(format!("account {:?}", request.username))
      })?;

    let submitted = digest_code(&request.confirmation_code);
    if account.confirmation_digest.as_deref() != Some(submitted.as_str()) {
      tracing::warn!(username = %account.username, "confirmation code rejected");
      return Err(Error::InvalidCredential);
    }

    let claims = Claims {
      account_id: account.account_id,
      username:   account.username,
      role:       account.role,
    };
    let token = self
      .tokens
      .mint(&claims, self.token_ttl)
      .map_err(|e| Error::Token(e.to_string()))?;

    tracing::info!(username = %claims.username, "access token issued");
    Ok(AccessToken { token })
  }

  /// Turn an optional bearer token into a [`Subject`]. Anything that does
  /// not lead to an existing account resolves to [`Subject::Anonymous`].
  pub async fn resolve_subject(&self, token: Option<&str>) -> Result<Subject> {
    let Some(token) = token else {
      return Ok(Subject::Anonymous);
    };
    let Some(claims) = self.tokens.verify(token) else {
      tracing::debug!("unverifiable bearer token treated as anonymous");
      return Ok(Subject::Anonymous);
    };

    let account = self
      .store
      .get_account_by_id(claims.account_id)
      .await
      .map_err(Error::from_store)?;
    Ok(match account {
      Some(a) => Subject::authenticated(a.username, a.role),
      None => Subject::Anonymous,
    })
  }

  /// The account behind an authenticated subject.
  pub async fn current_account(&self, subject: &Subject) -> Result<Account> {
    let username = subject
      .username()
      .ok_or(Error::Permission(DenyReason::NotAuthenticated))?;
    self
      .store
      .get_account(username)
      .await
      .map_err(Error::from_store)?
      .ok_or_else(|| Error::NotFound(format!("account {username:?}")))
  }

  /// Apply `patch` to the subject's own account. Any role in the patch is
  /// dropped and the write leaves the stored role column alone, so a
  /// concurrent role change is never undone from here.
  pub async fn update_own_profile(
    &self,
    subject: &Subject,
    mut patch: AccountPatch,
  ) -> Result<Account> {
    patch.role = None;
    patch.validate()?;
    let account = self.current_account(subject).await?;
    self
      .store
      .update_account(account.account_id, patch)
      .await
      .map_err(Error::from_store)?
      .ok_or_else(|| Error::NotFound(format!("account {:?}", account.username)))
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;
  use crate::store::Store;

  // ── Fakes ───────────────────────────────────────────────────────────────

  type Hook = Box<dyn FnOnce(&mut Vec<Account>) + Send>;

  #[derive(Default)]
  struct MemoryStore {
    accounts:      Mutex<Vec<Account>>,
    /// Runs inside the next `update_account`, before the patch lands.
    before_update: Mutex<Option<Hook>>,
  }

  fn ensure_unique(accounts: &[Account], candidate: &Account) -> Result<()> {
    let clash = accounts.iter().any(|a| {
      a.account_id != candidate.account_id
        && (a.username == candidate.username || a.email == candidate.email)
    });
    if clash {
      return Err(Error::Conflict("duplicate username or email".into()));
    }
    Ok(())
  }

  impl Store for MemoryStore {
    type Error = Error;
  }

  impl AccountStore for MemoryStore {
    async fn get_account(&self, username: &str) -> Result<Option<Account>> {
      let accounts = self.accounts.lock().unwrap();
      Ok(accounts.iter().find(|a| a.username == username).cloned())
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
      let accounts = self.accounts.lock().unwrap();
      Ok(accounts.iter().find(|a| a.email == email).cloned())
    }

    async fn get_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>> {
      let accounts = self.accounts.lock().unwrap();
      Ok(accounts.iter().find(|a| a.account_id == account_id).cloned())
    }

    async fn upsert_account(&self, account: Account) -> Result<Account> {
      let mut accounts = self.accounts.lock().unwrap();
      ensure_unique(&accounts, &account)?;
      accounts.retain(|a| a.account_id != account.account_id);
      accounts.push(account.clone());
      Ok(account)
    }

    async fn update_account(
      &self,
      account_id: Uuid,
      patch: AccountPatch,
    ) -> Result<Option<Account>> {
      let mut accounts = self.accounts.lock().unwrap();
      if let Some(hook) = self.before_update.lock().unwrap().take() {
        hook(&mut accounts);
      }
      let Some(idx) = accounts.iter().position(|a| a.account_id == account_id)
      else {
        return Ok(None);
      };
      let mut updated = accounts[idx].clone();
      updated.apply(patch)?;
      ensure_unique(&accounts, &updated)?;
      accounts[idx] = updated.clone();
      Ok(Some(updated))
    }

    async fn set_confirmation_digest(
      &self,
      account_id: Uuid,
      digest: String,
    ) -> Result<bool> {
      let mut accounts = self.accounts.lock().unwrap();
      match accounts.iter_mut().find(|a| a.account_id == account_id) {
        Some(a) => {
          a.confirmation_digest = Some(digest);
          Ok(true)
        }
        None => Ok(false),
      }
    }

    async fn list_accounts(&self, _: Option<String>) -> Result<Vec<Account>> {
      Ok(self.accounts.lock().unwrap().clone())
    }

    async fn delete_account(&self, username: &str) -> Result<bool> {
      let mut accounts = self.accounts.lock().unwrap();
      let before = accounts.len();
      accounts.retain(|a| a.username != username);
      Ok(accounts.len() != before)
    }
  }

  #[derive(Default)]
  struct Outbox {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
  }

  impl Outbox {
    fn last_code(&self) -> String {
      let sent = self.sent.lock().unwrap();
      let (_, body) = sent.last().expect("a message was sent");
      body.rsplit(' ').next().unwrap().to_owned()
    }
  }

  impl Notifier for Outbox {
    fn send(
      &self,
      recipient: &str,
      _subject: &str,
      body: &str,
    ) -> std::result::Result<(), BoxError> {
      if self.fail {
        return Err("smtp unreachable".into());
      }
      self.sent.lock().unwrap().push((recipient.into(), body.into()));
      Ok(())
    }
  }

  /// Tokens are `account_id|username|role`; anything else is rejected.
  struct PlainCodec;

  impl TokenCodec for PlainCodec {
    fn mint(&self, c: &Claims, _: Duration) -> std::result::Result<String, BoxError> {
      Ok(format!("{}|{}|{}", c.account_id, c.username, c.role))
    }

    fn verify(&self, token: &str) -> Option<Claims> {
      let mut parts = token.split('|');
      let account_id = parts.next()?.parse().ok()?;
      let username = parts.next()?.to_owned();
      let role = parts.next()?.parse().ok()?;
      Some(Claims { account_id, username, role })
    }
  }

  struct Harness {
    store:    Arc<MemoryStore>,
    outbox:   Arc<Outbox>,
    identity: IdentityManager<MemoryStore>,
  }

  fn harness_with(outbox: Outbox) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let outbox = Arc::new(outbox);
    let identity = IdentityManager::new(
      store.clone(),
      Arc::new(PlainCodec),
      outbox.clone(),
      Duration::from_secs(60),
    );
    Harness { store, outbox, identity }
  }

  fn harness() -> Harness { harness_with(Outbox::default()) }

  fn signup(username: &str, email: &str) -> Signup {
    Signup { username: username.into(), email: email.into() }
  }

  fn token_request(username: &str, code: &str) -> TokenRequest {
    TokenRequest { username: username.into(), confirmation_code: code.into() }
  }

  /// Sign up and return an access token.
  async fn login(h: &Harness, username: &str, email: &str) -> String {
    h.identity.signup(signup(username, email)).await.unwrap();
    let code = h.outbox.last_code();
    h.identity
      .issue_token(token_request(username, &code))
      .await
      .unwrap()
      .token
  }

  async fn set_role(h: &Harness, username: &str, role: Role) {
    let account = h.store.get_account(username).await.unwrap().unwrap();
    h.store
      .update_account(
        account.account_id,
        AccountPatch { role: Some(role), ..Default::default() },
      )
      .await
      .unwrap()
      .unwrap();
  }

  // ── Signup ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn fresh_signup_creates_user_and_mails_code() {
    let h = harness();
    let out = h.identity.signup(signup("alice", "alice@example.com")).await.unwrap();
    assert_eq!(out, signup("alice", "alice@example.com"));

    let stored = h.store.get_account("alice").await.unwrap().unwrap();
    assert_eq!(stored.role, Role::User);
    let code = h.outbox.last_code();
    assert_eq!(stored.confirmation_digest, Some(digest_code(&code)));

    let sent = h.outbox.sent.lock().unwrap();
    assert_eq!(sent[0].0, "alice@example.com");
    assert!(sent[0].1.contains("alice"));
  }

  #[tokio::test]
  async fn reserved_username_is_rejected() {
    let h = harness();
    for name in ["me", "ME"] {
      let err = h.identity.signup(signup(name, "x@example.com")).await.unwrap_err();
      assert!(matches!(err, Error::Validation(_)));
    }
    assert!(h.outbox.sent.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn repeated_signup_rotates_code() {
    let h = harness();
    h.identity.signup(signup("alice", "alice@example.com")).await.unwrap();
    let first = h.outbox.last_code();
    h.identity.signup(signup("alice", "alice@example.com")).await.unwrap();
    let second = h.outbox.last_code();

    assert_ne!(first, second);
    assert_eq!(h.store.accounts.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn email_taken_by_other_username_conflicts() {
    let h = harness();
    h.identity.signup(signup("alice", "shared@example.com")).await.unwrap();
    let err = h
      .identity
      .signup(signup("bob", "shared@example.com"))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Conflict(m) if m == "email mismatch"));
  }

  #[tokio::test]
  async fn username_with_other_email_conflicts() {
    let h = harness();
    h.identity.signup(signup("alice", "alice@example.com")).await.unwrap();
    let err = h
      .identity
      .signup(signup("alice", "other@example.com"))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Conflict(m) if m == "username mismatch"));
  }

  #[tokio::test]
  async fn notifier_failure_fails_signup_but_keeps_account() {
    let h = harness_with(Outbox { fail: true, ..Default::default() });
    let err = h
      .identity
      .signup(signup("alice", "alice@example.com"))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Notification(_)));
    assert!(h.store.get_account("alice").await.unwrap().is_some());
  }

  // ── Tokens ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn latest_code_yields_token_for_current_role() {
    let h = harness();
    h.identity.signup(signup("alice", "alice@example.com")).await.unwrap();
    let code = h.outbox.last_code();

    let token = h.identity.issue_token(token_request("alice", &code)).await.unwrap();
    let subject = h.identity.resolve_subject(Some(token.token.as_str())).await.unwrap();
    assert_eq!(subject, Subject::authenticated("alice", Role::User));

    // The code survives redemption.
    assert!(h.identity.issue_token(token_request("alice", &code)).await.is_ok());
  }

  #[tokio::test]
  async fn stale_code_is_rejected() {
    let h = harness();
    h.identity.signup(signup("alice", "alice@example.com")).await.unwrap();
    let stale = h.outbox.last_code();
    h.identity.signup(signup("alice", "alice@example.com")).await.unwrap();

    let err = h
      .identity
      .issue_token(token_request("alice", &stale))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidCredential));

    let err = h
      .identity
      .issue_token(token_request("alice", &stale.to_uppercase()))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidCredential));
  }

  #[tokio::test]
  async fn unknown_username_is_not_found() {
    let h = harness();
    let err = h
      .identity
      .issue_token(token_request("ghost", "whatever"))
      .await
      .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
  }

  #[tokio::test]
  async fn account_without_code_cannot_get_token() {
    let h = harness();
    h.store
      .upsert_account(Account::new("carol", "carol@example.com"))
      .await
      .unwrap();
    let err = h.identity.issue_token(token_request("carol", "")).await.unwrap_err();
    assert!(matches!(err, Error::InvalidCredential));
  }

  // ── Subject resolution ──────────────────────────────────────────────────

  #[tokio::test]
  async fn role_changes_apply_without_reissuing() {
    let h = harness();
    h.identity.signup(signup("alice", "alice@example.com")).await.unwrap();
    let code = h.outbox.last_code();
    let token = h.identity.issue_token(token_request("alice", &code)).await.unwrap();

    set_role(&h, "alice", Role::Moderator).await;

    let subject = h.identity.resolve_subject(Some(token.token.as_str())).await.unwrap();
    assert!(subject.is_moderator());
  }

  #[tokio::test]
  async fn bad_or_orphaned_tokens_are_anonymous() {
    let h = harness();
    let orphan = format!("{}|ghost|user", Uuid::new_v4());
    for token in [None, Some("garbage"), Some("ghost|user"), Some(orphan.as_str())] {
      let subject = h.identity.resolve_subject(token).await.unwrap();
      assert_eq!(subject, Subject::Anonymous);
    }
  }

  #[tokio::test]
  async fn token_follows_its_account_through_a_rename() {
    let h = harness();
    let token = login(&h, "alice", "alice@example.com").await;

    h.identity
      .update_own_profile(
        &Subject::authenticated("alice", Role::User),
        AccountPatch { username: Some("alice2".into()), ..Default::default() },
      )
      .await
      .unwrap();
    h.identity.signup(signup("alice", "stranger@example.com")).await.unwrap();

    let subject = h.identity.resolve_subject(Some(token.as_str())).await.unwrap();
    assert_eq!(subject, Subject::authenticated("alice2", Role::User));
  }

  #[tokio::test]
  async fn token_of_deleted_account_does_not_pass_to_new_owner() {
    let h = harness();
    let token = login(&h, "alice", "alice@example.com").await;

    assert!(h.store.delete_account("alice").await.unwrap());
    h.identity.signup(signup("alice", "stranger@example.com")).await.unwrap();

    let subject = h.identity.resolve_subject(Some(token.as_str())).await.unwrap();
    assert_eq!(subject, Subject::Anonymous);
  }

  // ── Own profile ─────────────────────────────────────────────────────────

  #[tokio::test]
  async fn own_profile_update_cannot_escalate_role() {
    let h = harness();
    h.identity.signup(signup("alice", "alice@example.com")).await.unwrap();
    let subject = Subject::authenticated("alice", Role::User);

    let updated = h
      .identity
      .update_own_profile(
        &subject,
        AccountPatch {
          role: Some(Role::Admin),
          bio: Some("x".into()),
          ..Default::default()
        },
      )
      .await
      .unwrap();
    assert_eq!(updated.role, Role::User);
    assert_eq!(updated.bio, "x");

    let stored = h.store.get_account("alice").await.unwrap().unwrap();
    assert_eq!(stored.role, Role::User);
    assert_eq!(stored.bio, "x");
  }

  #[tokio::test]
  async fn own_profile_update_keeps_a_concurrent_demotion() {
    let h = harness();
    h.identity.signup(signup("alice", "alice@example.com")).await.unwrap();
    set_role(&h, "alice", Role::Admin).await;
    let subject = Subject::authenticated("alice", Role::Admin);

    // An admin demotes alice after her account was read for the edit.
    let demote: Hook = Box::new(|accounts: &mut Vec<Account>| {
      for a in accounts.iter_mut().filter(|a| a.username == "alice") {
        a.role = Role::User;
      }
    });
    *h.store.before_update.lock().unwrap() = Some(demote);

    let updated = h
      .identity
      .update_own_profile(
        &subject,
        AccountPatch { bio: Some("x".into()), ..Default::default() },
      )
      .await
      .unwrap();
    assert_eq!(updated.role, Role::User);

    let stored = h.store.get_account("alice").await.unwrap().unwrap();
    assert_eq!(stored.role, Role::User);
    assert_eq!(stored.bio, "x");
  }

  #[tokio::test]
  async fn repeated_signup_keeps_role() {
    let h = harness();
    h.identity.signup(signup("alice", "alice@example.com")).await.unwrap();
    set_role(&h, "alice", Role::Moderator).await;
    h.identity.signup(signup("alice", "alice@example.com")).await.unwrap();

    let stored = h.store.get_account("alice").await.unwrap().unwrap();
    assert_eq!(stored.role, Role::Moderator);
    assert_eq!(stored.confirmation_digest, Some(digest_code(&h.outbox.last_code())));
  }

  #[tokio::test]
  async fn own_profile_requires_authentication() {
    let h = harness();
    let err = h
      .identity
      .update_own_profile(&Subject::Anonymous, AccountPatch::default())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Permission(DenyReason::NotAuthenticated)));
  }

  #[tokio::test]
  async fn own_profile_rename_respects_uniqueness() {
    let h = harness();
    h.identity.signup(signup("alice", "alice@example.com")).await.unwrap();
    h.identity.signup(signup("bob", "bob@example.com")).await.unwrap();

    let err = h
      .identity
      .update_own_profile(
        &Subject::authenticated("bob", Role::User),
        AccountPatch { username: Some("alice".into()), ..Default::default() },
      )
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
  }
}
