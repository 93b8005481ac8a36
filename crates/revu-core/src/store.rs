//! Storage traits implemented by backends (e.g. `revu-store-sqlite`).
//!
//! Higher layers (`revu-api`, `revu-server`) depend on these abstractions, not
//! on any concrete backend. Backends enforce uniqueness themselves and report
//! violations as [`crate::Error::Conflict`] once converted.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use uuid::Uuid;

use crate::{
  account::{Account, AccountPatch},
  catalog::{
    Comment, NewComment, NewReview, NewTitle, Review, ReviewPatch, Tag, TagKind,
    Title, TitleFilter, TitlePatch,
  },
};

/// Shared error plumbing for every store trait.
pub trait Store: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;
}

// ─── Accounts ────────────────────────────────────────────────────────────────

pub trait AccountStore: Store {
  fn get_account<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;

  fn get_account_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;

  fn get_account_by_id(
    &self,
    account_id: Uuid,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  /// Insert the account, or replace the stored row with the same
  /// `account_id`. Fails with a conflict if another account already holds
  /// the username or email.
  fn upsert_account(
    &self,
    account: Account,
  ) -> impl Future<Output = Result<Account, Self::Error>> + Send + '_;

  /// Apply the fields present in `patch` to one account in a single write.
  /// Columns the patch leaves out, `role` included, keep their stored value.
  /// Callers validate the patch first. `None` if no such account exists.
  fn update_account(
    &self,
    account_id: Uuid,
    patch: AccountPatch,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  /// Replace the confirmation digest without touching any other column.
  /// Returns `false` if no such account exists.
  fn set_confirmation_digest(
    &self,
    account_id: Uuid,
    digest: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// All accounts ordered by username, optionally restricted to usernames
  /// containing `search`.
  fn list_accounts(
    &self,
    search: Option<String>,
  ) -> impl Future<Output = Result<Vec<Account>, Self::Error>> + Send + '_;

  /// Returns `false` if no such account existed. Reviews and comments by the
  /// account go with it.
  fn delete_account<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

pub trait CatalogStore: Store {
  // ── Categories and genres ─────────────────────────────────────────────

  /// Ordered by name; `search` is a substring filter on the name.
  fn list_tags(
    &self,
    kind: TagKind,
    search: Option<String>,
  ) -> impl Future<Output = Result<Vec<Tag>, Self::Error>> + Send + '_;

  fn create_tag(
    &self,
    kind: TagKind,
    tag: Tag,
  ) -> impl Future<Output = Result<Tag, Self::Error>> + Send + '_;

  /// Titles in a deleted category keep existing without one.
  fn delete_tag<'a>(
    &'a self,
    kind: TagKind,
    slug: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Titles ────────────────────────────────────────────────────────────

  fn list_titles(
    &self,
    filter: TitleFilter,
  ) -> impl Future<Output = Result<Vec<Title>, Self::Error>> + Send + '_;

  fn get_title(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Title>, Self::Error>> + Send + '_;

  /// Unknown category or genre slugs fail validation.
  fn create_title(
    &self,
    input: NewTitle,
  ) -> impl Future<Output = Result<Title, Self::Error>> + Send + '_;

  /// Returns `None` if the title does not exist.
  fn update_title(
    &self,
    id: i64,
    patch: TitlePatch,
  ) -> impl Future<Output = Result<Option<Title>, Self::Error>> + Send + '_;

  /// Cascades to the title's reviews and their comments.
  fn delete_title(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Reviews ───────────────────────────────────────────────────────────

  /// Newest first.
  fn list_reviews(
    &self,
    title_id: i64,
  ) -> impl Future<Output = Result<Vec<Review>, Self::Error>> + Send + '_;

  fn get_review(
    &self,
    title_id: i64,
    review_id: i64,
  ) -> impl Future<Output = Result<Option<Review>, Self::Error>> + Send + '_;

  /// Fails with a conflict if the author already reviewed the title.
  fn create_review(
    &self,
    input: NewReview,
  ) -> impl Future<Output = Result<Review, Self::Error>> + Send + '_;

  fn update_review(
    &self,
    review_id: i64,
    patch: ReviewPatch,
  ) -> impl Future<Output = Result<Option<Review>, Self::Error>> + Send + '_;

  /// Cascades to the review's comments.
  fn delete_review(
    &self,
    review_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Comments ──────────────────────────────────────────────────────────

  /// Newest first.
  fn list_comments(
    &self,
    review_id: i64,
  ) -> impl Future<Output = Result<Vec<Comment>, Self::Error>> + Send + '_;

  fn get_comment(
    &self,
    review_id: i64,
    comment_id: i64,
  ) -> impl Future<Output = Result<Option<Comment>, Self::Error>> + Send + '_;

  fn create_comment(
    &self,
    input: NewComment,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  fn update_comment(
    &self,
    comment_id: i64,
    text: String,
  ) -> impl Future<Output = Result<Option<Comment>, Self::Error>> + Send + '_;

  fn delete_comment(
    &self,
    comment_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
