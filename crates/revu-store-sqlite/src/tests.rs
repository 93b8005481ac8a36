//! Integration tests for `SqliteStore` against an in-memory database.

use revu_core::{
  account::{Account, AccountPatch, Role},
  catalog::{
    NewComment, NewReview, NewTitle, ReviewPatch, Tag, TagKind, TitleFilter,
    TitlePatch,
  },
  store::{AccountStore, CatalogStore},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn tag(name: &str, slug: &str) -> Tag {
  Tag { name: name.into(), slug: slug.into() }
}

fn new_title(name: &str, year: i32, category: Option<&str>, genre: &[&str]) -> NewTitle {
  NewTitle {
    name:        name.into(),
    year,
    description: None,
    category:    category.map(Into::into),
    genre:       genre.iter().map(|g| (*g).into()).collect(),
  }
}

fn review(title_id: i64, author: &str, score: u8) -> NewReview {
  NewReview { title_id, author: author.into(), text: "worth it".into(), score }
}

/// A store with two accounts, a category, two genres and one title.
async fn seeded() -> (SqliteStore, i64) {
  let s = store().await;
  s.upsert_account(Account::new("alice", "alice@example.com")).await.unwrap();
  s.upsert_account(Account::new("bob", "bob@example.com")).await.unwrap();
  s.create_tag(TagKind::Category, tag("Books", "book")).await.unwrap();
  s.create_tag(TagKind::Genre, tag("Drama", "drama")).await.unwrap();
  s.create_tag(TagKind::Genre, tag("Comedy", "comedy")).await.unwrap();
  let title = s
    .create_title(new_title("Hamlet", 1603, Some("book"), &["drama"]))
    .await
    .unwrap();
  (s, title.id)
}

// ─── Accounts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_and_get_account() {
  let s = store().await;
  let mut account = Account::new("alice", "alice@example.com");
  account.confirmation_digest = Some("abc".into());
  s.upsert_account(account.clone()).await.unwrap();

  let by_name = s.get_account("alice").await.unwrap().unwrap();
  assert_eq!(by_name.account_id, account.account_id);
  assert_eq!(by_name.role, Role::User);
  assert_eq!(by_name.confirmation_digest.as_deref(), Some("abc"));

  let by_email = s.get_account_by_email("alice@example.com").await.unwrap().unwrap();
  assert_eq!(by_email.username, "alice");

  assert!(s.get_account("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn upsert_updates_existing_row() {
  let s = store().await;
  let mut account = Account::new("alice", "alice@example.com");
  s.upsert_account(account.clone()).await.unwrap();

  account.role = Role::Moderator;
  account.username = "alicia".into();
  s.upsert_account(account).await.unwrap();

  assert!(s.get_account("alice").await.unwrap().is_none());
  let renamed = s.get_account("alicia").await.unwrap().unwrap();
  assert_eq!(renamed.role, Role::Moderator);
  assert_eq!(s.list_accounts(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_username_or_email_conflicts() {
  let s = store().await;
  s.upsert_account(Account::new("alice", "alice@example.com")).await.unwrap();

  let same_name = s.upsert_account(Account::new("alice", "other@example.com")).await;
  assert!(matches!(same_name, Err(Error::Conflict(_))));

  let same_email = s.upsert_account(Account::new("bob", "alice@example.com")).await;
  assert!(matches!(same_email, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn get_account_by_id_survives_rename() {
  let s = store().await;
  let account = Account::new("alice", "alice@example.com");
  s.upsert_account(account.clone()).await.unwrap();

  let renamed = s
    .update_account(account.account_id, AccountPatch {
      username: Some("alice2".into()),
      ..Default::default()
    })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(renamed.username, "alice2");

  let by_id = s.get_account_by_id(account.account_id).await.unwrap().unwrap();
  assert_eq!(by_id.username, "alice2");
  assert!(s.get_account_by_id(uuid::Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn update_account_leaves_unpatched_role_alone() {
  let s = store().await;
  let mut account = Account::new("alice", "alice@example.com");
  account.role = Role::Admin;
  s.upsert_account(account.clone()).await.unwrap();

  // Another writer demotes the account after `account` was read.
  s.update_account(account.account_id, AccountPatch {
    role: Some(Role::User),
    ..Default::default()
  })
  .await
  .unwrap();

  let updated = s
    .update_account(account.account_id, AccountPatch {
      bio: Some("x".into()),
      ..Default::default()
    })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.role, Role::User);
  assert_eq!(updated.bio, "x");
  assert_eq!(updated.email, "alice@example.com");
}

#[tokio::test]
async fn update_account_reports_conflicts_and_missing_rows() {
  let s = store().await;
  let alice = Account::new("alice", "alice@example.com");
  s.upsert_account(alice.clone()).await.unwrap();
  s.upsert_account(Account::new("bob", "bob@example.com")).await.unwrap();

  let taken = s
    .update_account(alice.account_id, AccountPatch {
      email: Some("bob@example.com".into()),
      ..Default::default()
    })
    .await;
  assert!(matches!(taken, Err(Error::Conflict(_))));

  let missing = s
    .update_account(uuid::Uuid::new_v4(), AccountPatch::default())
    .await
    .unwrap();
  assert!(missing.is_none());
}

#[tokio::test]
async fn set_confirmation_digest_touches_only_the_digest() {
  let s = store().await;
  let mut account = Account::new("alice", "alice@example.com");
  account.role = Role::Moderator;
  s.upsert_account(account.clone()).await.unwrap();

  assert!(s.set_confirmation_digest(account.account_id, "d1".into()).await.unwrap());
  let stored = s.get_account("alice").await.unwrap().unwrap();
  assert_eq!(stored.confirmation_digest.as_deref(), Some("d1"));
  assert_eq!(stored.role, Role::Moderator);

  assert!(!s.set_confirmation_digest(uuid::Uuid::new_v4(), "d2".into()).await.unwrap());
}

#[tokio::test]
async fn list_accounts_searches_usernames() {
  let s = store().await;
  for name in ["carol", "alice", "Alfred"] {
    s.upsert_account(Account::new(name, format!("{name}@example.com"))).await.unwrap();
  }
  let all: Vec<_> = s
    .list_accounts(None)
    .await
    .unwrap()
    .into_iter()
    .map(|a| a.username)
    .collect();
  assert_eq!(all, ["Alfred", "alice", "carol"]);

  let found = s.list_accounts(Some("AL".into())).await.unwrap();
  assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn deleting_account_removes_its_reviews() {
  let (s, title_id) = seeded().await;
  s.create_review(review(title_id, "alice", 8)).await.unwrap();

  assert!(s.delete_account("alice").await.unwrap());
  assert!(!s.delete_account("alice").await.unwrap());
  assert!(s.list_reviews(title_id).await.unwrap().is_empty());
}

// ─── Categories and genres ───────────────────────────────────────────────────

#[tokio::test]
async fn tags_list_sorted_and_searchable() {
  let s = store().await;
  s.create_tag(TagKind::Genre, tag("Thriller", "thriller")).await.unwrap();
  s.create_tag(TagKind::Genre, tag("Drama", "drama")).await.unwrap();
  s.create_tag(TagKind::Category, tag("Films", "movie")).await.unwrap();

  let genres = s.list_tags(TagKind::Genre, None).await.unwrap();
  assert_eq!(genres, [tag("Drama", "drama"), tag("Thriller", "thriller")]);

  let found = s.list_tags(TagKind::Genre, Some("thr".into())).await.unwrap();
  assert_eq!(found, [tag("Thriller", "thriller")]);

  assert_eq!(s.list_tags(TagKind::Category, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_slug_conflicts() {
  let s = store().await;
  s.create_tag(TagKind::Category, tag("Books", "book")).await.unwrap();
  let dup = s.create_tag(TagKind::Category, tag("Other books", "book")).await;
  assert!(matches!(dup, Err(Error::Conflict(_))));

  // Same slug in the other collection is fine.
  s.create_tag(TagKind::Genre, tag("Book", "book")).await.unwrap();
}

#[tokio::test]
async fn duplicate_genre_name_conflicts() {
  let s = store().await;
  s.create_tag(TagKind::Genre, tag("Drama", "drama")).await.unwrap();
  let dup = s.create_tag(TagKind::Genre, tag("Drama", "drama-2")).await;
  assert!(matches!(dup, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn deleting_category_keeps_titles() {
  let (s, title_id) = seeded().await;
  assert!(s.delete_tag(TagKind::Category, "book").await.unwrap());
  assert!(!s.delete_tag(TagKind::Category, "book").await.unwrap());

  let title = s.get_title(title_id).await.unwrap().unwrap();
  assert!(title.category.is_none());
  assert_eq!(title.genre, [tag("Drama", "drama")]);
}

// ─── Titles ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_title_expands_references() {
  let (s, title_id) = seeded().await;
  let title = s.get_title(title_id).await.unwrap().unwrap();
  assert_eq!(title.name, "Hamlet");
  assert_eq!(title.category, Some(tag("Books", "book")));
  assert_eq!(title.genre, [tag("Drama", "drama")]);
  assert_eq!(title.rating, None);
}

#[tokio::test]
async fn create_title_with_unknown_slug_fails_validation() {
  let (s, _) = seeded().await;
  let bad_genre = s
    .create_title(new_title("Faust", 1808, Some("book"), &["poetry"]))
    .await;
  assert!(matches!(bad_genre, Err(Error::Validation(_))));

  let bad_category = s.create_title(new_title("Faust", 1808, Some("opera"), &[])).await;
  assert!(matches!(bad_category, Err(Error::Validation(_))));

  assert_eq!(s.list_titles(TitleFilter::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn title_filters_combine() {
  let (s, _) = seeded().await;
  s.create_title(new_title("Tartuffe", 1664, None, &["comedy"])).await.unwrap();
  s.create_title(new_title("Hamlet 2", 2008, None, &["comedy", "drama"])).await.unwrap();

  let by = |filter: TitleFilter| {
    let s = s.clone();
    async move {
      s.list_titles(filter)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect::<Vec<_>>()
    }
  };

  assert_eq!(by(TitleFilter::default()).await.len(), 3);
  assert_eq!(
    by(TitleFilter { genre: Some("comedy".into()), ..Default::default() }).await,
    ["Tartuffe", "Hamlet 2"]
  );
  assert_eq!(
    by(TitleFilter { category: Some("book".into()), ..Default::default() }).await,
    ["Hamlet"]
  );
  assert_eq!(
    by(TitleFilter { name: Some("Hamlet".into()), ..Default::default() }).await,
    ["Hamlet", "Hamlet 2"]
  );
  assert_eq!(
    by(TitleFilter {
      name: Some("Hamlet".into()),
      genre: Some("comedy".into()),
      ..Default::default()
    })
    .await,
    ["Hamlet 2"]
  );
  assert_eq!(
    by(TitleFilter { year: Some(1664), ..Default::default() }).await,
    ["Tartuffe"]
  );
}

#[tokio::test]
async fn update_title_replaces_given_fields() {
  let (s, title_id) = seeded().await;
  let updated = s
    .update_title(title_id, TitlePatch {
      description: Some("A prince hesitates.".into()),
      genre: Some(vec!["comedy".into(), "drama".into()]),
      ..Default::default()
    })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.name, "Hamlet");
  assert_eq!(updated.description.as_deref(), Some("A prince hesitates."));
  assert_eq!(updated.genre, [tag("Comedy", "comedy"), tag("Drama", "drama")]);

  assert!(s.update_title(9999, TitlePatch::default()).await.unwrap().is_none());
}

#[tokio::test]
async fn update_title_can_clear_category() {
  let (s, title_id) = seeded().await;

  let untouched = s
    .update_title(title_id, TitlePatch { year: Some(1604), ..Default::default() })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(untouched.category, Some(tag("Books", "book")));

  let cleared = s
    .update_title(title_id, TitlePatch { category: Some(None), ..Default::default() })
    .await
    .unwrap()
    .unwrap();
  assert!(cleared.category.is_none());
  assert_eq!(cleared.year, 1604);
}

#[tokio::test]
async fn rating_is_truncated_average() {
  let (s, title_id) = seeded().await;
  s.create_review(review(title_id, "alice", 8)).await.unwrap();
  s.create_review(review(title_id, "bob", 7)).await.unwrap();

  let title = s.get_title(title_id).await.unwrap().unwrap();
  assert_eq!(title.rating, Some(7));
}

#[tokio::test]
async fn deleting_title_cascades() {
  let (s, title_id) = seeded().await;
  let r = s.create_review(review(title_id, "alice", 8)).await.unwrap();
  s.create_comment(NewComment { review_id: r.id, author: "bob".into(), text: "agreed".into() })
    .await
    .unwrap();

  assert!(s.delete_title(title_id).await.unwrap());
  assert!(s.get_title(title_id).await.unwrap().is_none());
  assert!(s.get_review(title_id, r.id).await.unwrap().is_none());
  assert!(s.list_comments(r.id).await.unwrap().is_empty());
}

// ─── Reviews ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn second_review_by_same_author_conflicts() {
  let (s, title_id) = seeded().await;
  s.create_review(review(title_id, "alice", 9)).await.unwrap();

  let again = s
    .create_review(NewReview {
      title_id,
      author: "alice".into(),
      text: "changed my mind".into(),
      score: 2,
    })
    .await;
  assert!(matches!(again, Err(Error::Conflict(_))));

  // Another author is fine.
  s.create_review(review(title_id, "bob", 3)).await.unwrap();
  assert_eq!(s.list_reviews(title_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn review_needs_existing_title_and_author() {
  let (s, title_id) = seeded().await;
  assert!(matches!(
    s.create_review(review(9999, "alice", 5)).await,
    Err(Error::NotFound(_))
  ));
  assert!(matches!(
    s.create_review(review(title_id, "ghost", 5)).await,
    Err(Error::NotFound(_))
  ));
}

#[tokio::test]
async fn reviews_are_scoped_to_their_title() {
  let (s, title_id) = seeded().await;
  let other = s.create_title(new_title("Othello", 1603, None, &[])).await.unwrap();
  let r = s.create_review(review(title_id, "alice", 6)).await.unwrap();

  assert_eq!(r.author, "alice");
  assert!(s.get_review(title_id, r.id).await.unwrap().is_some());
  assert!(s.get_review(other.id, r.id).await.unwrap().is_none());
}

#[tokio::test]
async fn update_review_patches_fields() {
  let (s, title_id) = seeded().await;
  let r = s.create_review(review(title_id, "alice", 6)).await.unwrap();

  let updated = s
    .update_review(r.id, ReviewPatch { score: Some(10), ..Default::default() })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(updated.score, 10);
  assert_eq!(updated.text, "worth it");

  assert!(s.delete_review(r.id).await.unwrap());
  assert!(s.update_review(r.id, ReviewPatch::default()).await.unwrap().is_none());
}

// ─── Comments ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn comments_round_trip() {
  let (s, title_id) = seeded().await;
  let r = s.create_review(review(title_id, "alice", 6)).await.unwrap();

  let c = s
    .create_comment(NewComment { review_id: r.id, author: "bob".into(), text: "hm".into() })
    .await
    .unwrap();
  assert_eq!(c.author, "bob");
  assert_eq!(s.list_comments(r.id).await.unwrap().len(), 1);

  let edited = s.update_comment(c.id, "on reflection, yes".into()).await.unwrap().unwrap();
  assert_eq!(edited.text, "on reflection, yes");

  assert!(s.get_comment(r.id + 1, c.id).await.unwrap().is_none());
  assert!(s.delete_comment(c.id).await.unwrap());
  assert!(s.get_comment(r.id, c.id).await.unwrap().is_none());
}

#[tokio::test]
async fn comment_on_missing_review_is_not_found() {
  let (s, _) = seeded().await;
  let err = s
    .create_comment(NewComment { review_id: 42, author: "bob".into(), text: "?".into() })
    .await;
  assert!(matches!(err, Err(Error::NotFound(_))));
}
