//! The SQLite implementation of [`AccountStore`] and
//! [`CatalogStore`].
//!
//! Closures handed to [`tokio_rusqlite::Connection::call`] run one at a time
//! on the connection's thread, so a check followed by a write inside a single
//! closure cannot interleave with another request. Domain failures found
//! inside a closure travel out as `Ok(Err(..))` so they stay distinct from
//! database errors.

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use revu_core::{
  account::{Account, AccountPatch},
  catalog::{
    Comment, NewComment, NewReview, NewTitle, Review, ReviewPatch, Tag, TagKind,
    Title, TitleFilter, TitlePatch,
  },
  store::{AccountStore, CatalogStore, Store},
};

use crate::{
  Error, Result,
  encode::{
    ACCOUNT_COLUMNS, COMMENT_SELECT, REVIEW_SELECT, RawAccount, RawComment,
    RawReview, encode_dt, encode_role, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A revu store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn find_account(
    &self,
    column: &'static str,
    value: String,
  ) -> Result<Option<Account>> {
    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE {column} = ?1"),
              [value],
              RawAccount::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }
}

// ─── Query helpers ───────────────────────────────────────────────────────────

fn tag_table(kind: TagKind) -> &'static str {
  match kind {
    TagKind::Category => "categories",
    TagKind::Genre => "genres",
  }
}

fn row_exists(
  conn: &Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<bool> {
  Ok(conn.query_row(sql, params, |_| Ok(())).optional()?.is_some())
}

/// Map slugs to row ids; `Ok(Err(..))` names the first unknown slug.
fn resolve_slugs(
  conn: &Connection,
  kind: TagKind,
  slugs: &[String],
) -> rusqlite::Result<Result<Vec<i64>>> {
  let sql = format!("SELECT id FROM {} WHERE slug = ?1", tag_table(kind));
  let mut stmt = conn.prepare(&sql)?;
  let mut ids = Vec::with_capacity(slugs.len());
  for slug in slugs {
    match stmt.query_row([slug], |r| r.get(0)).optional()? {
      Some(id) => ids.push(id),
      None => {
        return Ok(Err(Error::Validation(format!("unknown {kind} {slug:?}"))));
      }
    }
  }
  ids.sort_unstable();
  ids.dedup();
  Ok(Ok(ids))
}

fn set_title_genres(
  conn: &Connection,
  title_id: i64,
  genre_ids: &[i64],
) -> rusqlite::Result<()> {
  conn.execute("DELETE FROM title_genres WHERE title_id = ?1", [title_id])?;
  let mut stmt =
    conn.prepare("INSERT INTO title_genres (title_id, genre_id) VALUES (?1, ?2)")?;
  for genre_id in genre_ids {
    stmt.execute([title_id, *genre_id])?;
  }
  Ok(())
}

const TITLE_SELECT: &str = "
  SELECT t.id, t.name, t.year, t.description, c.name, c.slug,
         (SELECT CAST(AVG(r.score) AS INTEGER)
            FROM reviews r WHERE r.title_id = t.id)
  FROM titles t
  LEFT JOIN categories c ON c.id = t.category_id";

/// Load titles matching `clause` (appended to [`TITLE_SELECT`]) together
/// with their genres.
fn query_titles(
  conn: &Connection,
  clause: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<Title>> {
  let mut stmt = conn.prepare(&format!("{TITLE_SELECT} {clause}"))?;
  let mut titles = stmt
    .query_map(params, |row| {
      let category = match (
        row.get::<_, Option<String>>(4)?,
        row.get::<_, Option<String>>(5)?,
      ) {
        (Some(name), Some(slug)) => Some(Tag { name, slug }),
        _ => None,
      };
      Ok(Title {
        id: row.get(0)?,
        name: row.get(1)?,
        year: row.get(2)?,
        description: row.get(3)?,
        category,
        genre: Vec::new(),
        rating: row.get(6)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut genres = conn.prepare(
    "SELECT g.name, g.slug
     FROM title_genres tg
     JOIN genres g ON g.id = tg.genre_id
     WHERE tg.title_id = ?1
     ORDER BY g.name",
  )?;
  for title in &mut titles {
    title.genre = genres
      .query_map([title.id], |row| {
        Ok(Tag { name: row.get(0)?, slug: row.get(1)? })
      })?
      .collect::<rusqlite::Result<_>>()?;
  }
  Ok(titles)
}

fn account_id_of(conn: &Connection, username: &str) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT account_id FROM accounts WHERE username = ?1",
      [username],
      |r| r.get(0),
    )
    .optional()
}

// ─── AccountStore impl ───────────────────────────────────────────────────────

impl Store for SqliteStore {
  type Error = Error;
}

impl AccountStore for SqliteStore {
  async fn get_account(&self, username: &str) -> Result<Option<Account>> {
    self.find_account("username", username.to_owned()).await
  }

  async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
    self.find_account("email", email.to_owned()).await
  }

  async fn get_account_by_id(&self, account_id: Uuid) -> Result<Option<Account>> {
    self.find_account("account_id", encode_uuid(account_id)).await
  }

  async fn upsert_account(&self, account: Account) -> Result<Account> {
    let id_str     = encode_uuid(account.account_id);
    let role_str   = encode_role(account.role);
    let created    = encode_dt(account.created_at);
    let username   = account.username.clone();
    let email      = account.email.clone();
    let bio        = account.bio.clone();
    let first_name = account.first_name.clone();
    let last_name  = account.last_name.clone();
    let digest     = account.confirmation_digest.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO accounts (
             account_id, username, email, role, bio,
             first_name, last_name, confirmation_digest, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
           ON CONFLICT (account_id) DO UPDATE SET
             username            = excluded.username,
             email               = excluded.email,
             role                = excluded.role,
             bio                 = excluded.bio,
             first_name          = excluded.first_name,
             last_name           = excluded.last_name,
             confirmation_digest = excluded.confirmation_digest",
          rusqlite::params![
            id_str, username, email, role_str, bio,
            first_name, last_name, digest, created,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(account)
  }

  async fn update_account(
    &self,
    account_id: Uuid,
    patch: AccountPatch,
  ) -> Result<Option<Account>> {
    let id_str = encode_uuid(account_id);
    let role_str = patch.role.map(encode_role);

    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE accounts SET
             username   = COALESCE(?2, username),
             email      = COALESCE(?3, email),
             first_name = COALESCE(?4, first_name),
             last_name  = COALESCE(?5, last_name),
             bio        = COALESCE(?6, bio),
             role       = COALESCE(?7, role)
           WHERE account_id = ?1",
          rusqlite::params![
            id_str, patch.username, patch.email, patch.first_name,
            patch.last_name, patch.bio, role_str,
          ],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        Ok(Some(conn.query_row(
          &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE account_id = ?1"),
          [&id_str],
          RawAccount::from_row,
        )?))
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }

  async fn set_confirmation_digest(
    &self,
    account_id: Uuid,
    digest: String,
  ) -> Result<bool> {
    let id_str = encode_uuid(account_id);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE accounts SET confirmation_digest = ?2 WHERE account_id = ?1",
          [id_str, digest],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn list_accounts(&self, search: Option<String>) -> Result<Vec<Account>> {
    let raws: Vec<RawAccount> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ACCOUNT_COLUMNS} FROM accounts
           WHERE ?1 IS NULL OR instr(lower(username), lower(?1)) > 0
           ORDER BY username"
        ))?;
        let rows = stmt
          .query_map([search], RawAccount::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAccount::into_account).collect()
  }

  async fn delete_account(&self, username: &str) -> Result<bool> {
    let username = username.to_owned();
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM accounts WHERE username = ?1", [username])?)
      })
      .await?;
    Ok(removed > 0)
  }
}

// ─── CatalogStore impl ───────────────────────────────────────────────────────

impl CatalogStore for SqliteStore {
  // ── Categories and genres ─────────────────────────────────────────────────

  async fn list_tags(&self, kind: TagKind, search: Option<String>) -> Result<Vec<Tag>> {
    let sql = format!(
      "SELECT name, slug FROM {}
       WHERE ?1 IS NULL OR instr(lower(name), lower(?1)) > 0
       ORDER BY name",
      tag_table(kind)
    );

    Ok(
      self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(&sql)?;
          let rows = stmt
            .query_map([search], |row| {
              Ok(Tag { name: row.get(0)?, slug: row.get(1)? })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  async fn create_tag(&self, kind: TagKind, tag: Tag) -> Result<Tag> {
    let sql = format!("INSERT INTO {} (name, slug) VALUES (?1, ?2)", tag_table(kind));
    let (name, slug) = (tag.name.clone(), tag.slug.clone());

    self
      .conn
      .call(move |conn| {
        conn.execute(&sql, [name, slug])?;
        Ok(())
      })
      .await?;
    Ok(tag)
  }

  async fn delete_tag(&self, kind: TagKind, slug: &str) -> Result<bool> {
    let sql = format!("DELETE FROM {} WHERE slug = ?1", tag_table(kind));
    let slug = slug.to_owned();
    let removed = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, [slug])?))
      .await?;
    Ok(removed > 0)
  }

  // ── Titles ────────────────────────────────────────────────────────────────

  async fn list_titles(&self, filter: TitleFilter) -> Result<Vec<Title>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(query_titles(
            conn,
            "WHERE (?1 IS NULL OR c.slug = ?1)
               AND (?2 IS NULL OR EXISTS (
                     SELECT 1 FROM title_genres tg
                     JOIN genres g ON g.id = tg.genre_id
                     WHERE tg.title_id = t.id AND g.slug = ?2))
               AND (?3 IS NULL OR instr(t.name, ?3) > 0)
               AND (?4 IS NULL OR t.year = ?4)
             ORDER BY t.id",
            rusqlite::params![filter.category, filter.genre, filter.name, filter.year],
          )?)
        })
        .await?,
    )
  }

  async fn get_title(&self, id: i64) -> Result<Option<Title>> {
    Ok(
      self
        .conn
        .call(move |conn| Ok(query_titles(conn, "WHERE t.id = ?1", [id])?.pop()))
        .await?,
    )
  }

  async fn create_title(&self, input: NewTitle) -> Result<Title> {
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let category_id = match resolve_slugs(&tx, TagKind::Category, input.category.as_slice())? {
          Ok(ids) => ids.first().copied(),
          Err(e) => return Ok(Err(e)),
        };
        let genre_ids = match resolve_slugs(&tx, TagKind::Genre, &input.genre)? {
          Ok(ids) => ids,
          Err(e) => return Ok(Err(e)),
        };

        tx.execute(
          "INSERT INTO titles (name, year, description, category_id)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![input.name, input.year, input.description, category_id],
        )?;
        let id = tx.last_insert_rowid();
        set_title_genres(&tx, id, &genre_ids)?;

        let title = query_titles(&tx, "WHERE t.id = ?1", [id])?.pop();
        tx.commit()?;
        Ok(title.ok_or_else(|| Error::NotFound(format!("title {id}"))))
      })
      .await?;
    outcome
  }

  async fn update_title(&self, id: i64, patch: TitlePatch) -> Result<Option<Title>> {
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !row_exists(&tx, "SELECT 1 FROM titles WHERE id = ?1", [id])? {
          return Ok(Ok(None));
        }

        if let Some(name) = &patch.name {
          tx.execute("UPDATE titles SET name = ?1 WHERE id = ?2", rusqlite::params![name, id])?;
        }
        if let Some(year) = patch.year {
          tx.execute("UPDATE titles SET year = ?1 WHERE id = ?2", [i64::from(year), id])?;
        }
        if let Some(description) = &patch.description {
          tx.execute(
            "UPDATE titles SET description = ?1 WHERE id = ?2",
            rusqlite::params![description, id],
          )?;
        }
        if let Some(category) = patch.category {
          let category_id = match category {
            Some(slug) => match resolve_slugs(&tx, TagKind::Category, &[slug])? {
              Ok(ids) => Some(ids[0]),
              Err(e) => return Ok(Err(e)),
            },
            None => None,
          };
          tx.execute(
            "UPDATE titles SET category_id = ?1 WHERE id = ?2",
            rusqlite::params![category_id, id],
          )?;
        }
        if let Some(slugs) = &patch.genre {
          let genre_ids = match resolve_slugs(&tx, TagKind::Genre, slugs)? {
            Ok(ids) => ids,
            Err(e) => return Ok(Err(e)),
          };
          set_title_genres(&tx, id, &genre_ids)?;
        }

        let title = query_titles(&tx, "WHERE t.id = ?1", [id])?.pop();
        tx.commit()?;
        Ok(Ok(title))
      })
      .await?;
    outcome
  }

  async fn delete_title(&self, id: i64) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM titles WHERE id = ?1", [id])?))
      .await?;
    Ok(removed > 0)
  }

  // ── Reviews ───────────────────────────────────────────────────────────────

  async fn list_reviews(&self, title_id: i64) -> Result<Vec<Review>> {
    let raws: Vec<RawReview> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{REVIEW_SELECT} WHERE r.title_id = ?1 ORDER BY r.pub_date DESC, r.id DESC"
        ))?;
        let rows = stmt
          .query_map([title_id], RawReview::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReview::into_review).collect()
  }

  async fn get_review(&self, title_id: i64, review_id: i64) -> Result<Option<Review>> {
    let raw: Option<RawReview> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("{REVIEW_SELECT} WHERE r.id = ?1 AND r.title_id = ?2"),
              [review_id, title_id],
              RawReview::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawReview::into_review).transpose()
  }

  async fn create_review(&self, input: NewReview) -> Result<Review> {
    let pub_date = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !row_exists(&tx, "SELECT 1 FROM titles WHERE id = ?1", [input.title_id])? {
          return Ok(Err(Error::NotFound(format!("title {}", input.title_id))));
        }
        let Some(author_id) = account_id_of(&tx, &input.author)? else {
          return Ok(Err(Error::NotFound(format!("account {:?}", input.author))));
        };
        if row_exists(
          &tx,
          "SELECT 1 FROM reviews WHERE title_id = ?1 AND author_id = ?2",
          rusqlite::params![input.title_id, author_id],
        )? {
          return Ok(Err(Error::Conflict(format!(
            "{} has already reviewed title {}",
            input.author, input.title_id
          ))));
        }

        tx.execute(
          "INSERT INTO reviews (title_id, author_id, text, score, pub_date)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![input.title_id, author_id, input.text, input.score, pub_date],
        )?;
        let raw = tx.query_row(
          &format!("{REVIEW_SELECT} WHERE r.id = ?1"),
          [tx.last_insert_rowid()],
          RawReview::from_row,
        )?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await?;

    outcome.and_then(RawReview::into_review)
  }

  async fn update_review(&self, review_id: i64, patch: ReviewPatch) -> Result<Option<Review>> {
    let raw: Option<RawReview> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if let Some(text) = &patch.text {
          tx.execute("UPDATE reviews SET text = ?1 WHERE id = ?2", rusqlite::params![text, review_id])?;
        }
        if let Some(score) = patch.score {
          tx.execute("UPDATE reviews SET score = ?1 WHERE id = ?2", rusqlite::params![score, review_id])?;
        }
        let raw = tx
          .query_row(
            &format!("{REVIEW_SELECT} WHERE r.id = ?1"),
            [review_id],
            RawReview::from_row,
          )
          .optional()?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.map(RawReview::into_review).transpose()
  }

  async fn delete_review(&self, review_id: i64) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM reviews WHERE id = ?1", [review_id])?))
      .await?;
    Ok(removed > 0)
  }

  // ── Comments ──────────────────────────────────────────────────────────────

  async fn list_comments(&self, review_id: i64) -> Result<Vec<Comment>> {
    let raws: Vec<RawComment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{COMMENT_SELECT} WHERE c.review_id = ?1 ORDER BY c.pub_date DESC, c.id DESC"
        ))?;
        let rows = stmt
          .query_map([review_id], RawComment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawComment::into_comment).collect()
  }

  async fn get_comment(&self, review_id: i64, comment_id: i64) -> Result<Option<Comment>> {
    let raw: Option<RawComment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("{COMMENT_SELECT} WHERE c.id = ?1 AND c.review_id = ?2"),
              [comment_id, review_id],
              RawComment::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawComment::into_comment).transpose()
  }

  async fn create_comment(&self, input: NewComment) -> Result<Comment> {
    let pub_date = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !row_exists(&tx, "SELECT 1 FROM reviews WHERE id = ?1", [input.review_id])? {
          return Ok(Err(Error::NotFound(format!("review {}", input.review_id))));
        }
        let Some(author_id) = account_id_of(&tx, &input.author)? else {
          return Ok(Err(Error::NotFound(format!("account {:?}", input.author))));
        };

        tx.execute(
          "INSERT INTO comments (review_id, author_id, text, pub_date)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![input.review_id, author_id, input.text, pub_date],
        )?;
        let raw = tx.query_row(
          &format!("{COMMENT_SELECT} WHERE c.id = ?1"),
          [tx.last_insert_rowid()],
          RawComment::from_row,
        )?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await?;

    outcome.and_then(RawComment::into_comment)
  }

  async fn update_comment(&self, comment_id: i64, text: String) -> Result<Option<Comment>> {
    let raw: Option<RawComment> = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE comments SET text = ?1 WHERE id = ?2",
          rusqlite::params![text, comment_id],
        )?;
        Ok(
          conn
            .query_row(
              &format!("{COMMENT_SELECT} WHERE c.id = ?1"),
              [comment_id],
              RawComment::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawComment::into_comment).transpose()
  }

  async fn delete_comment(&self, comment_id: i64) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM comments WHERE id = ?1", [comment_id])?))
      .await?;
    Ok(removed > 0)
  }
}
