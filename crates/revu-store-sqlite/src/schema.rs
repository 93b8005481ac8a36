//! SQL schema for the revu SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS accounts (
    account_id          TEXT PRIMARY KEY,
    username            TEXT NOT NULL UNIQUE,
    email               TEXT NOT NULL UNIQUE,
    role                TEXT NOT NULL DEFAULT 'user',
    bio                 TEXT NOT NULL DEFAULT '',
    first_name          TEXT NOT NULL DEFAULT '',
    last_name           TEXT NOT NULL DEFAULT '',
    confirmation_digest TEXT,            -- hex SHA-256 of the latest code
    created_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS categories (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS genres (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    slug TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS titles (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    year        INTEGER NOT NULL,
    description TEXT,
    category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS title_genres (
    title_id INTEGER NOT NULL REFERENCES titles(id) ON DELETE CASCADE,
    genre_id INTEGER NOT NULL REFERENCES genres(id) ON DELETE CASCADE,
    PRIMARY KEY (title_id, genre_id)
);

-- One review per (title, author).
CREATE TABLE IF NOT EXISTS reviews (
    id        INTEGER PRIMARY KEY,
    title_id  INTEGER NOT NULL REFERENCES titles(id) ON DELETE CASCADE,
    author_id TEXT    NOT NULL REFERENCES accounts(account_id) ON DELETE CASCADE,
    text      TEXT    NOT NULL,
    score     INTEGER NOT NULL CHECK (score BETWEEN 1 AND 10),
    pub_date  TEXT    NOT NULL,   -- ISO 8601 UTC; server-assigned
    UNIQUE (title_id, author_id)
);

CREATE TABLE IF NOT EXISTS comments (
    id        INTEGER PRIMARY KEY,
    review_id INTEGER NOT NULL REFERENCES reviews(id) ON DELETE CASCADE,
    author_id TEXT    NOT NULL REFERENCES accounts(account_id) ON DELETE CASCADE,
    text      TEXT    NOT NULL,
    pub_date  TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS titles_category_idx ON titles(category_id);
CREATE INDEX IF NOT EXISTS titles_year_idx     ON titles(year);
CREATE INDEX IF NOT EXISTS reviews_title_idx   ON reviews(title_id);
CREATE INDEX IF NOT EXISTS comments_review_idx ON comments(review_id);

PRAGMA user_version = 1;
";
