//! Handlers for `/categories` and `/genres`. The two collections behave
//! identically and differ only in which [`TagKind`] they address.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/categories/` | Optional `?search=<substring of name>` |
//! | `POST`   | `/categories/` | Body: `{"name":..,"slug":..}`; admin only |
//! | `DELETE` | `/categories/{slug}/` | Admin only |
//!
//! `/genres` mirrors the table above.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use revu_core::{
  Error,
  catalog::{Tag, TagKind},
  policy::{Action, Endpoint, authorize},
  subject::Subject,
};

use crate::{
  AppState, Backend,
  error::ApiError,
  extract::{CurrentSubject, JsonBody, PathParams, QueryParams},
  users::SearchParams,
};

fn endpoint(kind: TagKind) -> Endpoint {
  match kind {
    TagKind::Category => Endpoint::Categories,
    TagKind::Genre => Endpoint::Genres,
  }
}

// ─── Shared ──────────────────────────────────────────────────────────────────

async fn list<S: Backend>(
  state: &AppState<S>,
  subject: &Subject,
  kind: TagKind,
  search: Option<String>,
) -> Result<Vec<Tag>, ApiError> {
  authorize(endpoint(kind), subject, Action::Read, None)?;
  Ok(state.store.list_tags(kind, search).await.map_err(Error::from_store)?)
}

async fn create<S: Backend>(
  state: &AppState<S>,
  subject: &Subject,
  kind: TagKind,
  tag: Tag,
) -> Result<Tag, ApiError> {
  authorize(endpoint(kind), subject, Action::Create, None)?;
  tag.validate()?;
  let tag = state
    .store
    .create_tag(kind, tag)
    .await
    .map_err(Error::from_store)?;
  tracing::info!(%kind, slug = %tag.slug, "tag created");
  Ok(tag)
}

async fn delete<S: Backend>(
  state: &AppState<S>,
  subject: &Subject,
  kind: TagKind,
  slug: &str,
) -> Result<(), ApiError> {
  authorize(endpoint(kind), subject, Action::Delete, None)?;
  let deleted = state
    .store
    .delete_tag(kind, slug)
    .await
    .map_err(Error::from_store)?;
  if !deleted {
    return Err(ApiError::not_found(format!("{kind} {slug:?}")));
  }
  Ok(())
}

// ─── Categories ──────────────────────────────────────────────────────────────

/// `GET /categories/[?search=..]`
pub async fn list_categories<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  QueryParams(params): QueryParams<SearchParams>,
) -> Result<Json<Vec<Tag>>, ApiError> {
  Ok(Json(list(&state, &subject, TagKind::Category, params.search).await?))
}

/// `POST /categories/`
pub async fn create_category<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  JsonBody(tag): JsonBody<Tag>,
) -> Result<impl IntoResponse, ApiError> {
  let tag = create(&state, &subject, TagKind::Category, tag).await?;
  Ok((StatusCode::CREATED, Json(tag)))
}

/// `DELETE /categories/{slug}/`
pub async fn delete_category<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  PathParams(slug): PathParams<String>,
) -> Result<StatusCode, ApiError> {
  delete(&state, &subject, TagKind::Category, &slug).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Genres ──────────────────────────────────────────────────────────────────

/// `GET /genres/[?search=..]`
pub async fn list_genres<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  QueryParams(params): QueryParams<SearchParams>,
) -> Result<Json<Vec<Tag>>, ApiError> {
  Ok(Json(list(&state, &subject, TagKind::Genre, params.search).await?))
}

/// `POST /genres/`
pub async fn create_genre<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  JsonBody(tag): JsonBody<Tag>,
) -> Result<impl IntoResponse, ApiError> {
  let tag = create(&state, &subject, TagKind::Genre, tag).await?;
  Ok((StatusCode::CREATED, Json(tag)))
}

/// `DELETE /genres/{slug}/`
pub async fn delete_genre<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  PathParams(slug): PathParams<String>,
) -> Result<StatusCode, ApiError> {
  delete(&state, &subject, TagKind::Genre, &slug).await?;
  Ok(StatusCode::NO_CONTENT)
}
