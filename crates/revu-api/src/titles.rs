//! Handlers for `/titles` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/titles/` | `?category=&genre=` (slugs), `?name=` (substring), `?year=` |
//! | `POST`   | `/titles/` | Category and genres given by slug; admin only |
//! | `GET`    | `/titles/{title_id}/` | 404 if not found |
//! | `PATCH`  | `/titles/{title_id}/` | Admin only |
//! | `DELETE` | `/titles/{title_id}/` | Admin only; removes reviews and comments |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use revu_core::{
  Error,
  catalog::{NewTitle, Title, TitleFilter, TitlePatch},
  policy::{Action, Endpoint, authorize},
};

use crate::{
  AppState, Backend,
  error::ApiError,
  extract::{CurrentSubject, JsonBody, PathParams, QueryParams},
};

/// `GET /titles/`
pub async fn list<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  QueryParams(filter): QueryParams<TitleFilter>,
) -> Result<Json<Vec<Title>>, ApiError> {
  authorize(Endpoint::Titles, &subject, Action::Read, None)?;
  let titles = state
    .store
    .list_titles(filter)
    .await
    .map_err(Error::from_store)?;
  Ok(Json(titles))
}

/// `POST /titles/`
pub async fn create<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  JsonBody(body): JsonBody<NewTitle>,
) -> Result<impl IntoResponse, ApiError> {
  authorize(Endpoint::Titles, &subject, Action::Create, None)?;
  body.validate()?;
  let title = state
    .store
    .create_title(body)
    .await
    .map_err(Error::from_store)?;
  tracing::info!(title_id = title.id, name = %title.name, "title created");
  Ok((StatusCode::CREATED, Json(title)))
}

/// `GET /titles/{title_id}/`
pub async fn get_one<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  PathParams(title_id): PathParams<i64>,
) -> Result<Json<Title>, ApiError> {
  authorize(Endpoint::Titles, &subject, Action::Read, None)?;
  let title = state
    .store
    .get_title(title_id)
    .await
    .map_err(Error::from_store)?
    .ok_or_else(|| ApiError::not_found(format!("title {title_id}")))?;
  Ok(Json(title))
}

/// `PATCH /titles/{title_id}/`
pub async fn update_one<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  PathParams(title_id): PathParams<i64>,
  JsonBody(patch): JsonBody<TitlePatch>,
) -> Result<Json<Title>, ApiError> {
  authorize(Endpoint::Titles, &subject, Action::Update, None)?;
  patch.validate()?;
  let title = state
    .store
    .update_title(title_id, patch)
    .await
    .map_err(Error::from_store)?
    .ok_or_else(|| ApiError::not_found(format!("title {title_id}")))?;
  Ok(Json(title))
}

/// `DELETE /titles/{title_id}/`
pub async fn delete_one<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  PathParams(title_id): PathParams<i64>,
) -> Result<StatusCode, ApiError> {
  authorize(Endpoint::Titles, &subject, Action::Delete, None)?;
  let deleted = state
    .store
    .delete_title(title_id)
    .await
    .map_err(Error::from_store)?;
  if !deleted {
    return Err(ApiError::not_found(format!("title {title_id}")));
  }
  Ok(StatusCode::NO_CONTENT)
}
