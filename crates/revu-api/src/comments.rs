//! Handlers for `/titles/{title_id}/reviews/{review_id}/comments` endpoints.
//! Same ownership rules as reviews; the parent review must belong to the
//! title in the path.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use revu_core::{
  Error,
  catalog::{Comment, CommentBody, NewComment},
  policy::{Action, DenyReason, Endpoint, Resource, authorize},
  subject::Subject,
};

use crate::{
  AppState, Backend,
  error::ApiError,
  extract::{CurrentSubject, JsonBody, PathParams},
};

async fn ensure_review<S: Backend>(
  state: &AppState<S>,
  title_id: i64,
  review_id: i64,
) -> Result<(), ApiError> {
  let found = state
    .store
    .get_review(title_id, review_id)
    .await
    .map_err(Error::from_store)?;
  match found {
    Some(_) => Ok(()),
    None => Err(ApiError::not_found(format!(
      "review {review_id} of title {title_id}"
    ))),
  }
}

async fn authorized_comment<S: Backend>(
  state: &AppState<S>,
  subject: &Subject,
  action: Action,
  (title_id, review_id, comment_id): (i64, i64, i64),
) -> Result<Comment, ApiError> {
  authorize(Endpoint::Comments, subject, action, None)?;
  ensure_review(state, title_id, review_id).await?;
  let comment = state
    .store
    .get_comment(review_id, comment_id)
    .await
    .map_err(Error::from_store)?
    .ok_or_else(|| {
      ApiError::not_found(format!("comment {comment_id} of review {review_id}"))
    })?;
  authorize(
    Endpoint::Comments,
    subject,
    action,
    Some(&Resource::owned_by(&comment.author)),
  )?;
  Ok(comment)
}

/// `GET .../comments/`
pub async fn list<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  PathParams((title_id, review_id)): PathParams<(i64, i64)>,
) -> Result<Json<Vec<Comment>>, ApiError> {
  authorize(Endpoint::Comments, &subject, Action::Read, None)?;
  ensure_review(&state, title_id, review_id).await?;
  let comments = state
    .store
    .list_comments(review_id)
    .await
    .map_err(Error::from_store)?;
  Ok(Json(comments))
}

/// `POST .../comments/`
pub async fn create<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  PathParams((title_id, review_id)): PathParams<(i64, i64)>,
  JsonBody(body): JsonBody<CommentBody>,
) -> Result<impl IntoResponse, ApiError> {
  authorize(Endpoint::Comments, &subject, Action::Create, None)?;
  let author = subject
    .username()
    .ok_or(Error::Permission(DenyReason::NotAuthenticated))?;
  body.validate()?;
  ensure_review(&state, title_id, review_id).await?;
  let comment = state
    .store
    .create_comment(NewComment {
      review_id,
      author: author.to_owned(),
      text: body.text,
    })
    .await
    .map_err(Error::from_store)?;
  Ok((StatusCode::CREATED, Json(comment)))
}

/// `GET .../comments/{comment_id}/`
pub async fn get_one<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  PathParams(ids): PathParams<(i64, i64, i64)>,
) -> Result<Json<Comment>, ApiError> {
  Ok(Json(authorized_comment(&state, &subject, Action::Read, ids).await?))
}

/// `PATCH .../comments/{comment_id}/`
pub async fn update_one<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  PathParams(ids): PathParams<(i64, i64, i64)>,
  JsonBody(body): JsonBody<CommentBody>,
) -> Result<Json<Comment>, ApiError> {
  let comment =
    authorized_comment(&state, &subject, Action::Update, ids).await?;
  body.validate()?;
  let comment = state
    .store
    .update_comment(comment.id, body.text)
    .await
    .map_err(Error::from_store)?
    .ok_or_else(|| ApiError::not_found(format!("comment {}", comment.id)))?;
  Ok(Json(comment))
}

/// `DELETE .../comments/{comment_id}/`
pub async fn delete_one<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  PathParams(ids): PathParams<(i64, i64, i64)>,
) -> Result<StatusCode, ApiError> {
  let comment =
    authorized_comment(&state, &subject, Action::Delete, ids).await?;
  state
    .store
    .delete_comment(comment.id)
    .await
    .map_err(Error::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}
