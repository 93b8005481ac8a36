//! Handlers for `/titles/{title_id}/reviews` endpoints.
//!
//! Anyone may read. Any authenticated caller may post one review per title.
//! Edits and deletes are open to the author, moderators and admins.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use revu_core::{
  Error,
  catalog::{NewReview, Review, ReviewBody, ReviewPatch},
  policy::{Action, DenyReason, Endpoint, Resource, authorize},
  subject::Subject,
};

use crate::{
  AppState, Backend,
  error::ApiError,
  extract::{CurrentSubject, JsonBody, PathParams},
};

/// Load a review for an object-level action, checking the collection rule
/// before the lookup and the ownership rule after it.
async fn authorized_review<S: Backend>(
  state: &AppState<S>,
  subject: &Subject,
  action: Action,
  title_id: i64,
  review_id: i64,
) -> Result<Review, ApiError> {
  authorize(Endpoint::Reviews, subject, action, None)?;
  let review = state
    .store
    .get_review(title_id, review_id)
    .await
    .map_err(Error::from_store)?
    .ok_or_else(|| {
      ApiError::not_found(format!("review {review_id} of title {title_id}"))
    })?;
  authorize(
    Endpoint::Reviews,
    subject,
    action,
    Some(&Resource::owned_by(&review.author)),
  )?;
  Ok(review)
}

/// `GET /titles/{title_id}/reviews/`
pub async fn list<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  PathParams(title_id): PathParams<i64>,
) -> Result<Json<Vec<Review>>, ApiError> {
  authorize(Endpoint::Reviews, &subject, Action::Read, None)?;
  if state
    .store
    .get_title(title_id)
    .await
    .map_err(Error::from_store)?
    .is_none()
  {
    return Err(ApiError::not_found(format!("title {title_id}")));
  }
  let reviews = state
    .store
    .list_reviews(title_id)
    .await
    .map_err(Error::from_store)?;
  Ok(Json(reviews))
}

/// `POST /titles/{title_id}/reviews/`
pub async fn create<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  PathParams(title_id): PathParams<i64>,
  JsonBody(body): JsonBody<ReviewBody>,
) -> Result<impl IntoResponse, ApiError> {
  authorize(Endpoint::Reviews, &subject, Action::Create, None)?;
  let author = subject
    .username()
    .ok_or(Error::Permission(DenyReason::NotAuthenticated))?;
  body.validate()?;
  let review = state
    .store
    .create_review(NewReview {
      title_id,
      author: author.to_owned(),
      text: body.text,
      score: body.score,
    })
    .await
    .map_err(Error::from_store)?;
  tracing::info!(title_id, review_id = review.id, author, "review posted");
  Ok((StatusCode::CREATED, Json(review)))
}

/// `GET /titles/{title_id}/reviews/{review_id}/`
pub async fn get_one<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  PathParams((title_id, review_id)): PathParams<(i64, i64)>,
) -> Result<Json<Review>, ApiError> {
  let review =
    authorized_review(&state, &subject, Action::Read, title_id, review_id)
      .await?;
  Ok(Json(review))
}

/// `PATCH /titles/{title_id}/reviews/{review_id}/`
pub async fn update_one<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  PathParams((title_id, review_id)): PathParams<(i64, i64)>,
  JsonBody(patch): JsonBody<ReviewPatch>,
) -> Result<Json<Review>, ApiError> {
  authorized_review(&state, &subject, Action::Update, title_id, review_id)
    .await?;
  patch.validate()?;
  let review = state
    .store
    .update_review(review_id, patch)
    .await
    .map_err(Error::from_store)?
    .ok_or_else(|| ApiError::not_found(format!("review {review_id}")))?;
  Ok(Json(review))
}

/// `DELETE /titles/{title_id}/reviews/{review_id}/`
pub async fn delete_one<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  PathParams((title_id, review_id)): PathParams<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
  authorized_review(&state, &subject, Action::Delete, title_id, review_id)
    .await?;
  state
    .store
    .delete_review(review_id)
    .await
    .map_err(Error::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}
