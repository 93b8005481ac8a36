//! Request extractors: the calling [`Subject`] and input wrappers whose
//! rejections render as [`ApiError`].

use axum::{
  extract::{FromRequest, FromRequestParts},
  http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use revu_core::subject::Subject;

use crate::{AppState, Backend, error::ApiError};

/// A JSON request body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParams<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

// ─── Bearer auth ─────────────────────────────────────────────────────────────

/// The token in an `Authorization: Bearer <token>` header, if any. Other
/// schemes are ignored.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Bearer ")
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

/// The subject behind the request. Never rejects for a bad token; a caller
/// that cannot be identified is simply anonymous.
pub struct CurrentSubject(pub Subject);

impl<S: Backend> FromRequestParts<AppState<S>> for CurrentSubject {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(&parts.headers);
    let subject = state.identity.resolve_subject(token).await?;
    Ok(CurrentSubject(subject))
  }
}
