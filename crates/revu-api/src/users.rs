//! Handlers for `/users` endpoints.
//!
//! The collection is reserved for admins and superusers. `/users/me/` is
//! open to any authenticated caller and never changes the caller's role.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use revu_core::{
  Error,
  account::{AccountPatch, NewAccount, Profile},
  policy::{Action, Endpoint, authorize},
};
use serde::Deserialize;

use crate::{
  AppState, Backend,
  error::ApiError,
  extract::{CurrentSubject, JsonBody, PathParams, QueryParams},
};

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
  pub search: Option<String>,
}

// ─── Collection ──────────────────────────────────────────────────────────────

/// `GET /users/[?search=<substring>]`
pub async fn list<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  QueryParams(params): QueryParams<SearchParams>,
) -> Result<Json<Vec<Profile>>, ApiError> {
  authorize(Endpoint::Users, &subject, Action::Read, None)?;
  let accounts = state
    .store
    .list_accounts(params.search)
    .await
    .map_err(Error::from_store)?;
  Ok(Json(accounts.iter().map(Profile::from).collect()))
}

/// `POST /users/`
pub async fn create<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  JsonBody(body): JsonBody<NewAccount>,
) -> Result<impl IntoResponse, ApiError> {
  authorize(Endpoint::Users, &subject, Action::Create, None)?;
  let account = state
    .store
    .upsert_account(body.into_account()?)
    .await
    .map_err(Error::from_store)?;
  tracing::info!(username = %account.username, role = %account.role, "account created");
  Ok((StatusCode::CREATED, Json(Profile::from(&account))))
}

// ─── By username ─────────────────────────────────────────────────────────────

/// `GET /users/{username}/`
pub async fn get_one<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  PathParams(username): PathParams<String>,
) -> Result<Json<Profile>, ApiError> {
  authorize(Endpoint::Users, &subject, Action::Read, None)?;
  let account = state
    .store
    .get_account(&username)
    .await
    .map_err(Error::from_store)?
    .ok_or_else(|| ApiError::not_found(format!("account {username:?}")))?;
  Ok(Json(Profile::from(&account)))
}

/// `PATCH /users/{username}/`; the role may be changed here.
pub async fn update_one<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  PathParams(username): PathParams<String>,
  JsonBody(patch): JsonBody<AccountPatch>,
) -> Result<Json<Profile>, ApiError> {
  authorize(Endpoint::Users, &subject, Action::Update, None)?;
  patch.validate()?;
  let account = state
    .store
    .get_account(&username)
    .await
    .map_err(Error::from_store)?
    .ok_or_else(|| ApiError::not_found(format!("account {username:?}")))?;
  let account = state
    .store
    .update_account(account.account_id, patch)
    .await
    .map_err(Error::from_store)?
    .ok_or_else(|| ApiError::not_found(format!("account {username:?}")))?;
  Ok(Json(Profile::from(&account)))
}

/// `DELETE /users/{username}/`
pub async fn delete_one<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  PathParams(username): PathParams<String>,
) -> Result<StatusCode, ApiError> {
  authorize(Endpoint::Users, &subject, Action::Delete, None)?;
  let deleted = state
    .store
    .delete_account(&username)
    .await
    .map_err(Error::from_store)?;
  if !deleted {
    return Err(ApiError::not_found(format!("account {username:?}")));
  }
  tracing::info!(%username, "account deleted");
  Ok(StatusCode::NO_CONTENT)
}

// ─── Own profile ─────────────────────────────────────────────────────────────

/// `GET /users/me/`
pub async fn get_me<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
) -> Result<Json<Profile>, ApiError> {
  authorize(Endpoint::OwnProfile, &subject, Action::Read, None)?;
  let account = state.identity.current_account(&subject).await?;
  Ok(Json(Profile::from(&account)))
}

/// `PATCH /users/me/`; a `role` in the body is ignored.
pub async fn update_me<S: Backend>(
  State(state): State<AppState<S>>,
  CurrentSubject(subject): CurrentSubject,
  JsonBody(patch): JsonBody<AccountPatch>,
) -> Result<Json<Profile>, ApiError> {
  authorize(Endpoint::OwnProfile, &subject, Action::Update, None)?;
  let account = state.identity.update_own_profile(&subject, patch).await?;
  Ok(Json(Profile::from(&account)))
}
