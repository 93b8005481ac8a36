//! Handlers for `/auth` endpoints. Both are open to anonymous callers.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/signup/` | Body: `{"username":..,"email":..}`; mails a code |
//! | `POST` | `/auth/token/`  | Body: `{"username":..,"confirmation_code":..}` |

use axum::{Json, extract::State};
use revu_core::identity::{AccessToken, Signup, TokenRequest};

use crate::{AppState, Backend, error::ApiError, extract::JsonBody};

/// `POST /auth/signup/`
pub async fn signup<S: Backend>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<Signup>,
) -> Result<Json<Signup>, ApiError> {
  Ok(Json(state.identity.signup(body).await?))
}

/// `POST /auth/token/`
pub async fn token<S: Backend>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<TokenRequest>,
) -> Result<Json<AccessToken>, ApiError> {
  Ok(Json(state.identity.issue_token(body).await?))
}
