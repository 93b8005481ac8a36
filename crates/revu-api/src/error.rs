//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use revu_core::Error;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] Error),

  /// The request could not be decoded into the handler's input.
  #[error("bad request: {0}")]
  BadRequest(String),
}

impl ApiError {
  pub fn not_found(what: impl std::fmt::Display) -> Self {
    Self::Core(Error::NotFound(what.to_string()))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::Core(e) => match e {
        Error::Validation(_) | Error::Conflict(_) | Error::InvalidCredential => {
          StatusCode::BAD_REQUEST
        }
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Permission(_) => StatusCode::FORBIDDEN,
        Error::Notification(_) | Error::Token(_) | Error::Store(_) => {
          StatusCode::INTERNAL_SERVER_ERROR
        }
      },
    }
  }

  fn kind(&self) -> &'static str {
    match self {
      Self::BadRequest(_) => "bad_request",
      Self::Core(e) => e.kind(),
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    Self::BadRequest(rejection.body_text())
  }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self {
    Self::BadRequest(rejection.body_text())
  }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self {
    Self::BadRequest(rejection.body_text())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    let body = json!({ "kind": self.kind(), "message": self.to_string() });
    (status, Json(body)).into_response()
  }
}
