//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, QueryRejection},
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use vaani_core::Error as CoreError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] CoreError),

  /// The request body or query string could not be decoded.
  #[error("bad request: {0}")]
  BadRequest(String),
}

impl ApiError {
  /// Convert any backend error through the core taxonomy.
  pub fn from_backend(e: impl Into<CoreError>) -> Self { Self::Core(e.into()) }

  fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Core(e) => match e {
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::InvalidCode | CoreError::Unauthorized => StatusCode::UNAUTHORIZED,
        CoreError::NotificationFailed(_) => StatusCode::BAD_GATEWAY,
        CoreError::IdentityNotFound(_) | CoreError::ConcernNotFound(_) => {
          StatusCode::NOT_FOUND
        }
        CoreError::Conflict(_) => StatusCode::CONFLICT,
        CoreError::VoteNotPermitted(_) => StatusCode::FORBIDDEN,
        CoreError::Credential(_) | CoreError::Store(_) => {
          StatusCode::INTERNAL_SERVER_ERROR
        }
      },
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(r: JsonRejection) -> Self { ApiError::BadRequest(r.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(r: QueryRejection) -> Self { ApiError::BadRequest(r.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }

    let mut res = (status, Json(json!({ "error": self.to_string() }))).into_response();
    if matches!(self, ApiError::Core(CoreError::Unauthorized)) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Bearer realm=\"vaani\""),
      );
    }
    res
  }
}
