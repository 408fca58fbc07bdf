//! Handlers for `/auth` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/request-otp` | Body: `{"mobileNumber":"9876543210"}`; 202 |
//! | `POST` | `/auth/verify-otp` | Body: `{"mobileNumber":"...","otpCode":"123456"}` |

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, Backend, error::ApiError};

// ─── Request code ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOtpBody {
  pub mobile_number: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
  pub message: String,
}

/// `POST /auth/request-otp`
pub async fn request_otp<B: Backend>(
  State(state): State<AppState<B>>,
  body: Result<Json<RequestOtpBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Json(body) = body?;
  let phone = state.auth.request_code(&body.mobile_number).await?;
  Ok((
    StatusCode::ACCEPTED,
    Json(MessageBody {
      message: format!("verification code sent to {}", phone.masked()),
    }),
  ))
}

// ─── Verify code ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpBody {
  pub mobile_number: String,
  pub otp_code:      String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpResponse {
  pub message:              String,
  pub identity_id:          Uuid,
  pub masked_mobile_number: String,
  pub credential:           String,
}

/// `POST /auth/verify-otp`
pub async fn verify_otp<B: Backend>(
  State(state): State<AppState<B>>,
  body: Result<Json<VerifyOtpBody>, JsonRejection>,
) -> Result<Json<VerifyOtpResponse>, ApiError> {
  let Json(body) = body?;
  let session = state
    .auth
    .verify_code(&body.mobile_number, &body.otp_code)
    .await?;

  Ok(Json(VerifyOtpResponse {
    message:              "OTP verified successfully".into(),
    identity_id:          session.identity.id,
    masked_mobile_number: session.masked_external_key,
    credential:           session.credential,
  }))
}
