//! Error types for `vaani-core`.

use std::convert::Infallible;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed input; raised before any store is touched.
  #[error("validation error: {0}")]
  Validation(String),

  /// The one-time code was missing, expired, or did not match.
  #[error("invalid or expired verification code")]
  InvalidCode,

  /// The code was issued but could not be delivered. It remains usable.
  #[error("failed to deliver verification code: {0}")]
  NotificationFailed(String),

  #[error("identity not found: {0}")]
  IdentityNotFound(String),

  #[error("concern not found: {0}")]
  ConcernNotFound(Uuid),

  /// A uniqueness or counter constraint was violated by a concurrent write.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("unauthorized")]
  Unauthorized,

  #[error("vote not permitted: {0}")]
  VoteNotPermitted(String),

  /// The token issuer could not produce a credential.
  #[error("credential error: {0}")]
  Credential(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<Infallible> for Error {
  fn from(e: Infallible) -> Self { match e {} }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
