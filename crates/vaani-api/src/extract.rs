//! Bearer-credential extractor.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use vaani_core::{Error as CoreError, identity::Identity};

use crate::{AppState, Backend, error::ApiError};

/// The authenticated identity behind the request's bearer credential.
///
/// Present in a handler's arguments means the request carried a valid
/// credential for a verified identity; anything else is rejected with 401.
#[derive(Debug, Clone)]
pub struct Caller(pub Identity);

/// Pull the credential out of `Authorization: Bearer <credential>`.
pub fn bearer_credential(headers: &HeaderMap) -> Option<&str> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
  let (scheme, credential) = value.split_once(' ')?;
  if !scheme.eq_ignore_ascii_case("bearer") {
    return None;
  }
  let credential = credential.trim();
  (!credential.is_empty()).then_some(credential)
}

impl<B: Backend> FromRequestParts<AppState<B>> for Caller {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<B>,
  ) -> Result<Self, Self::Rejection> {
    let credential =
      bearer_credential(&parts.headers).ok_or(CoreError::Unauthorized)?;
    let identity = state.auth.authenticate(credential).await?;
    Ok(Caller(identity))
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    h
  }

  #[test]
  fn parses_bearer_scheme() {
    assert_eq!(bearer_credential(&headers("Bearer abc.def")), Some("abc.def"));
    assert_eq!(bearer_credential(&headers("bearer  abc ")), Some("abc"));
  }

  #[test]
  fn rejects_other_schemes_and_blanks() {
    assert_eq!(bearer_credential(&headers("Basic dXNlcjpwdw==")), None);
    assert_eq!(bearer_credential(&headers("Bearer ")), None);
    assert_eq!(bearer_credential(&headers("Bearer")), None);
    assert_eq!(bearer_credential(&HeaderMap::new()), None);
  }
}
