//! HS256 JWT credentials.

use chrono::{TimeDelta, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vaani_core::{auth::TokenIssuer, identity::Identity};

/// Claims carried by a Vaani credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  /// The identity's external key (normalised mobile number).
  pub sub:         String,
  pub identity_id: Uuid,
  pub iat:         i64,
  pub exp:         i64,
  pub iss:         String,
  /// Unique per credential.
  pub jti:         String,
}

/// Signs and verifies credentials with a shared secret.
#[derive(Clone)]
pub struct JwtIssuer {
  encoding_key: EncodingKey,
  decoding_key: DecodingKey,
  issuer:       String,
  ttl:          TimeDelta,
}

impl JwtIssuer {
  pub fn new(secret: &str, issuer: impl Into<String>, ttl: TimeDelta) -> Self {
    Self {
      encoding_key: EncodingKey::from_secret(secret.as_bytes()),
      decoding_key: DecodingKey::from_secret(secret.as_bytes()),
      issuer:       issuer.into(),
      ttl,
    }
  }

  /// Verify signature, expiry, and issuer, and return the claims.
  pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.set_issuer(&[&self.issuer]);
    validation.leeway = 0;

    decode::<Claims>(token, &self.decoding_key, &validation).map(|data| data.claims)
  }
}

impl TokenIssuer for JwtIssuer {
  type Error = jsonwebtoken::errors::Error;

  fn issue(&self, identity: &Identity) -> Result<String, Self::Error> {
    let now = Utc::now();
    let claims = Claims {
      sub:         identity.external_key.as_str().to_owned(),
      identity_id: identity.id,
      iat:         now.timestamp(),
      exp:         (now + self.ttl).timestamp(),
      iss:         self.issuer.clone(),
      jti:         Uuid::new_v4().to_string(),
    };
    encode(&Header::default(), &claims, &self.encoding_key)
  }

  fn resolve(&self, credential: &str) -> Result<String, Self::Error> {
    self.verify(credential).map(|claims| claims.sub)
  }
}

#[cfg(test)]
mod tests {
  use vaani_core::identity::PhoneNumber;

  use super::*;

  const SECRET: &str = "0123456789abcdef0123456789abcdef";

  fn identity() -> Identity {
    let now = Utc::now();
    Identity {
      id:           Uuid::new_v4(),
      external_key: PhoneNumber::parse("9876543210", "91").unwrap(),
      verified:     true,
      created_at:   now,
      updated_at:   now,
    }
  }

  #[test]
  fn issue_and_resolve() {
    let issuer = JwtIssuer::new(SECRET, "vaani", TimeDelta::hours(24));
    let who = identity();
    let token = issuer.issue(&who).unwrap();

    assert_eq!(issuer.resolve(&token).unwrap(), "9876543210");
    let claims = issuer.verify(&token).unwrap();
    assert_eq!(claims.identity_id, who.id);
    assert_eq!(claims.iss, "vaani");
    assert_eq!(claims.exp - claims.iat, 24 * 3600);
  }

  #[test]
  fn every_credential_is_unique() {
    let issuer = JwtIssuer::new(SECRET, "vaani", TimeDelta::hours(1));
    let who = identity();
    assert_ne!(issuer.issue(&who).unwrap(), issuer.issue(&who).unwrap());
  }

  #[test]
  fn rejects_garbage_and_foreign_tokens() {
    let ours = JwtIssuer::new(SECRET, "vaani", TimeDelta::hours(1));
    assert!(ours.resolve("not-a-token").is_err());

    let other_secret = JwtIssuer::new("another-secret-another-secret-xx", "vaani", TimeDelta::hours(1));
    let forged = other_secret.issue(&identity()).unwrap();
    assert!(ours.resolve(&forged).is_err());

    let other_issuer = JwtIssuer::new(SECRET, "someone-else", TimeDelta::hours(1));
    let foreign = other_issuer.issue(&identity()).unwrap();
    assert!(ours.resolve(&foreign).is_err());
  }

  #[test]
  fn rejects_expired_tokens() {
    let issuer = JwtIssuer::new(SECRET, "vaani", TimeDelta::seconds(-120));
    let token = issuer.issue(&identity()).unwrap();
    assert!(issuer.resolve(&token).is_err());
  }
}
