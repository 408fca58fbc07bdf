//! The auth orchestrator: request a one-time code, verify it, receive a
//! bearer credential.
//!
//! [`AuthService`] coordinates four injected collaborators: a
//! [`PasscodeStore`], an [`IdentityRegistry`], a [`TokenIssuer`], and a
//! [`Notifier`]. It owns no ambient state of its own.

use std::{future::Future, sync::Arc};

use serde::Serialize;
use tracing::{info, warn};

use crate::{
  Error, Result,
  identity::{Identity, PhoneNumber},
  passcode::PasscodeStore,
  store::IdentityRegistry,
};

// ─── Collaborator traits ─────────────────────────────────────────────────────

/// Issues opaque bearer credentials and recovers the identity key from them.
pub trait TokenIssuer: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Produce a credential bound to `identity.external_key`.
  fn issue(&self, identity: &Identity) -> Result<String, Self::Error>;

  /// Recover the external key a credential was issued for. Fails for
  /// malformed, forged, or expired credentials.
  fn resolve(&self, credential: &str) -> Result<String, Self::Error>;
}

/// Delivers a code to the owner of a phone number.
pub trait Notifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn send_code<'a>(
    &'a self,
    to: &'a PhoneNumber,
    code: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// The outcome of a successful verification.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedSession {
  pub identity:            Identity,
  /// The external key with all but the last four characters masked.
  pub masked_external_key: String,
  pub credential:          String,
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

pub struct AuthService<P, R, T, N> {
  passcodes:    Arc<P>,
  registry:     Arc<R>,
  issuer:       Arc<T>,
  notifier:     Arc<N>,
  country_code: String,
}

impl<P, R, T, N> AuthService<P, R, T, N>
where
  P: PasscodeStore,
  R: IdentityRegistry,
  T: TokenIssuer,
  N: Notifier,
{
  pub fn new(
    passcodes: Arc<P>,
    registry: Arc<R>,
    issuer: Arc<T>,
    notifier: Arc<N>,
    country_code: impl Into<String>,
  ) -> Self {
    Self { passcodes, registry, issuer, notifier, country_code: country_code.into() }
  }

  pub fn passcodes(&self) -> &Arc<P> { &self.passcodes }

  pub fn country_code(&self) -> &str { &self.country_code }

  /// Issue a fresh code for `mobile_number` and hand it to the notifier.
  ///
  /// A notifier failure surfaces as [`Error::NotificationFailed`], but the
  /// issued code is not withdrawn.
  pub async fn request_code(&self, mobile_number: &str) -> Result<PhoneNumber> {
    let phone = PhoneNumber::parse(mobile_number, &self.country_code)?;

    let code = self
      .passcodes
      .issue(phone.as_str())
      .await
      .map_err(Into::<Error>::into)?;

    if let Err(e) = self.notifier.send_code(&phone, &code).await {
      warn!(phone = %phone, error = %e, "failed to deliver verification code");
      return Err(Error::NotificationFailed(e.to_string()));
    }

    info!(phone = %phone, "verification code sent");
    Ok(phone)
  }

  /// Consume `code` for `mobile_number`; on success find or create the
  /// identity, mark it verified, and issue a credential.
  pub async fn verify_code(
    &self,
    mobile_number: &str,
    code: &str,
  ) -> Result<VerifiedSession> {
    let phone = PhoneNumber::parse(mobile_number, &self.country_code)?;
    let code = code.trim();
    if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
      return Err(Error::Validation("code must contain digits only".into()));
    }

    let matched = self
      .passcodes
      .consume(phone.as_str(), code)
      .await
      .map_err(Into::<Error>::into)?;
    if !matched {
      warn!(phone = %phone, "verification code rejected");
      return Err(Error::InvalidCode);
    }

    let identity = self.verified_identity(&phone).await?;
    let credential = self
      .issuer
      .issue(&identity)
      .map_err(|e| Error::Credential(e.to_string()))?;

    info!(phone = %phone, identity_id = %identity.id, "verification succeeded");
    Ok(VerifiedSession {
      masked_external_key: phone.masked(),
      identity,
      credential,
    })
  }

  /// Resolve a bearer credential to a verified identity.
  pub async fn authenticate(&self, credential: &str) -> Result<Identity> {
    let key = self
      .issuer
      .resolve(credential)
      .map_err(|_| Error::Unauthorized)?;
    let phone = PhoneNumber::try_from(key).map_err(|_| Error::Unauthorized)?;

    self
      .registry
      .find_by_external_key(&phone)
      .await
      .map_err(Into::<Error>::into)?
      .filter(|identity| identity.verified)
      .ok_or(Error::Unauthorized)
  }

  /// Find, create, or promote the identity for `phone` so that it ends up
  /// verified.
  ///
  /// If a concurrent verification creates the identity between our lookup and
  /// our insert, the insert fails with [`Error::Conflict`] and we take the
  /// "already exists" path instead.
  async fn verified_identity(&self, phone: &PhoneNumber) -> Result<Identity> {
    let existing = self
      .registry
      .find_by_external_key(phone)
      .await
      .map_err(Into::<Error>::into)?;

    let existing = match existing {
      Some(identity) => identity,
      None => match self.registry.create_verified(phone).await.map_err(Into::<Error>::into) {
        Ok(identity) => {
          info!(phone = %phone, identity_id = %identity.id, "registered new identity");
          return Ok(identity);
        }
        Err(Error::Conflict(_)) => self
          .registry
          .find_by_external_key(phone)
          .await
          .map_err(Into::<Error>::into)?
          .ok_or_else(|| Error::IdentityNotFound(phone.masked()))?,
        Err(e) => return Err(e),
      },
    };

    if existing.verified {
      return Ok(existing);
    }
    self
      .registry
      .mark_verified(existing.id)
      .await
      .map_err(Into::<Error>::into)
  }
}
