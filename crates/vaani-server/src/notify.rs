//! SMS delivery of verification codes.

use std::sync::{Arc, Mutex, PoisonError};

use reqwest::Client;
use thiserror::Error;
use vaani_core::{auth::Notifier, identity::PhoneNumber};

use crate::config::NotifierConfig;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

pub fn message_body(code: &str) -> String {
  format!("Your Prajaavaani verification code is: {code}")
}

#[derive(Debug, Error)]
pub enum NotifyError {
  #[error("sms request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("sms gateway returned {status}: {body}")]
  Rejected { status: u16, body: String },
}

// ─── Log ─────────────────────────────────────────────────────────────────────

/// Development notifier: writes the message, code included, to the log
/// instead of sending it. Never enable outside development.
#[derive(Debug, Clone)]
pub struct LogNotifier {
  country_code: String,
  last_code:    Arc<Mutex<Option<String>>>,
}

impl LogNotifier {
  pub fn new(country_code: impl Into<String>) -> Self {
    Self { country_code: country_code.into(), last_code: Arc::default() }
  }

  /// The most recent code this notifier emitted.
  pub fn last_code(&self) -> Option<String> {
    self.last_code.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }
}

impl Notifier for LogNotifier {
  type Error = NotifyError;

  async fn send_code(&self, to: &PhoneNumber, code: &str) -> Result<(), NotifyError> {
    let to = vaani_core::identity::mask(&to.to_e164(&self.country_code));
    tracing::info!(
      %to,
      dev_only = true,
      body = %message_body(code),
      "sms delivery disabled, logging message"
    );
    *self.last_code.lock().unwrap_or_else(PoisonError::into_inner) = Some(code.to_owned());
    Ok(())
  }
}

// ─── Twilio ──────────────────────────────────────────────────────────────────

/// Sends codes through the Twilio Messages API.
#[derive(Debug, Clone)]
pub struct TwilioNotifier {
  client:       Client,
  base_url:     String,
  account_sid:  String,
  auth_token:   String,
  from_number:  String,
  country_code: String,
}

impl TwilioNotifier {
  pub fn new(
    account_sid: impl Into<String>,
    auth_token: impl Into<String>,
    from_number: impl Into<String>,
    country_code: impl Into<String>,
  ) -> Self {
    Self {
      client:       Client::new(),
      base_url:     TWILIO_API_BASE.into(),
      account_sid:  account_sid.into(),
      auth_token:   auth_token.into(),
      from_number:  from_number.into(),
      country_code: country_code.into(),
    }
  }

  /// Point the client at a different API root.
  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into();
    self
  }

  fn messages_url(&self) -> String {
    format!("{}/Accounts/{}/Messages.json", self.base_url, self.account_sid)
  }
}

impl Notifier for TwilioNotifier {
  type Error = NotifyError;

  async fn send_code(&self, to: &PhoneNumber, code: &str) -> Result<(), NotifyError> {
    let to_e164 = to.to_e164(&self.country_code);
    let body = message_body(code);
    let form = [
      ("To", to_e164.as_str()),
      ("From", self.from_number.as_str()),
      ("Body", body.as_str()),
    ];

    let response = self
      .client
      .post(self.messages_url())
      .basic_auth(&self.account_sid, Some(&self.auth_token))
      .form(&form)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(NotifyError::Rejected { status: status.as_u16(), body });
    }

    tracing::info!(to = %to, "verification sms accepted by gateway");
    Ok(())
  }
}

// ─── Configured ──────────────────────────────────────────────────────────────

/// The notifier selected by [`NotifierConfig`].
#[derive(Debug, Clone)]
pub enum SmsNotifier {
  Log(LogNotifier),
  Twilio(TwilioNotifier),
}

impl SmsNotifier {
  pub fn from_config(config: &NotifierConfig, country_code: &str) -> Self {
    match config {
      NotifierConfig::Log => Self::Log(LogNotifier::new(country_code)),
      NotifierConfig::Twilio { account_sid, auth_token, from_number } => Self::Twilio(
        TwilioNotifier::new(account_sid, auth_token, from_number, country_code),
      ),
    }
  }
}

impl Notifier for SmsNotifier {
  type Error = NotifyError;

  async fn send_code(&self, to: &PhoneNumber, code: &str) -> Result<(), NotifyError> {
    match self {
      Self::Log(n) => n.send_code(to, code).await,
      Self::Twilio(n) => n.send_code(to, code).await,
    }
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use super::*;

  fn phone() -> PhoneNumber { PhoneNumber::parse("9876543210", "91").unwrap() }

  #[test]
  fn body_carries_the_code() {
    assert_eq!(message_body("042042"), "Your Prajaavaani verification code is: 042042");
  }

  #[test]
  fn messages_url_includes_account() {
    let n = TwilioNotifier::new("AC1", "tok", "+15550001111", "91")
      .with_base_url("http://localhost:9");
    assert_eq!(n.messages_url(), "http://localhost:9/Accounts/AC1/Messages.json");
  }

  #[tokio::test]
  async fn log_notifier_always_succeeds() {
    let n = SmsNotifier::from_config(&NotifierConfig::Log, "91");
    assert!(n.send_code(&phone(), "123456").await.is_ok());
  }

  #[tokio::test]
  async fn log_notifier_exposes_the_code() {
    let n = LogNotifier::new("91");
    assert_eq!(n.last_code(), None);

    n.send_code(&phone(), "123456").await.unwrap();
    n.send_code(&phone(), "654321").await.unwrap();
    assert_eq!(n.last_code().as_deref(), Some("654321"));
  }

  /// Serve a stand-in Messages endpoint that records each form and replies
  /// with `status`.
  async fn fake_gateway(
    status: axum::http::StatusCode,
  ) -> (String, std::sync::Arc<std::sync::Mutex<Vec<HashMap<String, String>>>>) {
    use axum::{Form, Router, routing::post};

    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let recorded = std::sync::Arc::clone(&seen);
    let app = Router::new().route(
      "/Accounts/{sid}/Messages.json",
      post(move |headers: axum::http::HeaderMap, Form(form): Form<HashMap<String, String>>| {
        let recorded = std::sync::Arc::clone(&recorded);
        async move {
          assert!(headers.get(axum::http::header::AUTHORIZATION).is_some());
          recorded.lock().unwrap().push(form);
          status
        }
      }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (format!("http://{addr}"), seen)
  }

  #[tokio::test]
  async fn twilio_posts_the_message_form() {
    let (base, seen) = fake_gateway(axum::http::StatusCode::CREATED).await;
    let n = TwilioNotifier::new("AC1", "tok", "+15550001111", "91").with_base_url(base);

    n.send_code(&phone(), "123456").await.unwrap();

    let forms = seen.lock().unwrap();
    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0]["To"], "+919876543210");
    assert_eq!(forms[0]["From"], "+15550001111");
    assert_eq!(forms[0]["Body"], message_body("123456"));
  }

  #[tokio::test]
  async fn gateway_rejection_is_an_error() {
    let (base, _) = fake_gateway(axum::http::StatusCode::BAD_REQUEST).await;
    let n = TwilioNotifier::new("AC1", "tok", "+15550001111", "91").with_base_url(base);

    assert!(matches!(
      n.send_code(&phone(), "123456").await,
      Err(NotifyError::Rejected { status: 400, .. })
    ));
  }

  #[tokio::test]
  async fn unreachable_gateway_is_an_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let n = TwilioNotifier::new("AC1", "tok", "+15550001111", "91")
      .with_base_url(format!("http://{addr}"));
    assert!(matches!(
      n.send_code(&phone(), "123456").await,
      Err(NotifyError::Transport(_))
    ));
  }
}
