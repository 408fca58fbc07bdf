//! Runtime server configuration, deserialised from `config.toml` layered
//! under `VAANI__*` environment variables.

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use serde::Deserialize;
use vaani_core::vote::VotePolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                    String,
  #[serde(default = "default_port")]
  pub port:                    u16,
  pub store_path:              PathBuf,
  /// HMAC secret for signing credentials.
  pub jwt_secret:              String,
  #[serde(default = "default_jwt_issuer")]
  pub jwt_issuer:              String,
  #[serde(default = "default_token_ttl_hours")]
  pub token_ttl_hours:         i64,
  #[serde(default = "default_otp_ttl_secs")]
  pub otp_ttl_secs:            i64,
  #[serde(default = "default_otp_purge_interval_secs")]
  pub otp_purge_interval_secs: u64,
  /// Dialling prefix accepted on input and used for SMS delivery.
  #[serde(default = "default_country_code")]
  pub country_code:            String,
  #[serde(default)]
  pub voting:                  VotePolicy,
  #[serde(default)]
  pub notifier:                NotifierConfig,
}

/// Which SMS delivery backend to use.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NotifierConfig {
  /// Log the message instead of sending it.
  #[default]
  Log,
  Twilio {
    account_sid: String,
    auth_token:  String,
    from_number: String,
  },
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_jwt_issuer() -> String { "vaani".into() }
fn default_token_ttl_hours() -> i64 { 24 }
fn default_otp_ttl_secs() -> i64 { vaani_core::passcode::DEFAULT_CODE_TTL_SECS }
fn default_otp_purge_interval_secs() -> u64 { 60 }
fn default_country_code() -> String { "91".into() }

impl ServerConfig {
  /// Load from an optional TOML file, then environment overrides such as
  /// `VAANI__PORT` or `VAANI__NOTIFIER__KIND`.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("VAANI")
          .prefix_separator("__")
          .separator("__"),
      )
      .build()?
      .try_deserialize()
  }

  pub fn otp_ttl(&self) -> TimeDelta { TimeDelta::seconds(self.otp_ttl_secs) }

  pub fn token_ttl(&self) -> TimeDelta { TimeDelta::hours(self.token_ttl_hours) }

  /// Reject settings that would start a server that cannot work.
  pub fn validate(&self) -> Result<(), String> {
    if self.jwt_secret.len() < 32 {
      return Err("jwt_secret must be at least 32 bytes".into());
    }
    if self.otp_ttl_secs <= 0 || self.token_ttl_hours <= 0 {
      return Err("otp_ttl_secs and token_ttl_hours must be positive".into());
    }
    if self.otp_purge_interval_secs == 0 {
      return Err("otp_purge_interval_secs must be positive".into());
    }
    if self.country_code.is_empty() || !self.country_code.bytes().all(|b| b.is_ascii_digit()) {
      return Err("country_code must be digits only".into());
    }
    Ok(())
  }
}
