//! Identity: a verified owner of a mobile number.
//!
//! The external key is the normalised 10-digit national number. It is the
//! lookup key everywhere inside the system and is only ever shown to callers
//! in masked form.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Number of digits in a national mobile number.
pub const NATIONAL_NUMBER_LEN: usize = 10;

// ─── PhoneNumber ─────────────────────────────────────────────────────────────

/// A validated, normalised mobile number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
  /// Parse a caller-supplied number.
  ///
  /// Accepts exactly ten digits, or `country_code` followed by ten digits with
  /// an optional leading `+`. Whitespace around the value is ignored.
  pub fn parse(raw: &str, country_code: &str) -> Result<Self> {
    let trimmed = raw.trim();
    let unprefixed = trimmed.strip_prefix('+').unwrap_or(trimmed);

    if unprefixed.is_empty() || !unprefixed.bytes().all(|b| b.is_ascii_digit()) {
      return Err(Error::Validation(
        "mobile number must contain digits only".into(),
      ));
    }

    let national = if unprefixed.len() == NATIONAL_NUMBER_LEN
      && !trimmed.starts_with('+')
    {
      unprefixed
    } else if let Some(rest) = unprefixed.strip_prefix(country_code)
      && rest.len() == NATIONAL_NUMBER_LEN
      && !country_code.is_empty()
    {
      rest
    } else {
      return Err(Error::Validation(format!(
        "mobile number must be {NATIONAL_NUMBER_LEN} digits"
      )));
    };

    Ok(Self(national.to_owned()))
  }

  /// The normalised national number; used as the identity key.
  pub fn as_str(&self) -> &str { &self.0 }

  /// Render as E.164 (`+<cc><national>`) for SMS delivery.
  pub fn to_e164(&self, country_code: &str) -> String {
    format!("+{country_code}{}", self.0)
  }

  /// Every character except the last four replaced by `*`.
  pub fn masked(&self) -> String { mask(&self.0) }
}

/// Re-validates an already-normalised national number, e.g. one read back
/// from storage.
impl TryFrom<String> for PhoneNumber {
  type Error = Error;

  fn try_from(value: String) -> Result<Self> { Self::parse(&value, "") }
}

impl From<PhoneNumber> for String {
  fn from(p: PhoneNumber) -> Self { p.0 }
}

impl fmt::Display for PhoneNumber {
  /// Displays masked so the raw number never reaches logs by accident.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.masked())
  }
}

/// Replace all but the last four characters of `value` with `*`.
pub fn mask(value: &str) -> String {
  let len = value.chars().count();
  let keep = len.saturating_sub(4);
  value
    .chars()
    .enumerate()
    .map(|(i, c)| if i < keep { '*' } else { c })
    .collect()
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// A user who has proven control of `external_key` at least once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
  pub id:           Uuid,
  /// Normalised mobile number; unique across identities.
  pub external_key: PhoneNumber,
  pub verified:     bool,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_plain_ten_digits() {
    let p = PhoneNumber::parse("9876543210", "91").unwrap();
    assert_eq!(p.as_str(), "9876543210");
  }

  #[test]
  fn strips_country_code() {
    let with_plus = PhoneNumber::parse("+919876543210", "91").unwrap();
    let without = PhoneNumber::parse(" 919876543210 ", "91").unwrap();
    assert_eq!(with_plus.as_str(), "9876543210");
    assert_eq!(with_plus, without);
  }

  #[test]
  fn rejects_bad_shapes() {
    for raw in ["", "98765", "98765432101", "98765-43210", "+9876543210", "+449876543210", "abcdefghij"] {
      assert!(
        matches!(PhoneNumber::parse(raw, "91"), Err(Error::Validation(_))),
        "accepted {raw:?}"
      );
    }
  }

  #[test]
  fn masks_all_but_last_four() {
    let p = PhoneNumber::parse("9876543210", "91").unwrap();
    assert_eq!(p.masked(), "******3210");
    assert_eq!(p.to_string(), "******3210");
    assert_eq!(mask("12"), "12");
  }

  #[test]
  fn renders_e164() {
    let p = PhoneNumber::parse("9876543210", "91").unwrap();
    assert_eq!(p.to_e164("91"), "+919876543210");
  }
}
