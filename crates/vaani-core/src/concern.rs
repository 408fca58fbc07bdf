//! Concerns: user-submitted items scoped to a geographic location and ranked
//! by net votes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

pub const MAX_TEXT_CHARS: usize = 5000;
pub const MAX_AUTHOR_NAME_CHARS: usize = 100;
pub const MAX_LOCATION_CHARS: usize = 100;

// ─── GeographicLevel ─────────────────────────────────────────────────────────

/// The granularity of the location a concern is scoped to.
///
/// Serialised (and stored) as the upper-case variant name, e.g. `"PINCODE"`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GeographicLevel {
  Region,
  Village,
  Town,
  City,
  Pincode,
  District,
  State,
  Country,
}

impl GeographicLevel {
  /// Human-readable label for the level.
  pub fn display_name(&self) -> &'static str {
    match self {
      Self::Region => "Region",
      Self::Village => "Village",
      Self::Town => "Town",
      Self::City => "City",
      Self::Pincode => "Pincode",
      Self::District => "District",
      Self::State => "State",
      Self::Country => "Country",
    }
  }
}

// ─── Concern ─────────────────────────────────────────────────────────────────

/// A persisted concern with its running score.
///
/// `net_votes` is stored, not derived on read, and always equals
/// `upvotes - downvotes` once a mutation commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concern {
  pub id:                  Uuid,
  /// `None` for anonymous concerns.
  pub author_id:           Option<Uuid>,
  /// Display name captured at posting time; independent of `author_id`.
  pub author_name:         Option<String>,
  pub text:                String,
  pub geographic_level:    GeographicLevel,
  pub location_identifier: String,
  pub upvotes:             i64,
  pub downvotes:           i64,
  pub net_votes:           i64,
  pub created_at:          DateTime<Utc>,
  pub updated_at:          DateTime<Utc>,
}

// ─── NewConcern ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::ConcernStore::create_concern`].
/// Counters and timestamps are always set by the store.
#[derive(Debug, Clone)]
pub struct NewConcern {
  pub author_id:           Option<Uuid>,
  pub author_name:         Option<String>,
  pub text:                String,
  pub geographic_level:    GeographicLevel,
  pub location_identifier: String,
}

impl NewConcern {
  /// Check field shapes and normalise whitespace.
  ///
  /// A blank author name is treated as absent; the location identifier is
  /// trimmed so leaderboard lookups match regardless of stray spaces.
  pub fn validate(mut self) -> Result<Self> {
    if self.text.trim().is_empty() {
      return Err(Error::Validation("concern text cannot be blank".into()));
    }
    if self.text.chars().count() > MAX_TEXT_CHARS {
      return Err(Error::Validation(format!(
        "concern text cannot exceed {MAX_TEXT_CHARS} characters"
      )));
    }

    self.author_name = self
      .author_name
      .map(|n| n.trim().to_owned())
      .filter(|n| !n.is_empty());
    if let Some(name) = &self.author_name
      && name.chars().count() > MAX_AUTHOR_NAME_CHARS
    {
      return Err(Error::Validation(format!(
        "author name cannot exceed {MAX_AUTHOR_NAME_CHARS} characters"
      )));
    }

    self.location_identifier = self.location_identifier.trim().to_owned();
    if self.location_identifier.is_empty() {
      return Err(Error::Validation(
        "location identifier cannot be blank".into(),
      ));
    }
    if self.location_identifier.chars().count() > MAX_LOCATION_CHARS {
      return Err(Error::Validation(format!(
        "location identifier cannot exceed {MAX_LOCATION_CHARS} characters"
      )));
    }

    Ok(self)
  }
}
