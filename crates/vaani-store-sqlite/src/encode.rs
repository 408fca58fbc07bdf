//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as fixed-width RFC 3339 strings with microsecond
//! precision, so text order equals time order. Enums are stored as their
//! upper-case names. UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use uuid::Uuid;
use vaani_core::{
  concern::{Concern, GeographicLevel},
  identity::{Identity, PhoneNumber},
  vote::{VoteRecord, VoteType},
};

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The current time at the precision the store persists.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn encode_level(level: GeographicLevel) -> String { level.to_string() }

pub fn decode_level(s: &str) -> Result<GeographicLevel> {
  GeographicLevel::from_str(s)
    .map_err(|_| Error::Decode(format!("unknown geographic level: {s:?}")))
}

pub fn encode_vote_type(t: VoteType) -> String { t.to_string() }

pub fn decode_vote_type(s: &str) -> Result<VoteType> {
  VoteType::from_str(s)
    .map_err(|_| Error::Decode(format!("unknown vote type: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from an `identities` row.
pub struct RawIdentity {
  pub identity_id:  String,
  pub external_key: String,
  pub verified:     bool,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawIdentity {
  pub const COLUMNS: &'static str =
    "identity_id, external_key, verified, created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      identity_id:  row.get(0)?,
      external_key: row.get(1)?,
      verified:     row.get(2)?,
      created_at:   row.get(3)?,
      updated_at:   row.get(4)?,
    })
  }

  pub fn into_identity(self) -> Result<Identity> {
    Ok(Identity {
      id:           decode_uuid(&self.identity_id)?,
      external_key: PhoneNumber::try_from(self.external_key)?,
      verified:     self.verified,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `concerns` row.
pub struct RawConcern {
  pub concern_id:          String,
  pub author_id:           Option<String>,
  pub author_name:         Option<String>,
  pub text:                String,
  pub geographic_level:    String,
  pub location_identifier: String,
  pub upvotes:             i64,
  pub downvotes:           i64,
  pub net_votes:           i64,
  pub created_at:          String,
  pub updated_at:          String,
}

impl RawConcern {
  pub const COLUMNS: &'static str = "concern_id, author_id, author_name, text, \
     geographic_level, location_identifier, upvotes, downvotes, net_votes, \
     created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      concern_id:          row.get(0)?,
      author_id:           row.get(1)?,
      author_name:         row.get(2)?,
      text:                row.get(3)?,
      geographic_level:    row.get(4)?,
      location_identifier: row.get(5)?,
      upvotes:             row.get(6)?,
      downvotes:           row.get(7)?,
      net_votes:           row.get(8)?,
      created_at:          row.get(9)?,
      updated_at:          row.get(10)?,
    })
  }

  pub fn into_concern(self) -> Result<Concern> {
    Ok(Concern {
      id:                  decode_uuid(&self.concern_id)?,
      author_id:           self.author_id.as_deref().map(decode_uuid).transpose()?,
      author_name:         self.author_name,
      text:                self.text,
      geographic_level:    decode_level(&self.geographic_level)?,
      location_identifier: self.location_identifier,
      upvotes:             self.upvotes,
      downvotes:           self.downvotes,
      net_votes:           self.net_votes,
      created_at:          decode_dt(&self.created_at)?,
      updated_at:          decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `votes` row.
pub struct RawVote {
  pub vote_id:    String,
  pub voter_id:   String,
  pub concern_id: String,
  pub vote_type:  String,
  pub cast_at:    String,
}

impl RawVote {
  pub const COLUMNS: &'static str = "vote_id, voter_id, concern_id, vote_type, cast_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      vote_id:    row.get(0)?,
      voter_id:   row.get(1)?,
      concern_id: row.get(2)?,
      vote_type:  row.get(3)?,
      cast_at:    row.get(4)?,
    })
  }

  pub fn into_vote(self) -> Result<VoteRecord> {
    Ok(VoteRecord {
      id:         decode_uuid(&self.vote_id)?,
      voter_id:   decode_uuid(&self.voter_id)?,
      concern_id: decode_uuid(&self.concern_id)?,
      vote_type:  decode_vote_type(&self.vote_type)?,
      cast_at:    decode_dt(&self.cast_at)?,
    })
  }
}
