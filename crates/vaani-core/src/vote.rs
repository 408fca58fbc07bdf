//! The vote transition engine.
//!
//! A voter holds at most one live vote per concern. Each new intent is
//! resolved against the voter's existing vote into a [`Transition`], which
//! names both the counter delta for the concern and the ledger action for the
//! vote record. Backends execute the plan inside one transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result, concern::Concern};

// ─── VoteType ────────────────────────────────────────────────────────────────

/// Direction of a vote. Also accepts the legacy wire names
/// `UPVOTE`/`DOWNVOTE`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum VoteType {
  #[serde(alias = "UPVOTE")]
  Up,
  #[serde(alias = "DOWNVOTE")]
  Down,
}

// ─── VoteRecord ──────────────────────────────────────────────────────────────

/// The ledger row for one (voter, concern) pair. At most one exists per pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
  pub id:         Uuid,
  pub voter_id:   Uuid,
  pub concern_id: Uuid,
  pub vote_type:  VoteType,
  pub cast_at:    DateTime<Utc>,
}

// ─── Policy ──────────────────────────────────────────────────────────────────

/// Who may vote on what. Both flags default to permissive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotePolicy {
  /// Allow an author to vote on their own concern.
  pub allow_self_vote:               bool,
  /// Allow voting on concerns that have no author identity.
  pub allow_anonymous_concern_votes: bool,
}

impl Default for VotePolicy {
  fn default() -> Self {
    Self { allow_self_vote: true, allow_anonymous_concern_votes: true }
  }
}

impl VotePolicy {
  /// Fail with [`Error::VoteNotPermitted`] if `voter_id` may not vote on
  /// `concern`. Applies equally to casting, changing, and withdrawing.
  pub fn check(&self, voter_id: Uuid, concern: &Concern) -> Result<()> {
    match concern.author_id {
      None if !self.allow_anonymous_concern_votes => Err(Error::VoteNotPermitted(
        "voting on anonymous concerns is disabled".into(),
      )),
      Some(author) if author == voter_id && !self.allow_self_vote => Err(
        Error::VoteNotPermitted("authors cannot vote on their own concerns".into()),
      ),
      _ => Ok(()),
    }
  }
}

// ─── Transition ──────────────────────────────────────────────────────────────

/// What happens to the vote ledger for a given transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerAction {
  Insert(VoteType),
  /// Toggle-off: the same vote type was requested again.
  Delete,
  UpdateTo(VoteType),
}

/// The outcome of resolving a vote intent against the existing vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
  pub upvotes_delta:   i64,
  pub downvotes_delta: i64,
  pub ledger:          LedgerAction,
}

impl Transition {
  /// Resolve `requested` against the voter's `existing` vote, if any.
  pub fn plan(existing: Option<VoteType>, requested: VoteType) -> Self {
    use VoteType::{Down, Up};

    let (upvotes_delta, downvotes_delta, ledger) = match (existing, requested) {
      (None, Up) => (1, 0, LedgerAction::Insert(Up)),
      (None, Down) => (0, 1, LedgerAction::Insert(Down)),
      (Some(Up), Up) => (-1, 0, LedgerAction::Delete),
      (Some(Down), Down) => (0, -1, LedgerAction::Delete),
      (Some(Up), Down) => (-1, 1, LedgerAction::UpdateTo(Down)),
      (Some(Down), Up) => (1, -1, LedgerAction::UpdateTo(Up)),
    };

    Self { upvotes_delta, downvotes_delta, ledger }
  }

  /// Apply the counter delta to `concern` and recompute `net_votes`.
  ///
  /// A counter that would go negative means the ledger and the concern
  /// disagree; this is reported as [`Error::Conflict`] and `concern` is left
  /// untouched.
  pub fn apply(&self, concern: &mut Concern, at: DateTime<Utc>) -> Result<()> {
    let upvotes = concern.upvotes + self.upvotes_delta;
    let downvotes = concern.downvotes + self.downvotes_delta;
    if upvotes < 0 || downvotes < 0 {
      return Err(Error::Conflict(format!(
        "vote counters for concern {} would become negative",
        concern.id
      )));
    }

    concern.upvotes = upvotes;
    concern.downvotes = downvotes;
    concern.net_votes = upvotes - downvotes;
    concern.updated_at = at;
    Ok(())
  }
}
