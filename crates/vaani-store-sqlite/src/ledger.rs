//! The vote transaction: ledger row and concern counters updated together.
//!
//! Runs synchronously on the connection thread. Each attempt is one
//! `BEGIN IMMEDIATE` transaction, which takes the database write lock before
//! the first read, so two votes on the same concern can never interleave
//! their read-modify-write. That lock is the primary guard; the UNIQUE retry
//! below only matters if some other writer slips a ledger row in first.

use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;
use vaani_core::{
  concern::Concern,
  vote::{LedgerAction, Transition, VotePolicy, VoteType},
};

use crate::{
  Error, Result,
  encode::{RawConcern, decode_vote_type, encode_dt, encode_uuid, encode_vote_type, now},
};

/// How many times a vote is replayed after losing a ledger-insert race.
const MAX_VOTE_ATTEMPTS: usize = 3;

/// `true` if `e` is a UNIQUE constraint failure.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

/// Cast a vote, replaying the whole transaction if the ledger insert hits the
/// (voter, concern) uniqueness guard. The replay reads the row that won the
/// race and so takes the "existing vote" path.
pub fn cast_vote(
  conn: &mut rusqlite::Connection,
  voter_id: Uuid,
  concern_id: Uuid,
  vote_type: VoteType,
  policy: VotePolicy,
) -> Result<Concern> {
  for attempt in 1..=MAX_VOTE_ATTEMPTS {
    match try_cast_vote(conn, voter_id, concern_id, vote_type, policy) {
      Err(Error::Sqlite(e)) if is_unique_violation(&e) => {
        tracing::debug!(%voter_id, %concern_id, attempt, "vote insert lost a race, retrying");
      }
      other => return other,
    }
  }

  Err(
    vaani_core::Error::Conflict(format!(
      "vote on concern {concern_id} kept conflicting after {MAX_VOTE_ATTEMPTS} attempts"
    ))
    .into(),
  )
}

fn try_cast_vote(
  conn: &mut rusqlite::Connection,
  voter_id: Uuid,
  concern_id: Uuid,
  vote_type: VoteType,
  policy: VotePolicy,
) -> Result<Concern> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let voter_str   = encode_uuid(voter_id);
  let concern_str = encode_uuid(concern_id);

  let voter_exists = tx
    .query_row(
      "SELECT 1 FROM identities WHERE identity_id = ?1",
      rusqlite::params![voter_str],
      |_| Ok(()),
    )
    .optional()?
    .is_some();
  if !voter_exists {
    return Err(vaani_core::Error::IdentityNotFound(voter_id.to_string()).into());
  }

  let mut concern = tx
    .query_row(
      &format!("SELECT {} FROM concerns WHERE concern_id = ?1", RawConcern::COLUMNS),
      rusqlite::params![concern_str],
      RawConcern::from_row,
    )
    .optional()?
    .ok_or(vaani_core::Error::ConcernNotFound(concern_id))?
    .into_concern()?;

  policy.check(voter_id, &concern)?;

  let existing = tx
    .query_row(
      "SELECT vote_type FROM votes WHERE voter_id = ?1 AND concern_id = ?2",
      rusqlite::params![voter_str, concern_str],
      |row| row.get::<_, String>(0),
    )
    .optional()?
    .as_deref()
    .map(decode_vote_type)
    .transpose()?;

  let at = now();
  let transition = Transition::plan(existing, vote_type);
  transition.apply(&mut concern, at)?;

  tracing::debug!(
    %voter_id,
    %concern_id,
    ?existing,
    requested = %vote_type,
    ledger = ?transition.ledger,
    "vote transition planned"
  );

  let at_str = encode_dt(at);
  match transition.ledger {
    LedgerAction::Insert(t) => {
      tx.execute(
        "INSERT INTO votes (vote_id, voter_id, concern_id, vote_type, cast_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
          encode_uuid(Uuid::new_v4()),
          voter_str,
          concern_str,
          encode_vote_type(t),
          at_str,
        ],
      )?;
    }
    LedgerAction::Delete => {
      tx.execute(
        "DELETE FROM votes WHERE voter_id = ?1 AND concern_id = ?2",
        rusqlite::params![voter_str, concern_str],
      )?;
    }
    LedgerAction::UpdateTo(t) => {
      tx.execute(
        "UPDATE votes SET vote_type = ?3, cast_at = ?4
         WHERE voter_id = ?1 AND concern_id = ?2",
        rusqlite::params![voter_str, concern_str, encode_vote_type(t), at_str],
      )?;
    }
  }

  tx.execute(
    "UPDATE concerns
     SET upvotes = ?2, downvotes = ?3, net_votes = ?4, updated_at = ?5
     WHERE concern_id = ?1",
    rusqlite::params![
      concern_str,
      concern.upvotes,
      concern.downvotes,
      concern.net_votes,
      at_str,
    ],
  )?;

  tx.commit()?;
  Ok(concern)
}
