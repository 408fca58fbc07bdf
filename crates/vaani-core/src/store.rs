//! Storage traits for identities, concerns, and the vote ledger.
//!
//! The traits are implemented by storage backends (e.g. `vaani-store-sqlite`).
//! Higher layers (`vaani-api`, the auth orchestrator) depend on these
//! abstractions, not on any concrete backend.
//!
//! Backend errors convert into [`crate::Error`]: domain failures raised inside
//! a backend (a missing concern, a lost uniqueness race) must surface as their
//! core variant so callers can react to them.

use std::future::Future;

use uuid::Uuid;

use crate::{
  concern::{Concern, NewConcern},
  identity::{Identity, PhoneNumber},
  leaderboard::{LeaderboardQuery, Page},
  vote::{VotePolicy, VoteRecord, VoteType},
};

// ─── Identity registry ───────────────────────────────────────────────────────

/// Durable store of identities keyed by their external key (mobile number).
pub trait IdentityRegistry: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  /// Look up an identity by its external key. Returns `None` if not found.
  fn find_by_external_key<'a>(
    &'a self,
    key: &'a PhoneNumber,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + 'a;

  /// Retrieve an identity by id. Returns `None` if not found.
  fn get_identity(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  /// Create and persist a new, already-verified identity.
  ///
  /// Fails with [`crate::Error::Conflict`] if `key` is already registered.
  fn create_verified<'a>(
    &'a self,
    key: &'a PhoneNumber,
  ) -> impl Future<Output = Result<Identity, Self::Error>> + Send + 'a;

  /// Set `verified = true` on an existing identity and return it.
  fn mark_verified(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Identity, Self::Error>> + Send + '_;
}

// ─── Concern store + vote ledger ─────────────────────────────────────────────

/// Durable store of concerns and the per-(voter, concern) vote ledger.
///
/// Concern score fields are mutated only through [`ConcernStore::cast_vote`].
pub trait ConcernStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  /// Persist a validated concern with zeroed counters.
  fn create_concern(
    &self,
    input: NewConcern,
  ) -> impl Future<Output = Result<Concern, Self::Error>> + Send + '_;

  /// Retrieve a concern by id. Returns `None` if not found.
  fn get_concern(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Concern>, Self::Error>> + Send + '_;

  /// The voter's live vote on a concern, if any.
  fn get_vote(
    &self,
    voter_id: Uuid,
    concern_id: Uuid,
  ) -> impl Future<Output = Result<Option<VoteRecord>, Self::Error>> + Send + '_;

  /// Run the vote transition engine for one intent.
  ///
  /// Loads the concern and the existing vote, checks `policy`, plans the
  /// [`Transition`](crate::vote::Transition), and persists the counter update
  /// and the ledger action together. Must be atomic per concern: concurrent
  /// calls on the same concern never interleave their read-modify-write.
  ///
  /// Fails with [`crate::Error::ConcernNotFound`] or
  /// [`crate::Error::VoteNotPermitted`] before any mutation.
  fn cast_vote(
    &self,
    voter_id: Uuid,
    concern_id: Uuid,
    vote_type: VoteType,
    policy: VotePolicy,
  ) -> impl Future<Output = Result<Concern, Self::Error>> + Send + '_;

  /// Concerns matching the query's exact (level, location) pair, ranked per
  /// [`crate::leaderboard`].
  fn leaderboard<'a>(
    &'a self,
    query: &'a LeaderboardQuery,
  ) -> impl Future<Output = Result<Page<Concern>, Self::Error>> + Send + 'a;
}
