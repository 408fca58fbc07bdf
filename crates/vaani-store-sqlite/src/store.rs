//! [`SqliteStore`] — the SQLite implementation of [`IdentityRegistry`] and
//! [`ConcernStore`].

use std::{path::Path, time::Duration};

use rusqlite::OptionalExtension as _;
use uuid::Uuid;
use vaani_core::{
  concern::{Concern, NewConcern},
  identity::{Identity, PhoneNumber},
  leaderboard::{LeaderboardQuery, Page},
  store::{ConcernStore, IdentityRegistry},
  vote::{VotePolicy, VoteRecord, VoteType},
};

use crate::{
  Result,
  encode::{RawConcern, RawIdentity, RawVote, encode_dt, encode_level, encode_uuid, now},
  ledger::{self, is_unique_violation},
  schema::SCHEMA,
};

/// How long a writer waits for another connection's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Vaani store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn select_identity(
    &self,
    column: &'static str,
    value: String,
  ) -> Result<Option<Identity>> {
    let raw: Option<RawIdentity> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {} FROM identities WHERE {column} = ?1", RawIdentity::COLUMNS),
            rusqlite::params![value],
            RawIdentity::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawIdentity::into_identity).transpose()
  }
}

// ─── IdentityRegistry impl ───────────────────────────────────────────────────

impl IdentityRegistry for SqliteStore {
  type Error = crate::Error;

  async fn find_by_external_key(&self, key: &PhoneNumber) -> Result<Option<Identity>> {
    self
      .select_identity("external_key", key.as_str().to_owned())
      .await
  }

  async fn get_identity(&self, id: Uuid) -> Result<Option<Identity>> {
    self.select_identity("identity_id", encode_uuid(id)).await
  }

  async fn create_verified(&self, key: &PhoneNumber) -> Result<Identity> {
    let at = now();
    let identity = Identity {
      id:           Uuid::new_v4(),
      external_key: key.clone(),
      verified:     true,
      created_at:   at,
      updated_at:   at,
    };

    let id_str  = encode_uuid(identity.id);
    let key_str = key.as_str().to_owned();
    let at_str  = encode_dt(at);

    let inserted: bool = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO identities (identity_id, external_key, verified, created_at, updated_at)
           VALUES (?1, ?2, 1, ?3, ?3)",
          rusqlite::params![id_str, key_str, at_str],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Err(
        vaani_core::Error::Conflict(format!(
          "identity for {} already exists",
          key.masked()
        ))
        .into(),
      );
    }

    tracing::info!(identity_id = %identity.id, phone = %key, "identity created");
    Ok(identity)
  }

  async fn mark_verified(&self, id: Uuid) -> Result<Identity> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(now());

    let raw: Option<RawIdentity> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let updated = tx.execute(
          "UPDATE identities SET verified = 1, updated_at = ?2
           WHERE identity_id = ?1 AND verified = 0",
          rusqlite::params![id_str, at_str],
        )?;
        let raw = tx
          .query_row(
            &format!("SELECT {} FROM identities WHERE identity_id = ?1", RawIdentity::COLUMNS),
            rusqlite::params![id_str],
            RawIdentity::from_row,
          )
          .optional()?;
        tx.commit()?;
        if updated > 0 {
          tracing::info!(identity_id = %id_str, "identity marked verified");
        }
        Ok(raw)
      })
      .await?;

    raw
      .ok_or_else(|| vaani_core::Error::IdentityNotFound(id.to_string()))?
      .into_identity()
  }
}

// ─── ConcernStore impl ───────────────────────────────────────────────────────

impl ConcernStore for SqliteStore {
  type Error = crate::Error;

  async fn create_concern(&self, input: NewConcern) -> Result<Concern> {
    let input = input.validate()?;
    let at = now();
    let concern = Concern {
      id:                  Uuid::new_v4(),
      author_id:           input.author_id,
      author_name:         input.author_name,
      text:                input.text,
      geographic_level:    input.geographic_level,
      location_identifier: input.location_identifier,
      upvotes:             0,
      downvotes:           0,
      net_votes:           0,
      created_at:          at,
      updated_at:          at,
    };

    let id_str       = encode_uuid(concern.id);
    let author_str   = concern.author_id.map(encode_uuid);
    let author_name  = concern.author_name.clone();
    let text         = concern.text.clone();
    let level_str    = encode_level(concern.geographic_level);
    let location     = concern.location_identifier.clone();
    let at_str       = encode_dt(at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO concerns (
             concern_id, author_id, author_name, text,
             geographic_level, location_identifier,
             upvotes, downvotes, net_votes, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0, 0, ?7, ?7)",
          rusqlite::params![
            id_str,
            author_str,
            author_name,
            text,
            level_str,
            location,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    tracing::info!(
      concern_id = %concern.id,
      level = %concern.geographic_level,
      location = %concern.location_identifier,
      "concern created"
    );
    Ok(concern)
  }

  async fn get_concern(&self, id: Uuid) -> Result<Option<Concern>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawConcern> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {} FROM concerns WHERE concern_id = ?1", RawConcern::COLUMNS),
            rusqlite::params![id_str],
            RawConcern::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawConcern::into_concern).transpose()
  }

  async fn get_vote(&self, voter_id: Uuid, concern_id: Uuid) -> Result<Option<VoteRecord>> {
    let voter_str   = encode_uuid(voter_id);
    let concern_str = encode_uuid(concern_id);

    let raw: Option<RawVote> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {} FROM votes WHERE voter_id = ?1 AND concern_id = ?2",
              RawVote::COLUMNS
            ),
            rusqlite::params![voter_str, concern_str],
            RawVote::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawVote::into_vote).transpose()
  }

  async fn cast_vote(
    &self,
    voter_id:   Uuid,
    concern_id: Uuid,
    vote_type:  VoteType,
    policy:     VotePolicy,
  ) -> Result<Concern> {
    let concern = self
      .conn
      .call(move |conn| {
        Ok(ledger::cast_vote(conn, voter_id, concern_id, vote_type, policy))
      })
      .await??;

    tracing::info!(
      %concern_id,
      %voter_id,
      upvotes = concern.upvotes,
      downvotes = concern.downvotes,
      net_votes = concern.net_votes,
      "vote committed"
    );
    Ok(concern)
  }

  async fn leaderboard(&self, query: &LeaderboardQuery) -> Result<Page<Concern>> {
    let level_str  = encode_level(query.level);
    let location   = query.location.clone();
    let limit_val  = i64::try_from(query.limit()).unwrap_or(i64::MAX);
    let offset_val = i64::try_from(query.offset()).unwrap_or(i64::MAX);

    let (raws, total): (Vec<RawConcern>, i64) = self
      .conn
      .call(move |conn| {
        // One read transaction so the count and the page agree.
        let tx = conn.transaction()?;

        let total: i64 = tx.query_row(
          "SELECT COUNT(*) FROM concerns
           WHERE geographic_level = ?1 AND location_identifier = ?2",
          rusqlite::params![level_str, location],
          |row| row.get(0),
        )?;

        let rows = {
          let mut stmt = tx.prepare(&format!(
            "SELECT {} FROM concerns
             WHERE geographic_level = ?1 AND location_identifier = ?2
             ORDER BY net_votes DESC, created_at ASC, rowid ASC
             LIMIT ?3 OFFSET ?4",
            RawConcern::COLUMNS
          ))?;
          stmt
            .query_map(
              rusqlite::params![level_str, location, limit_val, offset_val],
              RawConcern::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        tx.commit()?;
        Ok((rows, total))
      })
      .await?;

    let items = raws
      .into_iter()
      .map(RawConcern::into_concern)
      .collect::<Result<Vec<_>>>()?;

    Ok(Page {
      items,
      page: query.page,
      page_size: query.page_size,
      total: u64::try_from(total).unwrap_or_default(),
    })
  }
}
