//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::Arc;

use uuid::Uuid;
use vaani_core::{
  concern::{Concern, GeographicLevel, NewConcern},
  identity::{Identity, PhoneNumber},
  leaderboard::LeaderboardQuery,
  store::{ConcernStore, IdentityRegistry},
  vote::{VotePolicy, VoteType},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn phone(n: u64) -> PhoneNumber {
  PhoneNumber::parse(&format!("98{n:08}"), "91").unwrap()
}

async fn voter(s: &SqliteStore, n: u64) -> Identity {
  s.create_verified(&phone(n)).await.unwrap()
}

async fn concern_in(s: &SqliteStore, location: &str, text: &str) -> Concern {
  s.create_concern(NewConcern {
    author_id:           None,
    author_name:         None,
    text:                text.into(),
    geographic_level:    GeographicLevel::City,
    location_identifier: location.into(),
  })
  .await
  .unwrap()
}

fn counts(c: &Concern) -> (i64, i64, i64) { (c.upvotes, c.downvotes, c.net_votes) }

fn core_err(e: Error) -> vaani_core::Error { e.into() }

// ─── Identities ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_find_identity() {
  let s = store().await;
  let created = voter(&s, 1).await;
  assert!(created.verified);

  let by_key = s.find_by_external_key(&phone(1)).await.unwrap().unwrap();
  assert_eq!(by_key.id, created.id);
  assert_eq!(by_key.external_key, phone(1));
  assert_eq!(by_key.created_at, created.created_at);

  let by_id = s.get_identity(created.id).await.unwrap().unwrap();
  assert_eq!(by_id.external_key, created.external_key);
}

#[tokio::test]
async fn missing_identity_returns_none() {
  let s = store().await;
  assert!(s.find_by_external_key(&phone(2)).await.unwrap().is_none());
  assert!(s.get_identity(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_external_key_is_conflict() {
  let s = store().await;
  voter(&s, 3).await;
  let err = s.create_verified(&phone(3)).await.unwrap_err();
  assert!(matches!(core_err(err), vaani_core::Error::Conflict(_)));
}

#[tokio::test]
async fn mark_verified_existing_and_missing() {
  let s = store().await;
  let id = voter(&s, 4).await.id;
  let again = s.mark_verified(id).await.unwrap();
  assert!(again.verified);
  assert_eq!(again.id, id);

  let err = s.mark_verified(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(core_err(err), vaani_core::Error::IdentityNotFound(_)));
}

// ─── Concerns ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_concern() {
  let s = store().await;
  let author = voter(&s, 5).await;
  let created = s
    .create_concern(NewConcern {
      author_id:           Some(author.id),
      author_name:         Some("  Asha ".into()),
      text:                "  Broken streetlight on MG Road ".into(),
      geographic_level:    GeographicLevel::Pincode,
      location_identifier: "411001".into(),
    })
    .await
    .unwrap();

  assert_eq!(created.text, "Broken streetlight on MG Road");
  assert_eq!(created.author_name.as_deref(), Some("Asha"));
  assert_eq!(counts(&created), (0, 0, 0));

  let fetched = s.get_concern(created.id).await.unwrap().unwrap();
  assert_eq!(fetched, created);
}

#[tokio::test]
async fn blank_concern_text_is_rejected() {
  let s = store().await;
  let err = s
    .create_concern(NewConcern {
      author_id:           None,
      author_name:         None,
      text:                "   ".into(),
      geographic_level:    GeographicLevel::City,
      location_identifier: "Pune".into(),
    })
    .await
    .unwrap_err();
  assert!(matches!(core_err(err), vaani_core::Error::Validation(_)));
}

#[tokio::test]
async fn get_concern_missing_returns_none() {
  let s = store().await;
  assert!(s.get_concern(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Votes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn vote_sequence_walks_the_transition_table() {
  let s = store().await;
  let v = voter(&s, 10).await.id;
  let c = concern_in(&s, "Pune", "potholes").await.id;
  let policy = VotePolicy::default();

  let after = s.cast_vote(v, c, VoteType::Up, policy).await.unwrap();
  assert_eq!(counts(&after), (1, 0, 1));

  let after = s.cast_vote(v, c, VoteType::Down, policy).await.unwrap();
  assert_eq!(counts(&after), (0, 1, -1));

  let after = s.cast_vote(v, c, VoteType::Up, policy).await.unwrap();
  assert_eq!(counts(&after), (1, 0, 1));

  let after = s.cast_vote(v, c, VoteType::Up, policy).await.unwrap();
  assert_eq!(counts(&after), (0, 0, 0));
  assert!(s.get_vote(v, c).await.unwrap().is_none());

  let after = s.cast_vote(v, c, VoteType::Down, policy).await.unwrap();
  assert_eq!(counts(&after), (0, 1, -1));

  let persisted = s.get_concern(c).await.unwrap().unwrap();
  assert_eq!(persisted, after);
}

#[tokio::test]
async fn two_voters_interleaving_on_one_concern() {
  let s = store().await;
  let a = voter(&s, 12).await.id;
  let b = voter(&s, 13).await.id;
  let c = concern_in(&s, "Pune", "street lights").await.id;
  let policy = VotePolicy::default();

  let after = s.cast_vote(a, c, VoteType::Up, policy).await.unwrap();
  assert_eq!(counts(&after), (1, 0, 1));

  let after = s.cast_vote(b, c, VoteType::Down, policy).await.unwrap();
  assert_eq!(counts(&after), (1, 1, 0));

  let after = s.cast_vote(a, c, VoteType::Down, policy).await.unwrap();
  assert_eq!(counts(&after), (0, 2, -2));

  let after = s.cast_vote(a, c, VoteType::Down, policy).await.unwrap();
  assert_eq!(counts(&after), (0, 1, -1));

  assert!(s.get_vote(a, c).await.unwrap().is_none());
  assert_eq!(s.get_vote(b, c).await.unwrap().unwrap().vote_type, VoteType::Down);
  assert_eq!(s.get_concern(c).await.unwrap().unwrap(), after);
}

#[tokio::test]
async fn change_vote_keeps_a_single_record() {
  let s = store().await;
  let v = voter(&s, 11).await.id;
  let c = concern_in(&s, "Pune", "water supply").await.id;

  s.cast_vote(v, c, VoteType::Up, VotePolicy::default()).await.unwrap();
  s.cast_vote(v, c, VoteType::Down, VotePolicy::default()).await.unwrap();

  let record = s.get_vote(v, c).await.unwrap().unwrap();
  assert_eq!(record.vote_type, VoteType::Down);
  assert_eq!(record.voter_id, v);
  assert_eq!(record.concern_id, c);
}

#[tokio::test]
async fn votes_from_many_voters_accumulate() {
  let s = store().await;
  let c = concern_in(&s, "Pune", "garbage collection").await.id;
  let policy = VotePolicy::default();

  for n in 0..3 {
    let v = voter(&s, 20 + n).await.id;
    s.cast_vote(v, c, VoteType::Up, policy).await.unwrap();
  }
  let v = voter(&s, 30).await.id;
  let after = s.cast_vote(v, c, VoteType::Down, policy).await.unwrap();

  assert_eq!(counts(&after), (3, 1, 2));
  assert_eq!(after.net_votes, after.upvotes - after.downvotes);
}

#[tokio::test]
async fn vote_on_missing_concern_is_not_found() {
  let s = store().await;
  let v = voter(&s, 12).await.id;
  let missing = Uuid::new_v4();
  let err = s
    .cast_vote(v, missing, VoteType::Up, VotePolicy::default())
    .await
    .unwrap_err();
  assert!(matches!(core_err(err), vaani_core::Error::ConcernNotFound(id) if id == missing));
}

#[tokio::test]
async fn vote_by_unknown_voter_is_rejected() {
  let s = store().await;
  let c = concern_in(&s, "Pune", "traffic").await.id;
  let err = s
    .cast_vote(Uuid::new_v4(), c, VoteType::Up, VotePolicy::default())
    .await
    .unwrap_err();
  assert!(matches!(core_err(err), vaani_core::Error::IdentityNotFound(_)));

  let untouched = s.get_concern(c).await.unwrap().unwrap();
  assert_eq!(counts(&untouched), (0, 0, 0));
}

#[tokio::test]
async fn self_vote_rejected_when_policy_forbids_it() {
  let s = store().await;
  let author = voter(&s, 13).await.id;
  let c = s
    .create_concern(NewConcern {
      author_id:           Some(author),
      author_name:         None,
      text:                "noise at night".into(),
      geographic_level:    GeographicLevel::Town,
      location_identifier: "Lonavala".into(),
    })
    .await
    .unwrap()
    .id;

  let strict = VotePolicy { allow_self_vote: false, ..VotePolicy::default() };
  let err = s.cast_vote(author, c, VoteType::Up, strict).await.unwrap_err();
  assert!(matches!(core_err(err), vaani_core::Error::VoteNotPermitted(_)));
  assert!(s.get_vote(author, c).await.unwrap().is_none());

  let after = s
    .cast_vote(author, c, VoteType::Up, VotePolicy::default())
    .await
    .unwrap();
  assert_eq!(counts(&after), (1, 0, 1));
}

#[tokio::test]
async fn concurrent_votes_are_all_counted() {
  let s = Arc::new(store().await);
  let c = concern_in(&s, "Pune", "flooding").await.id;

  let mut voters = Vec::new();
  for n in 0..16 {
    voters.push(voter(&s, 100 + n).await.id);
  }

  let handles: Vec<_> = voters
    .into_iter()
    .enumerate()
    .map(|(i, v)| {
      let s = Arc::clone(&s);
      let t = if i % 4 == 0 { VoteType::Down } else { VoteType::Up };
      tokio::spawn(async move { s.cast_vote(v, c, t, VotePolicy::default()).await })
    })
    .collect();

  for h in handles {
    h.await.unwrap().unwrap();
  }

  let after = s.get_concern(c).await.unwrap().unwrap();
  assert_eq!(counts(&after), (12, 4, 8));
}

#[tokio::test]
async fn concurrent_repeats_from_one_voter_stay_consistent() {
  let s = Arc::new(store().await);
  let c = concern_in(&s, "Pune", "stray dogs").await.id;
  let v = voter(&s, 200).await.id;

  let handles: Vec<_> = (0..5)
    .map(|_| {
      let s = Arc::clone(&s);
      tokio::spawn(async move { s.cast_vote(v, c, VoteType::Up, VotePolicy::default()).await })
    })
    .collect();
  for h in handles {
    h.await.unwrap().unwrap();
  }

  // Five toggles serialise to: up, off, up, off, up.
  let after = s.get_concern(c).await.unwrap().unwrap();
  assert_eq!(counts(&after), (1, 0, 1));
  assert_eq!(s.get_vote(v, c).await.unwrap().unwrap().vote_type, VoteType::Up);
}

// ─── Leaderboard ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn leaderboard_orders_by_net_votes_then_age() {
  let s = store().await;
  let oldest = concern_in(&s, "Pune", "oldest").await;
  let middle = concern_in(&s, "Pune", "middle").await;
  let newest = concern_in(&s, "Pune", "newest").await;

  let v = voter(&s, 300).await.id;
  s.cast_vote(v, newest.id, VoteType::Up, VotePolicy::default()).await.unwrap();
  let w = voter(&s, 301).await.id;
  s.cast_vote(w, oldest.id, VoteType::Down, VotePolicy::default()).await.unwrap();

  let q = LeaderboardQuery::new(GeographicLevel::City, "Pune", 0, None).unwrap();
  let page = s.leaderboard(&q).await.unwrap();

  let order: Vec<_> = page.items.iter().map(|c| c.id).collect();
  assert_eq!(order, vec![newest.id, middle.id, oldest.id]);
  assert_eq!(page.total, 3);
  assert_eq!(page.page_size, 20);
}

#[tokio::test]
async fn leaderboard_ties_break_oldest_first() {
  let s = store().await;
  let first = concern_in(&s, "Nashik", "a").await;
  let second = concern_in(&s, "Nashik", "b").await;
  let third = concern_in(&s, "Nashik", "c").await;

  let q = LeaderboardQuery::new(GeographicLevel::City, "Nashik", 0, None).unwrap();
  let order: Vec<_> = s
    .leaderboard(&q)
    .await
    .unwrap()
    .items
    .into_iter()
    .map(|c| c.id)
    .collect();
  assert_eq!(order, vec![first.id, second.id, third.id]);
}

#[tokio::test]
async fn leaderboard_filters_by_exact_level_and_location() {
  let s = store().await;
  concern_in(&s, "Pune", "in pune").await;
  concern_in(&s, "pune", "different case").await;
  concern_in(&s, "Mumbai", "in mumbai").await;
  s.create_concern(NewConcern {
    author_id:           None,
    author_name:         None,
    text:                "district level".into(),
    geographic_level:    GeographicLevel::District,
    location_identifier: "Pune".into(),
  })
  .await
  .unwrap();

  let q = LeaderboardQuery::new(GeographicLevel::City, "Pune", 0, None).unwrap();
  let page = s.leaderboard(&q).await.unwrap();
  assert_eq!(page.total, 1);
  assert_eq!(page.items[0].text, "in pune");

  let q = LeaderboardQuery::new(GeographicLevel::Village, "Pune", 0, None).unwrap();
  let empty = s.leaderboard(&q).await.unwrap();
  assert!(empty.items.is_empty());
  assert_eq!(empty.total, 0);
}

#[tokio::test]
async fn leaderboard_pages_do_not_overlap() {
  let s = store().await;
  let mut created = Vec::new();
  for i in 0..5 {
    created.push(concern_in(&s, "Thane", &format!("concern {i}")).await.id);
  }

  let mut seen = Vec::new();
  for page in 0..3 {
    let q = LeaderboardQuery::new(GeographicLevel::City, "Thane", page, Some(2)).unwrap();
    let p = s.leaderboard(&q).await.unwrap();
    assert_eq!(p.total, 5);
    assert_eq!(p.total_pages(), 3);
    seen.extend(p.items.into_iter().map(|c| c.id));
  }
  assert_eq!(seen, created);

  let q = LeaderboardQuery::new(GeographicLevel::City, "Thane", 9, Some(2)).unwrap();
  assert!(s.leaderboard(&q).await.unwrap().items.is_empty());
}

// ─── Ledger races ────────────────────────────────────────────────────────────

/// A raw connection holding one voter and one concern, with a temp trigger
/// that slips a competing ledger row in ahead of every vote insert.
fn racing_connection() -> (rusqlite::Connection, Uuid, Uuid) {
  use crate::encode::{encode_dt, encode_uuid, now};

  let conn = rusqlite::Connection::open_in_memory().unwrap();
  conn.execute_batch(crate::schema::SCHEMA).unwrap();

  let voter = Uuid::new_v4();
  let concern = Uuid::new_v4();
  let at = encode_dt(now());
  conn
    .execute(
      "INSERT INTO identities (identity_id, external_key, verified, created_at, updated_at)
       VALUES (?1, '9800000099', 1, ?2, ?2)",
      rusqlite::params![encode_uuid(voter), at],
    )
    .unwrap();
  conn
    .execute(
      "INSERT INTO concerns (concern_id, text, geographic_level, location_identifier,
                             created_at, updated_at)
       VALUES (?1, 'flooding', 'CITY', 'Pune', ?2, ?2)",
      rusqlite::params![encode_uuid(concern), at],
    )
    .unwrap();
  conn
    .execute_batch(
      "CREATE TEMP TRIGGER competing_vote BEFORE INSERT ON votes
       BEGIN
         INSERT INTO votes (vote_id, voter_id, concern_id, vote_type, cast_at)
         VALUES ('rival-' || NEW.vote_id, NEW.voter_id, NEW.concern_id, NEW.vote_type, NEW.cast_at);
       END;",
    )
    .unwrap();

  (conn, voter, concern)
}

#[test]
fn ledger_insert_race_retries_then_conflicts() {
  let (mut conn, voter, concern) = racing_connection();

  let policy = VotePolicy::default();
  let err = crate::ledger::cast_vote(&mut conn, voter, concern, VoteType::Up, policy)
    .unwrap_err();
  assert!(matches!(core_err(err), vaani_core::Error::Conflict(_)));

  // Every attempt rolled back: no ledger rows, counters untouched.
  let votes: i64 = conn
    .query_row("SELECT COUNT(*) FROM votes", [], |row| row.get(0))
    .unwrap();
  assert_eq!(votes, 0);
  let net: i64 = conn
    .query_row("SELECT upvotes + downvotes FROM concerns", [], |row| row.get(0))
    .unwrap();
  assert_eq!(net, 0);
}

#[test]
fn ledger_recovers_once_the_race_clears() {
  let (mut conn, voter, concern) = racing_connection();
  let policy = VotePolicy::default();
  crate::ledger::cast_vote(&mut conn, voter, concern, VoteType::Up, policy).unwrap_err();

  conn.execute_batch("DROP TRIGGER competing_vote;").unwrap();
  let after =
    crate::ledger::cast_vote(&mut conn, voter, concern, VoteType::Up, policy).unwrap();
  assert_eq!(counts(&after), (1, 0, 1));
}
