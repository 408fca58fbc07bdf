//! One-time passcodes: issuance, single-use consumption, and expiry.
//!
//! [`PasscodeStore`] is the pluggable capability; [`InMemoryPasscodeStore`] is
//! the single-node implementation. A distributed cache with native TTLs can
//! replace it without touching the auth orchestrator.

use std::{
  collections::HashMap,
  convert::Infallible,
  future::Future,
  sync::{Mutex, PoisonError},
};

use chrono::{DateTime, TimeDelta, Utc};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::identity::mask;

pub const DEFAULT_CODE_DIGITS: u32 = 6;

pub const DEFAULT_CODE_TTL_SECS: i64 = 300;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Key → pending code, at most one live code per key.
///
/// `issue` and `consume` must be atomic per key: a consume never observes a
/// code that is half-way through being replaced.
pub trait PasscodeStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  /// Generate a fresh code for `key`, replacing any pending one.
  fn issue<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + 'a;

  /// Remove the pending code for `key` and report whether `candidate`
  /// matched it.
  ///
  /// The entry is removed whether or not the candidate matches, so every
  /// verification attempt is single-shot. Absent and expired entries both
  /// yield `false`.
  fn consume<'a>(
    &'a self,
    key: &'a str,
    candidate: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Drop every expired entry; returns how many were removed.
  fn purge_expired(
    &self,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}

// ─── In-memory implementation ────────────────────────────────────────────────

/// A stored code. Only the digest is kept, never the plaintext.
#[derive(Debug, Clone)]
struct PendingCode {
  digest:     [u8; 32],
  expires_at: DateTime<Utc>,
}

impl PendingCode {
  fn is_expired(&self, now: DateTime<Utc>) -> bool { now >= self.expires_at }
}

/// Process-local passcode store guarded by a single mutex.
#[derive(Debug)]
pub struct InMemoryPasscodeStore {
  ttl:     TimeDelta,
  digits:  u32,
  pending: Mutex<HashMap<String, PendingCode>>,
}

impl Default for InMemoryPasscodeStore {
  fn default() -> Self {
    Self::new(TimeDelta::seconds(DEFAULT_CODE_TTL_SECS), DEFAULT_CODE_DIGITS)
  }
}

impl InMemoryPasscodeStore {
  /// `digits` is clamped to `4..=9` so the code space fits in a `u32`.
  pub fn new(ttl: TimeDelta, digits: u32) -> Self {
    Self {
      ttl,
      digits: digits.clamp(4, 9),
      pending: Mutex::new(HashMap::new()),
    }
  }

  pub fn ttl(&self) -> TimeDelta { self.ttl }

  /// Number of entries currently held, expired or not.
  pub fn len(&self) -> usize { self.lock().len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingCode>> {
    // A panic while holding the lock cannot leave a half-written entry.
    self.pending.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl PasscodeStore for InMemoryPasscodeStore {
  type Error = Infallible;

  async fn issue(&self, key: &str) -> Result<String, Infallible> {
    let code = generate_code(&mut OsRng, self.digits);
    let entry = PendingCode {
      digest:     digest(&code),
      expires_at: Utc::now() + self.ttl,
    };
    self.lock().insert(key.to_owned(), entry);
    tracing::debug!(key = %mask(key), "issued passcode");
    Ok(code)
  }

  async fn consume(&self, key: &str, candidate: &str) -> Result<bool, Infallible> {
    let Some(entry) = self.lock().remove(key) else {
      return Ok(false);
    };
    if entry.is_expired(Utc::now()) {
      tracing::debug!(key = %mask(key), "passcode expired");
      return Ok(false);
    }
    Ok(digests_match(&entry.digest, &digest(candidate)))
  }

  async fn purge_expired(&self) -> Result<usize, Infallible> {
    let now = Utc::now();
    let mut pending = self.lock();
    let before = pending.len();
    pending.retain(|_, entry| !entry.is_expired(now));
    Ok(before - pending.len())
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Draw a zero-padded code uniformly from `0..10^digits`.
///
/// Values from the top of the `u32` range that would bias the modulo are
/// rejected and redrawn.
fn generate_code(rng: &mut impl RngCore, digits: u32) -> String {
  let space = 10u32.pow(digits);
  let zone = space * (u32::MAX / space);
  loop {
    let v = rng.next_u32();
    if v < zone {
      return format!("{:0width$}", v % space, width = digits as usize);
    }
  }
}

fn digest(code: &str) -> [u8; 32] { Sha256::digest(code.as_bytes()).into() }

/// Compare without short-circuiting on the first differing byte.
fn digests_match(a: &[u8; 32], b: &[u8; 32]) -> bool {
  a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
  use rand_core::impls;

  use super::*;

  const KEY: &str = "9876543210";

  #[tokio::test]
  async fn issue_then_consume_succeeds_once() {
    let store = InMemoryPasscodeStore::default();
    let code = store.issue(KEY).await.unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.bytes().all(|b| b.is_ascii_digit()));

    assert!(store.consume(KEY, &code).await.unwrap());
    assert!(!store.consume(KEY, &code).await.unwrap());
  }

  #[tokio::test]
  async fn failed_attempt_burns_the_code() {
    let store = InMemoryPasscodeStore::default();
    let code = store.issue(KEY).await.unwrap();
    let wrong = if code == "000000" { "000001" } else { "000000" };

    assert!(!store.consume(KEY, wrong).await.unwrap());
    assert!(!store.consume(KEY, &code).await.unwrap());
    assert!(store.is_empty());
  }

  #[tokio::test]
  async fn reissue_replaces_previous_code() {
    let store = InMemoryPasscodeStore::default();
    let first = store.issue(KEY).await.unwrap();
    let second = store.issue(KEY).await.unwrap();
    assert_eq!(store.len(), 1);

    if first != second {
      assert!(!store.consume(KEY, &first).await.unwrap());
    } else {
      assert!(store.consume(KEY, &second).await.unwrap());
    }
  }

  #[tokio::test]
  async fn unknown_key_is_false() {
    let store = InMemoryPasscodeStore::default();
    assert!(!store.consume(KEY, "123456").await.unwrap());
  }

  #[tokio::test]
  async fn expired_code_is_rejected_and_purged() {
    let store = InMemoryPasscodeStore::new(TimeDelta::zero(), 6);
    let code = store.issue(KEY).await.unwrap();
    assert!(!store.consume(KEY, &code).await.unwrap());

    store.issue("1111111111").await.unwrap();
    store.issue("2222222222").await.unwrap();
    assert_eq!(store.purge_expired().await.unwrap(), 2);
    assert!(store.is_empty());
  }

  #[tokio::test]
  async fn purge_keeps_live_codes() {
    let store = InMemoryPasscodeStore::default();
    store.issue(KEY).await.unwrap();
    assert_eq!(store.purge_expired().await.unwrap(), 0);
    assert_eq!(store.len(), 1);
  }

  /// Replays a fixed sequence of `u32`s.
  struct Sequence(Vec<u32>);

  impl RngCore for Sequence {
    fn next_u32(&mut self) -> u32 { self.0.remove(0) }

    fn next_u64(&mut self) -> u64 { impls::next_u64_via_u32(self) }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
      impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
      self.fill_bytes(dest);
      Ok(())
    }
  }

  #[test]
  fn codes_are_zero_padded() {
    assert_eq!(generate_code(&mut Sequence(vec![42]), 6), "000042");
  }

  #[test]
  fn biased_tail_is_redrawn() {
    let mut rng = Sequence(vec![u32::MAX, 7]);
    assert_eq!(generate_code(&mut rng, 6), "000007");
  }

  #[test]
  fn digest_comparison() {
    assert!(digests_match(&digest("123456"), &digest("123456")));
    assert!(!digests_match(&digest("123456"), &digest("123457")));
  }
}
