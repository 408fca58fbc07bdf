//! The Vaani server: configuration, credentials, SMS delivery, and the
//! wiring that turns them into a running [`vaani_api`] router.

pub mod config;
pub mod jwt;
pub mod notify;

use std::{sync::Arc, time::Duration};

use vaani_api::{AppState, Backend};
use vaani_core::{
  auth::AuthService,
  passcode::{DEFAULT_CODE_DIGITS, InMemoryPasscodeStore, PasscodeStore},
};
use vaani_store_sqlite::SqliteStore;

use config::ServerConfig;
use jwt::JwtIssuer;
use notify::SmsNotifier;

/// The production capability bundle.
pub struct ServerBackend;

impl Backend for ServerBackend {
  type Store = SqliteStore;
  type Passcodes = InMemoryPasscodeStore;
  type Issuer = JwtIssuer;
  type Notifier = SmsNotifier;
}

/// Assemble application state from configuration and an opened store.
pub fn build_state(cfg: &ServerConfig, store: SqliteStore) -> AppState<ServerBackend> {
  let store = Arc::new(store);
  let passcodes = Arc::new(InMemoryPasscodeStore::new(cfg.otp_ttl(), DEFAULT_CODE_DIGITS));
  let issuer = Arc::new(JwtIssuer::new(&cfg.jwt_secret, cfg.jwt_issuer.clone(), cfg.token_ttl()));
  let notifier = Arc::new(SmsNotifier::from_config(&cfg.notifier, &cfg.country_code));

  let auth = AuthService::new(
    passcodes,
    Arc::clone(&store),
    issuer,
    notifier,
    cfg.country_code.clone(),
  );

  AppState { store, auth: Arc::new(auth), policy: cfg.voting }
}

/// Periodically drop expired passcodes so abandoned requests do not
/// accumulate.
pub fn spawn_passcode_purge<P>(
  passcodes: Arc<P>,
  every: Duration,
) -> tokio::task::JoinHandle<()>
where
  P: PasscodeStore + 'static,
{
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      match passcodes.purge_expired().await {
        Ok(0) => {}
        Ok(removed) => tracing::debug!(removed, "purged expired passcodes"),
        Err(e) => {
          let e: vaani_core::Error = e.into();
          tracing::warn!(error = %e, "passcode purge failed");
        }
      }
    }
  })
}

#[cfg(test)]
mod tests {
  use chrono::TimeDelta;

  use super::*;

  #[tokio::test]
  async fn purge_task_clears_expired_codes() {
    let passcodes = Arc::new(InMemoryPasscodeStore::new(TimeDelta::zero(), 6));
    passcodes.issue("9876543210").await.unwrap();
    assert_eq!(passcodes.len(), 1);

    let task = spawn_passcode_purge(Arc::clone(&passcodes), Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(100)).await;
    task.abort();

    assert!(passcodes.is_empty());
  }

  #[tokio::test]
  async fn state_uses_configured_policy() {
    let cfg: ServerConfig = serde_json::from_value(serde_json::json!({
      "store_path": ":memory:",
      "jwt_secret": "0123456789abcdef0123456789abcdef",
      "voting": { "allow_self_vote": false },
    }))
    .unwrap();
    let store = SqliteStore::open_in_memory().await.unwrap();

    let state = build_state(&cfg, store);
    assert!(!state.policy.allow_self_vote);
    assert_eq!(state.auth.country_code(), "91");
    assert_eq!(state.auth.passcodes().ttl(), TimeDelta::seconds(300));
  }
}
