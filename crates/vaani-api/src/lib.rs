//! JSON REST API for Vaani.
//!
//! Exposes an axum [`Router`] backed by any [`Backend`]: a bundle of the
//! store, passcode store, token issuer, and notifier implementations. TLS and
//! transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = vaani_api::api_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod concerns;
pub mod error;
pub mod extract;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use tower_http::trace::TraceLayer;
use vaani_core::{
  auth::{AuthService, Notifier, TokenIssuer},
  passcode::PasscodeStore,
  store::{ConcernStore, IdentityRegistry},
  vote::VotePolicy,
};

pub use error::ApiError;

// ─── Backend ─────────────────────────────────────────────────────────────────

/// The concrete implementations an API instance runs against.
///
/// A type-level bundle so handlers carry one generic parameter instead of
/// four.
pub trait Backend: Send + Sync + 'static {
  type Store: IdentityRegistry + ConcernStore + 'static;
  type Passcodes: PasscodeStore + 'static;
  type Issuer: TokenIssuer + 'static;
  type Notifier: Notifier + 'static;
}

pub type AuthServiceOf<B> = AuthService<
  <B as Backend>::Passcodes,
  <B as Backend>::Store,
  <B as Backend>::Issuer,
  <B as Backend>::Notifier,
>;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<B: Backend> {
  pub store:  Arc<B::Store>,
  pub auth:   Arc<AuthServiceOf<B>>,
  pub policy: VotePolicy,
}

impl<B: Backend> Clone for AppState<B> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      auth:   Arc::clone(&self.auth),
      policy: self.policy,
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the API router with every route nested under `/api/v1`.
///
/// The returned `Router<()>` can be merged into any parent router regardless
/// of its own state type.
pub fn api_router<B: Backend>(state: AppState<B>) -> Router<()> {
  let v1 = Router::new()
    // Auth
    .route("/auth/request-otp", post(auth::request_otp::<B>))
    .route("/auth/verify-otp", post(auth::verify_otp::<B>))
    // Concerns
    .route("/concerns", post(concerns::create::<B>))
    .route("/concerns/leaderboard", get(concerns::leaderboard::<B>))
    .route("/concerns/vote", post(concerns::vote::<B>))
    .route("/concerns/{id}", get(concerns::get_one::<B>))
    .route("/concerns/{id}/vote", get(concerns::my_vote::<B>))
    // Liveness
    .route("/health", get(health));

  Router::new()
    .nest("/api/v1", v1)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// `GET /health`
async fn health() -> &'static str { "ok" }
