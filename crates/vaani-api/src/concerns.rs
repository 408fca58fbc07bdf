//! Handlers for `/concerns` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/concerns` | Bearer; body: [`CreateBody`]; returns 201 + concern |
//! | `GET`  | `/concerns/leaderboard` | `?level&locationIdentifier[&page][&size]` |
//! | `GET`  | `/concerns/:id` | 404 if not found |
//! | `POST` | `/concerns/vote` | Bearer; body: `{"concernId":"...","voteType":"UP"}` |
//! | `GET`  | `/concerns/:id/vote` | Bearer; the caller's vote or `null` |

use axum::{
  Json,
  extract::{Path, Query, State, rejection::{JsonRejection, QueryRejection}},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;
use vaani_core::{
  Error as CoreError,
  concern::{Concern, GeographicLevel, NewConcern},
  leaderboard::{LeaderboardQuery, Page},
  store::ConcernStore,
  vote::{VoteRecord, VoteType},
};

use crate::{AppState, Backend, error::ApiError, extract::Caller};

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
  #[serde(default)]
  pub author_name:         Option<String>,
  pub text:                String,
  pub geographic_level:    GeographicLevel,
  pub location_identifier: String,
}

/// `POST /concerns` — the author is always the authenticated caller.
pub async fn create<B: Backend>(
  State(state): State<AppState<B>>,
  Caller(caller): Caller,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Json(body) = body?;
  let concern = state
    .store
    .create_concern(NewConcern {
      author_id:           Some(caller.id),
      author_name:         body.author_name,
      text:                body.text,
      geographic_level:    body.geographic_level,
      location_identifier: body.location_identifier,
    })
    .await
    .map_err(ApiError::from_backend)?;
  Ok((StatusCode::CREATED, Json(concern)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /concerns/:id`
pub async fn get_one<B: Backend>(
  State(state): State<AppState<B>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Concern>, ApiError> {
  let concern = state
    .store
    .get_concern(id)
    .await
    .map_err(ApiError::from_backend)?
    .ok_or(CoreError::ConcernNotFound(id))?;
  Ok(Json(concern))
}

// ─── Leaderboard ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardParams {
  pub level:               GeographicLevel,
  pub location_identifier: String,
  /// Zero-based. Default 0.
  #[serde(default)]
  pub page:                u32,
  /// Default 20.
  pub size:                Option<u32>,
}

/// `GET /concerns/leaderboard?level=CITY&locationIdentifier=Pune[&page=0][&size=20]`
pub async fn leaderboard<B: Backend>(
  State(state): State<AppState<B>>,
  params: Result<Query<LeaderboardParams>, QueryRejection>,
) -> Result<Json<Page<Concern>>, ApiError> {
  let Query(params) = params?;
  let query = LeaderboardQuery::new(
    params.level,
    params.location_identifier,
    params.page,
    params.size,
  )?;
  let page = state
    .store
    .leaderboard(&query)
    .await
    .map_err(ApiError::from_backend)?;
  Ok(Json(page))
}

// ─── Vote ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteBody {
  pub concern_id: Uuid,
  pub vote_type:  VoteType,
}

/// `POST /concerns/vote`: returns the concern with its updated counters.
pub async fn vote<B: Backend>(
  State(state): State<AppState<B>>,
  Caller(caller): Caller,
  body: Result<Json<VoteBody>, JsonRejection>,
) -> Result<Json<Concern>, ApiError> {
  let Json(body) = body?;
  let concern = state
    .store
    .cast_vote(caller.id, body.concern_id, body.vote_type, state.policy)
    .await
    .map_err(ApiError::from_backend)?;
  Ok(Json(concern))
}

/// `GET /concerns/:id/vote`
pub async fn my_vote<B: Backend>(
  State(state): State<AppState<B>>,
  Caller(caller): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Option<VoteRecord>>, ApiError> {
  let vote = state
    .store
    .get_vote(caller.id, id)
    .await
    .map_err(ApiError::from_backend)?;
  Ok(Json(vote))
}
