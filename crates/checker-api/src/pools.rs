//! Handlers for `/pools` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/pools/sync` | Body: `{"chainId":10,"alloPoolId":"42","skipEvaluation":false}` |
//! | `GET`  | `/pools` | All pools seen so far |
//! | `GET`  | `/pools/{chainId}/{alloPoolId}/questions` | Current rubric, 404 if the pool is unknown |
//! | `GET`  | `/pools/{chainId}/{alloPoolId}/applications/{alloApplicationId}/evaluations` | 404 if the application is unknown |

use axum::{
  Json,
  extract::{Path, State},
};
use checker_core::{
  Error,
  evaluation::EvaluationWithAnswers,
  indexer::Indexer,
  pool::{Pool, PoolKey},
  reasoner::Reasoner,
  rubric::EvaluationQuestion,
  store::EvaluationStore,
};
use checker_engine::{SyncOutcome, SyncRequest};
use serde::Serialize;

use crate::{AppState, error::ApiError};

// ─── Sync ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
  Synced,
  Partial,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
  pub status:                 SyncStatus,
  pub pool_id:                i64,
  pub created_applications:   usize,
  pub failed_application_ids: Vec<String>,
}

impl From<SyncOutcome> for SyncResponse {
  fn from(outcome: SyncOutcome) -> Self {
    let status = if outcome.is_complete() { SyncStatus::Synced } else { SyncStatus::Partial };
    Self {
      status,
      pool_id: outcome.pool_id,
      created_applications: outcome.created_applications,
      failed_application_ids: outcome.failed_application_ids,
    }
  }
}

/// `POST /pools/sync`
pub async fn sync<S, I, R>(
  State(state): State<AppState<S, I, R>>,
  Json(request): Json<SyncRequest>,
) -> Result<Json<SyncResponse>, ApiError>
where
  S: EvaluationStore + 'static,
  I: Indexer + 'static,
  R: Reasoner + 'static,
{
  let outcome = state.driver.sync(request).await.map_err(ApiError::Sync)?;
  Ok(Json(outcome.into()))
}

// ─── Reads ────────────────────────────────────────────────────────────────────

/// `GET /pools`
pub async fn list<S, I, R>(
  State(state): State<AppState<S, I, R>>,
) -> Result<Json<Vec<Pool>>, ApiError>
where
  S: EvaluationStore + 'static,
  I: Indexer + 'static,
  R: Reasoner + 'static,
{
  let pools = state.store().list_pools().await.map_err(Error::store)?;
  Ok(Json(pools))
}

/// `GET /pools/{chainId}/{alloPoolId}/questions`
pub async fn questions<S, I, R>(
  State(state): State<AppState<S, I, R>>,
  Path((chain_id, allo_pool_id)): Path<(i64, String)>,
) -> Result<Json<Vec<EvaluationQuestion>>, ApiError>
where
  S: EvaluationStore + 'static,
  I: Indexer + 'static,
  R: Reasoner + 'static,
{
  let key = PoolKey::new(chain_id, allo_pool_id);
  let pool = state
    .store()
    .get_pool(key.clone())
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::NotFound(format!("pool {key}")))?;
  let rubric = state.store().get_rubric(pool.id).await.map_err(Error::store)?;
  Ok(Json(rubric))
}

/// `GET /pools/{chainId}/{alloPoolId}/applications/{alloApplicationId}/evaluations`
pub async fn evaluations<S, I, R>(
  State(state): State<AppState<S, I, R>>,
  Path((chain_id, allo_pool_id, allo_application_id)): Path<(i64, String, String)>,
) -> Result<Json<Vec<EvaluationWithAnswers>>, ApiError>
where
  S: EvaluationStore + 'static,
  I: Indexer + 'static,
  R: Reasoner + 'static,
{
  let key = PoolKey::new(chain_id, allo_pool_id);
  let application = state
    .store()
    .get_application(key.clone(), allo_application_id.clone())
    .await
    .map_err(Error::store)?
    .ok_or_else(|| {
      Error::NotFound(format!("application {allo_application_id} in pool {key}"))
    })?;
  let evaluations = state
    .store()
    .evaluations_for_application(application.id)
    .await
    .map_err(Error::store)?;
  Ok(Json(evaluations))
}
