//! Handlers for `/evaluations` endpoints. All of them require a pool
//! manager's signature, see [`crate::auth`].
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/evaluations` | Record a human evaluation; `evaluationStatus` defaults to rejected |
//! | `POST` | `/evaluations/llm` | Evaluate one application with the LLM now |
//! | `POST` | `/evaluations/questions/recreate` | Regenerate the rubric, dropping the pool's evaluations |

use axum::{Json, extract::State};
use checker_core::{
  evaluation::{EvaluationStatus, EvaluatorType, SummaryInput},
  indexer::Indexer,
  pool::PoolKey,
  reasoner::Reasoner,
  store::EvaluationStore,
};
use checker_engine::RecordRequest;
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  auth::{Signed, authorize},
  error::ApiError,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recorded {
  pub evaluation_id: i64,
}

// ─── Human evaluation ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordBody {
  pub chain_id:            i64,
  pub allo_pool_id:        String,
  pub allo_application_id: String,
  pub cid:                 String,
  pub evaluator:           String,
  pub summary_input:       SummaryInput,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub evaluation_status:   Option<EvaluationStatus>,
}

/// `POST /evaluations`
pub async fn record<S, I, R>(
  State(state): State<AppState<S, I, R>>,
  Json(signed): Json<Signed<RecordBody>>,
) -> Result<Json<Recorded>, ApiError>
where
  S: EvaluationStore + 'static,
  I: Indexer + 'static,
  R: Reasoner + 'static,
{
  let key = PoolKey::new(signed.body.chain_id, signed.body.allo_pool_id.clone());
  authorize(state.engine().indexer(), key.clone(), &signed).await?;

  let body = signed.body;
  let evaluation = state
    .engine()
    .record_evaluation(RecordRequest {
      pool:                key,
      allo_application_id: body.allo_application_id,
      evaluator:           body.evaluator,
      evaluator_type:      EvaluatorType::Human,
      cid:                 body.cid,
      summary:             body.summary_input,
      evaluation_status:   body.evaluation_status,
    })
    .await?;
  Ok(Json(Recorded { evaluation_id: evaluation.id }))
}

// ─── LLM trigger ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerBody {
  pub chain_id:            i64,
  pub allo_pool_id:        String,
  pub allo_application_id: String,
}

/// `POST /evaluations/llm`
pub async fn trigger_llm<S, I, R>(
  State(state): State<AppState<S, I, R>>,
  Json(signed): Json<Signed<TriggerBody>>,
) -> Result<Json<Recorded>, ApiError>
where
  S: EvaluationStore + 'static,
  I: Indexer + 'static,
  R: Reasoner + 'static,
{
  let key = PoolKey::new(signed.body.chain_id, signed.body.allo_pool_id.clone());
  authorize(state.engine().indexer(), key.clone(), &signed).await?;

  let evaluation = state
    .engine()
    .evaluate_application(key, signed.body.allo_application_id)
    .await?;
  Ok(Json(Recorded { evaluation_id: evaluation.id }))
}

// ─── Rubric recreation ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecreateBody {
  pub chain_id:     i64,
  pub allo_pool_id: String,
}

/// `POST /evaluations/questions/recreate`
pub async fn recreate_questions<S, I, R>(
  State(state): State<AppState<S, I, R>>,
  Json(signed): Json<Signed<RecreateBody>>,
) -> Result<Json<Vec<String>>, ApiError>
where
  S: EvaluationStore + 'static,
  I: Indexer + 'static,
  R: Reasoner + 'static,
{
  let key = PoolKey::new(signed.body.chain_id, signed.body.allo_pool_id.clone());
  authorize(state.engine().indexer(), key.clone(), &signed).await?;

  let questions = state.engine().recreate_rubric(key).await?;
  Ok(Json(questions))
}
