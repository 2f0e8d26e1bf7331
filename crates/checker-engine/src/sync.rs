//! The per-pool sync: indexer → pool → rubric → applications → evaluations.

use std::sync::Arc;

use checker_core::{
  Error, Result,
  indexer::{Indexer, IndexerRound},
  pool::{NewApplication, Pool, PoolKey},
  reasoner::{Reasoner, RoundSnapshot},
  store::EvaluationStore,
};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::task::JoinError;

use crate::{coalesce::Coalescer, engine::Engine, rubric};

/// Input to [`SyncDriver::sync`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
  pub chain_id:        i64,
  pub allo_pool_id:    String,
  #[serde(default)]
  pub skip_evaluation: bool,
}

impl SyncRequest {
  pub fn key(&self) -> PoolKey { PoolKey::new(self.chain_id, self.allo_pool_id.clone()) }
}

/// The result of a sync that reached its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
  pub pool_id:                i64,
  /// Applications created by this sync; existing ones are not counted.
  pub created_applications:   usize,
  pub evaluations_skipped:    bool,
  /// Applications whose evaluation failed and are left for a later sync.
  pub failed_application_ids: Vec<String>,
}

impl SyncOutcome {
  /// `true` when nothing was left unevaluated.
  pub fn is_complete(&self) -> bool { self.failed_application_ids.is_empty() }
}

/// What the store phase of a sync leaves for the evaluation phase.
#[derive(Debug, Clone)]
struct Synced {
  pool:    Pool,
  round:   Arc<IndexerRound>,
  rubric:  Arc<[String]>,
  created: usize,
}

impl Synced {
  fn outcome(&self, skipped: bool, failed_application_ids: Vec<String>) -> SyncOutcome {
    tracing::info!(
      pool = %self.pool.key(),
      created = self.created,
      failed = failed_application_ids.len(),
      "sync: done"
    );
    SyncOutcome {
      pool_id: self.pool.id,
      created_applications: self.created,
      evaluations_skipped: skipped,
      failed_application_ids,
    }
  }
}

fn lost(e: JoinError) -> Arc<Error> { Arc::new(Error::Aborted(format!("sync task: {e}"))) }

/// Runs pool syncs, coalescing concurrent and closely repeated requests per
/// pool.
///
/// A sync has two phases, each coalesced on the [`PoolKey`]: the store phase
/// (indexer, pool, rubric, applications) and the evaluation phase. Requests
/// that differ only in `skip_evaluation` share the store phase; only those
/// that want evaluations join the evaluation phase. Errors are shared between
/// coalesced callers, hence `Arc<Error>`.
pub struct SyncDriver<S, I, R> {
  engine:      Engine<S, I, R>,
  syncs:       Arc<Coalescer<PoolKey, Synced, Arc<Error>>>,
  evaluations: Arc<Coalescer<PoolKey, Vec<String>, Arc<Error>>>,
}

impl<S, I, R> Clone for SyncDriver<S, I, R> {
  fn clone(&self) -> Self {
    Self {
      engine:      self.engine.clone(),
      syncs:       Arc::clone(&self.syncs),
      evaluations: Arc::clone(&self.evaluations),
    }
  }
}

impl<S, I, R> SyncDriver<S, I, R>
where
  S: EvaluationStore + 'static,
  I: Indexer + 'static,
  R: Reasoner + 'static,
{
  pub fn new(engine: Engine<S, I, R>) -> Self {
    let window = engine.config.sync_window;
    Self {
      engine,
      syncs: Arc::new(Coalescer::new(window, lost)),
      evaluations: Arc::new(Coalescer::new(window, lost)),
    }
  }

  pub fn engine(&self) -> &Engine<S, I, R> { &self.engine }

  /// Sync one pool. A caller joins the pool's run if one is in flight or
  /// started within the sync window, whatever its outcome. Runs are spawned,
  /// so they finish even if the caller goes away.
  pub async fn sync(&self, request: SyncRequest) -> Result<SyncOutcome, Arc<Error>> {
    let key = request.key();

    let engine = self.engine.clone();
    let pool = key.clone();
    let synced = self
      .syncs
      .run(key.clone(), move || {
        async move { engine.store_phase(pool).await.map_err(Arc::new) }.boxed()
      })
      .await?;

    if request.skip_evaluation {
      tracing::info!(pool = %key, "sync: skipping evaluations");
      return Ok(synced.outcome(true, Vec::new()));
    }

    let engine = self.engine.clone();
    let base = synced.clone();
    let failed = self
      .evaluations
      .run(key, move || {
        async move { engine.evaluation_phase(&base).await.map_err(Arc::new) }.boxed()
      })
      .await?;
    Ok(synced.outcome(false, failed))
  }
}

impl<S, I, R> Engine<S, I, R>
where
  S: EvaluationStore,
  I: Indexer,
  R: Reasoner,
{
  /// One uncoalesced pass of the sync state machine. Steps already
  /// committed when a later step fails are kept.
  pub async fn sync_pool(&self, request: SyncRequest) -> Result<SyncOutcome> {
    let synced = self.store_phase(request.key()).await?;
    if request.skip_evaluation {
      tracing::info!(pool = %synced.pool.key(), "sync: skipping evaluations");
      return Ok(synced.outcome(true, Vec::new()));
    }
    let failed = self.evaluation_phase(&synced).await?;
    Ok(synced.outcome(false, failed))
  }

  async fn store_phase(&self, key: PoolKey) -> Result<Synced> {
    tracing::info!(pool = %key, "sync: fetching indexer");
    let round = self
      .indexer
      .round_with_applications(key.clone())
      .await?
      .ok_or_else(|| Error::NotFound(format!("pool {key} on indexer")))?;

    tracing::debug!(pool = %key, "sync: upserting pool");
    let pool = self.store.upsert_pool(key.clone()).await.map_err(Error::store)?;

    tracing::debug!(pool = %key, pool_id = pool.id, "sync: resolving rubric");
    let snapshot = RoundSnapshot {
      pool:           key.clone(),
      round_metadata: round.round_metadata.clone(),
    };
    let rubric = self.resolve_rubric(&pool, &snapshot).await?;

    tracing::debug!(
      pool = %key,
      applications = round.applications.len(),
      "sync: upserting applications"
    );
    let incoming = round
      .applications
      .iter()
      .map(|a| NewApplication {
        allo_application_id: a.id.clone(),
        profile_id:          a.project_id.clone(),
      })
      .collect();
    let created = self
      .store
      .upsert_applications(pool.clone(), incoming)
      .await
      .map_err(Error::store)?;

    Ok(Synced {
      pool,
      round: Arc::new(round),
      rubric: rubric::texts(&rubric),
      created: created.len(),
    })
  }

  async fn evaluation_phase(&self, synced: &Synced) -> Result<Vec<String>> {
    tracing::info!(pool = %synced.pool.key(), "sync: running evaluations");
    let round = IndexerRound::clone(&synced.round);
    self.run_for_pool(&synced.pool, &synced.rubric, Some(round)).await
  }
}
