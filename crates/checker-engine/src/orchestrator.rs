//! Batched LLM evaluation of a pool's outstanding applications.

use std::{
  collections::{HashMap, HashSet},
  sync::{Arc, Mutex, PoisonError},
};

use checker_core::{
  Error, LLM_EVALUATOR_ADDRESS, Result,
  evaluation::{Evaluation, EvaluatorType},
  indexer::{Indexer, IndexerApplication, IndexerRound},
  pool::{Application, Pool, PoolKey},
  reasoner::{ApplicationSnapshot, Reasoner, RoundSnapshot},
  store::EvaluationStore,
};
use futures::future::join_all;
use tokio::sync::OnceCell;

use crate::{config::Environment, engine::Engine};

// ─── Run-scoped round cache ──────────────────────────────────────────────────

/// A round's prompt snapshot plus its applications by id.
struct RoundData {
  snapshot:     Arc<RoundSnapshot>,
  applications: HashMap<String, IndexerApplication>,
}

impl From<IndexerRound> for RoundData {
  fn from(round: IndexerRound) -> Self {
    let snapshot = Arc::new(RoundSnapshot {
      pool:           round.key(),
      round_metadata: round.round_metadata,
    });
    let applications = round
      .applications
      .into_iter()
      .map(|a| (a.id.clone(), a))
      .collect();
    Self { snapshot, applications }
  }
}

/// Round data fetched at most once per pool for the lifetime of one run.
/// Concurrent items asking for the same pool share one indexer call.
struct RoundCache<'a, I> {
  indexer: &'a I,
  rounds:  Mutex<HashMap<PoolKey, Arc<OnceCell<Arc<RoundData>>>>>,
}

impl<'a, I: Indexer> RoundCache<'a, I> {
  fn new(indexer: &'a I) -> Self {
    Self { indexer, rounds: Mutex::new(HashMap::new()) }
  }

  fn seed(&self, round: IndexerRound) {
    let key = round.key();
    let cell = OnceCell::new_with(Some(Arc::new(RoundData::from(round))));
    self
      .rounds
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(key, Arc::new(cell));
  }

  async fn get(&self, key: &PoolKey) -> Result<Arc<RoundData>> {
    let cell = {
      let mut rounds = self.rounds.lock().unwrap_or_else(PoisonError::into_inner);
      Arc::clone(rounds.entry(key.clone()).or_default())
    };

    let indexer = self.indexer;
    let data = cell
      .get_or_try_init(move || async move {
        let round = indexer
          .round_with_applications(key.clone())
          .await?
          .ok_or_else(|| Error::NotFound(format!("pool {key} on indexer")))?;
        Ok::<_, Error>(Arc::new(RoundData::from(round)))
      })
      .await?;
    Ok(Arc::clone(data))
  }
}

// ─── Orchestration ───────────────────────────────────────────────────────────

impl<S, I, R> Engine<S, I, R>
where
  S: EvaluationStore,
  I: Indexer,
  R: Reasoner,
{
  /// Evaluate every application of `pool` that has no LLM evaluation yet.
  ///
  /// `round` is the indexer data the caller already holds, if any; it seeds
  /// the run's round cache. Returns the application ids whose evaluation
  /// failed. Failures never abort the run.
  pub async fn run_for_pool(
    &self,
    pool: &Pool,
    rubric: &[String],
    round: Option<IndexerRound>,
  ) -> Result<Vec<String>> {
    let pending = self
      .store
      .applications_without_evaluation(pool.id, EvaluatorType::Llm)
      .await
      .map_err(Error::store)?;

    let mut seen = HashSet::new();
    let mut work: Vec<Application> = pending
      .into_iter()
      .filter(|a| seen.insert((a.chain_id, a.allo_application_id.clone())))
      .collect();

    if self.config.environment != Environment::Production
      && work.len() > self.config.development_cap
    {
      tracing::info!(
        pool = %pool.key(),
        pending = work.len(),
        cap = self.config.development_cap,
        "capping evaluations outside production"
      );
      work.truncate(self.config.development_cap);
    }

    if work.is_empty() {
      tracing::debug!(pool = %pool.key(), "no applications need evaluation");
      return Ok(Vec::new());
    }

    let rounds = RoundCache::new(&*self.indexer);
    if let Some(round) = round {
      rounds.seed(round);
    }

    let batch_size = self.config.batch_size.max(1);
    let batches = work.len().div_ceil(batch_size);
    let mut failed = Vec::new();

    for (index, batch) in work.chunks(batch_size).enumerate() {
      if index > 0 {
        tokio::time::sleep(self.config.batch_delay).await;
      }
      tracing::info!(
        pool = %pool.key(),
        batch = index + 1,
        batches,
        items = batch.len(),
        "starting batch"
      );

      let items: Vec<_> = batch
        .iter()
        .map(|app| self.evaluate_item(pool, app, rubric, &rounds))
        .collect();
      let results = join_all(items).await;

      let before = failed.len();
      for (app, result) in batch.iter().zip(results) {
        if let Err(e) = result {
          tracing::warn!(
            pool = %pool.key(),
            application_id = %app.allo_application_id,
            error = %e,
            "evaluation failed"
          );
          failed.push(app.allo_application_id.clone());
        }
      }
      tracing::info!(
        pool = %pool.key(),
        batch = index + 1,
        failed = failed.len() - before,
        "batch finished"
      );
    }

    Ok(failed)
  }

  /// Evaluate one application immediately, outside any batch.
  pub async fn evaluate_application(
    &self,
    key: PoolKey,
    allo_application_id: String,
  ) -> Result<Evaluation> {
    let application = self
      .store
      .get_application(key.clone(), allo_application_id.clone())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| {
        Error::NotFound(format!("application {allo_application_id} in pool {key}"))
      })?;

    let rubric = self
      .store
      .get_rubric(application.pool_id)
      .await
      .map_err(Error::store)?;
    if rubric.is_empty() {
      return Err(Error::NotFound(format!("rubric of pool {key}")));
    }

    let indexed = self
      .indexer
      .application_with_round(key.clone(), allo_application_id.clone())
      .await?
      .ok_or_else(|| {
        Error::NotFound(format!("application {allo_application_id} in pool {key} on indexer"))
      })?;

    let round = Arc::new(RoundSnapshot {
      pool:           key,
      round_metadata: indexed.round_metadata,
    });
    let rubric = crate::rubric::texts(&rubric);
    self
      .evaluate_with(&application, &rubric, round, &indexed.application)
      .await
  }

  async fn evaluate_item(
    &self,
    pool: &Pool,
    application: &Application,
    rubric: &[String],
    rounds: &RoundCache<'_, I>,
  ) -> Result<Evaluation> {
    let round = rounds.get(&pool.key()).await?;
    let indexed = round
      .applications
      .get(&application.allo_application_id)
      .ok_or_else(|| {
        Error::NotFound(format!(
          "application {} in pool {} on indexer",
          application.allo_application_id,
          pool.key()
        ))
      })?;
    self
      .evaluate_with(application, rubric, Arc::clone(&round.snapshot), indexed)
      .await
  }

  async fn evaluate_with(
    &self,
    application: &Application,
    rubric: &[String],
    round: Arc<RoundSnapshot>,
    indexed: &IndexerApplication,
  ) -> Result<Evaluation> {
    let snapshot = ApplicationSnapshot {
      round,
      allo_application_id: application.allo_application_id.clone(),
      project_id: indexed.project_id.clone(),
      metadata: indexed.metadata.clone(),
    };
    let summary = self.reasoner.evaluate(rubric, &snapshot).await?;

    self
      .write_evaluation(
        application,
        LLM_EVALUATOR_ADDRESS.to_owned(),
        EvaluatorType::Llm,
        indexed.metadata_cid.clone(),
        &summary,
        None,
      )
      .await
  }
}
