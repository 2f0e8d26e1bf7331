//! Rubric resolution: reuse a stored rubric, or generate one with retries.

use std::sync::Arc;

use checker_core::{
  Error, Result,
  indexer::Indexer,
  pool::{Pool, PoolKey},
  reasoner::{Reasoner, RoundSnapshot},
  rubric::EvaluationQuestion,
  store::EvaluationStore,
};

use crate::engine::Engine;

impl<S, I, R> Engine<S, I, R>
where
  S: EvaluationStore,
  I: Indexer,
  R: Reasoner,
{
  /// The pool's rubric. A stored non-empty rubric is returned as-is;
  /// otherwise one is generated and stored.
  pub async fn resolve_rubric(
    &self,
    pool: &Pool,
    round: &RoundSnapshot,
  ) -> Result<Vec<EvaluationQuestion>> {
    let existing = self.store.get_rubric(pool.id).await.map_err(Error::store)?;
    if !existing.is_empty() {
      tracing::debug!(pool = %pool.key(), questions = existing.len(), "reusing rubric");
      return Ok(existing);
    }
    self.generate_rubric(pool, round).await
  }

  /// Generate and store a fresh rubric for a pool that already exists,
  /// discarding the current one and every evaluation written against it.
  /// Returns the new question texts.
  pub async fn recreate_rubric(&self, key: PoolKey) -> Result<Vec<String>> {
    let pool = self
      .store
      .get_pool(key.clone())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(format!("pool {key}")))?;

    let round = self
      .indexer
      .round_with_applications(key.clone())
      .await?
      .ok_or_else(|| Error::NotFound(format!("pool {key} on indexer")))?;
    let snapshot = RoundSnapshot { pool: key, round_metadata: round.round_metadata };
    self.reasoner.forget_questions(&snapshot).await;

    let rubric = self.generate_rubric(&pool, &snapshot).await?;

    let removed = self.store.clean_evaluations().await.map_err(Error::store)?;
    if removed > 0 {
      tracing::info!(removed, "removed evaluations without answers");
    }

    Ok(rubric.into_iter().map(|q| q.question).collect())
  }

  async fn generate_rubric(
    &self,
    pool: &Pool,
    round: &RoundSnapshot,
  ) -> Result<Vec<EvaluationQuestion>> {
    let questions = self.generate_with_retry(round).await?;
    let stored = self
      .store
      .reset_rubric(pool.id, questions)
      .await
      .map_err(Error::store)?;
    if stored.is_empty() {
      return Err(Error::IsNull(format!("rubric of pool {}", pool.key())));
    }
    tracing::info!(pool = %pool.key(), questions = stored.len(), "rubric generated");
    Ok(stored)
  }

  async fn generate_with_retry(&self, round: &RoundSnapshot) -> Result<Vec<String>> {
    let attempts = self.config.rubric_attempts.max(1);
    let mut attempt = 1;
    loop {
      match self.reasoner.generate_questions(round).await {
        Ok(questions) if !questions.is_empty() => return Ok(questions),
        Ok(_) if attempt >= attempts => {
          return Err(Error::Parse("reasoning service produced an empty rubric".into()));
        }
        Err(e) if attempt >= attempts => {
          tracing::error!(pool = %round.pool, attempt, error = %e, "rubric generation failed");
          return Err(e);
        }
        Ok(_) => {
          tracing::warn!(pool = %round.pool, attempt, "empty rubric; retrying");
        }
        Err(e) => {
          tracing::warn!(pool = %round.pool, attempt, error = %e, "rubric generation failed; retrying");
        }
      }
      attempt += 1;
    }
  }
}

/// Shorthand used when a rubric is only needed as question text.
pub(crate) fn texts(rubric: &[EvaluationQuestion]) -> Arc<[String]> {
  checker_core::rubric::question_texts(rubric).into()
}
