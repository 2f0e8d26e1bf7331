//! The [`EvaluationStore`] trait.
//!
//! Implemented by storage backends (e.g. `checker-store-sqlite`). The engine
//! depends on this abstraction, never on a concrete backend.

use std::future::Future;

use crate::{
  evaluation::{Evaluation, EvaluationWithAnswers, EvaluatorType, NewEvaluation},
  pool::{Application, NewApplication, Pool, PoolKey},
  rubric::EvaluationQuestion,
};

/// Persistence for pools, rubrics, applications and evaluations.
///
/// All methods return `Send` futures so the trait can be used from a
/// multi-threaded runtime.
pub trait EvaluationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Pools ─────────────────────────────────────────────────────────────

  /// Return the pool for `key`, creating it on first sight.
  fn upsert_pool(
    &self,
    key: PoolKey,
  ) -> impl Future<Output = Result<Pool, Self::Error>> + Send + '_;

  /// Retrieve a pool by key. Returns `None` if not found.
  fn get_pool(
    &self,
    key: PoolKey,
  ) -> impl Future<Output = Result<Option<Pool>, Self::Error>> + Send + '_;

  fn list_pools(
    &self,
  ) -> impl Future<Output = Result<Vec<Pool>, Self::Error>> + Send + '_;

  // ── Rubric ────────────────────────────────────────────────────────────

  /// The pool's questions ordered by index; empty if it has no rubric.
  fn get_rubric(
    &self,
    pool_id: i64,
  ) -> impl Future<Output = Result<Vec<EvaluationQuestion>, Self::Error>> + Send + '_;

  /// Atomically replace the pool's rubric with `questions`, indexed
  /// `0..n` in the given order.
  ///
  /// Every evaluation of an application in the pool is deleted in the same
  /// transaction, since its answers point at indices that no longer mean
  /// what they meant.
  fn reset_rubric(
    &self,
    pool_id: i64,
    questions: Vec<String>,
  ) -> impl Future<Output = Result<Vec<EvaluationQuestion>, Self::Error>> + Send + '_;

  // ── Applications ──────────────────────────────────────────────────────

  /// Insert the applications that do not exist yet, upserting their
  /// profiles. Existing applications are left untouched. Returns only the
  /// newly created rows.
  fn upsert_applications(
    &self,
    pool: Pool,
    applications: Vec<NewApplication>,
  ) -> impl Future<Output = Result<Vec<Application>, Self::Error>> + Send + '_;

  fn get_application(
    &self,
    key: PoolKey,
    allo_application_id: String,
  ) -> impl Future<Output = Result<Option<Application>, Self::Error>> + Send + '_;

  fn list_applications(
    &self,
    pool_id: i64,
  ) -> impl Future<Output = Result<Vec<Application>, Self::Error>> + Send + '_;

  /// Applications of the pool with no evaluation of `evaluator_type` yet.
  fn applications_without_evaluation(
    &self,
    pool_id: i64,
    evaluator_type: EvaluatorType,
  ) -> impl Future<Output = Result<Vec<Application>, Self::Error>> + Send + '_;

  // ── Evaluations ───────────────────────────────────────────────────────

  /// Delete any evaluation by `input.evaluator` for `input.application_id`,
  /// then write the new evaluation and all of its answers as one unit.
  ///
  /// Fails, writing nothing, if an answer's question index has no question
  /// in the pool's current rubric.
  fn replace_evaluation(
    &self,
    input: NewEvaluation,
  ) -> impl Future<Output = Result<Evaluation, Self::Error>> + Send + '_;

  /// All evaluations of an application with their answers.
  fn evaluations_for_application(
    &self,
    application_id: i64,
  ) -> impl Future<Output = Result<Vec<EvaluationWithAnswers>, Self::Error>>
  + Send
  + '_;

  /// Delete evaluations that have no answers. Returns how many were removed.
  fn clean_evaluations(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
