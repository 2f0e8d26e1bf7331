//! Recording one evaluator's assessment of one application.

use checker_core::{
  Error, Result,
  evaluation::{Evaluation, EvaluationStatus, EvaluatorType, NewEvaluation, SummaryInput},
  indexer::Indexer,
  pool::{Application, PoolKey},
  reasoner::Reasoner,
  scoring,
  store::EvaluationStore,
};

use crate::engine::Engine;

/// Input to [`Engine::record_evaluation`].
#[derive(Debug, Clone)]
pub struct RecordRequest {
  pub pool:                PoolKey,
  pub allo_application_id: String,
  pub evaluator:           String,
  pub evaluator_type:      EvaluatorType,
  /// Content address of the evaluated application snapshot.
  pub cid:                 String,
  pub summary:             SummaryInput,
  /// Only honoured for human evaluators.
  pub evaluation_status:   Option<EvaluationStatus>,
}

impl<S, I, R> Engine<S, I, R>
where
  S: EvaluationStore,
  I: Indexer,
  R: Reasoner,
{
  /// Score `request` and store it, replacing any earlier evaluation by the
  /// same evaluator of the same application.
  pub async fn record_evaluation(&self, request: RecordRequest) -> Result<Evaluation> {
    let application = self
      .store
      .get_application(request.pool.clone(), request.allo_application_id.clone())
      .await
      .map_err(Error::store)?
      .ok_or_else(|| {
        Error::NotFound(format!(
          "application {} in pool {}",
          request.allo_application_id, request.pool
        ))
      })?;

    self
      .write_evaluation(
        &application,
        request.evaluator,
        request.evaluator_type,
        request.cid,
        &request.summary,
        request.evaluation_status,
      )
      .await
  }

  pub(crate) async fn write_evaluation(
    &self,
    application: &Application,
    evaluator: String,
    evaluator_type: EvaluatorType,
    cid: String,
    summary: &SummaryInput,
    status: Option<EvaluationStatus>,
  ) -> Result<Evaluation> {
    let assessment = scoring::assess(evaluator_type, &summary.questions, status)?;

    let evaluation = self
      .store
      .replace_evaluation(NewEvaluation {
        application_id: application.id,
        evaluator,
        evaluator_type,
        summary: summary.summary.clone(),
        evaluator_score: assessment.evaluator_score,
        evaluation_status: assessment.evaluation_status,
        metadata_cid: cid,
        answers: assessment.answers,
      })
      .await
      .map_err(Error::store)?;

    tracing::debug!(
      application_id = %application.allo_application_id,
      evaluator = %evaluation.evaluator,
      score = evaluation.evaluator_score,
      "evaluation recorded"
    );
    Ok(evaluation)
  }
}
