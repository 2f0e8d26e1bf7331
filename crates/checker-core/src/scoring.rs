//! Scoring engine: rubric answers → numeric score → categorical status.
//!
//! Everything here is pure. A `yes` is worth one point, `uncertain` half a
//! point and `no` nothing; the score is the rounded percentage of points over
//! the number of answered questions.

use std::collections::HashSet;

use crate::{
  Error, Result,
  evaluation::{AnswerInput, AnswerType, EvaluationStatus, EvaluatorType},
};

/// Scores strictly below this are rejected.
pub const REJECT_BELOW: u8 = 40;
/// Scores strictly above this are approved.
pub const APPROVE_ABOVE: u8 = 60;

/// The derived outcome of one set of answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
  pub evaluator_score:   u8,
  pub evaluation_status: EvaluationStatus,
  /// Validated `(question_index, answer)` pairs, in input order.
  pub answers:           Vec<(u32, AnswerType)>,
}

/// `round(100 * points / count)` with halves rounded up. An empty answer set
/// scores 0.
pub fn score(answers: &[AnswerType]) -> u8 {
  if answers.is_empty() {
    return 0;
  }
  // Work in half-points so the arithmetic stays integral.
  let half_points: u64 = answers
    .iter()
    .map(|a| match a {
      AnswerType::Yes => 2,
      AnswerType::Uncertain => 1,
      AnswerType::No => 0,
    })
    .sum();
  let n = answers.len() as u64;
  ((100 * half_points + n) / (2 * n)) as u8
}

/// Status derived from a score for non-human evaluators.
pub fn status_for_score(score: u8) -> EvaluationStatus {
  if score < REJECT_BELOW {
    EvaluationStatus::Rejected
  } else if score > APPROVE_ABOVE {
    EvaluationStatus::Approved
  } else {
    EvaluationStatus::Uncertain
  }
}

/// Validate raw answer codes and derive score and status. Each question
/// index may be answered once.
///
/// Human evaluators keep the status they supplied (`rejected` when none was
/// given) and the score is informational. For every other evaluator the
/// status follows from the score.
pub fn assess(
  evaluator_type: EvaluatorType,
  answers: &[AnswerInput],
  supplied_status: Option<EvaluationStatus>,
) -> Result<Assessment> {
  let mut seen = HashSet::new();
  let answers = answers
    .iter()
    .map(|a| {
      if !seen.insert(a.question_index) {
        return Err(Error::Validation(format!(
          "question {} answered more than once",
          a.question_index
        )));
      }
      Ok((a.question_index, AnswerType::try_from(a.answer_enum)?))
    })
    .collect::<Result<Vec<_>>>()?;

  let kinds: Vec<AnswerType> = answers.iter().map(|(_, a)| *a).collect();
  let evaluator_score = score(&kinds);

  let evaluation_status = match evaluator_type {
    EvaluatorType::Human => {
      supplied_status.unwrap_or(EvaluationStatus::Rejected)
    }
    EvaluatorType::Llm => status_for_score(evaluator_score),
  };

  Ok(Assessment { evaluator_score, evaluation_status, answers })
}
