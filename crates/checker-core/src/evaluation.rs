//! Evaluations and their per-question answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Enumerations ────────────────────────────────────────────────────────────

/// A ternary rubric answer.
///
/// On the wire answers travel as integer codes where `0` is the affirmative
/// answer: `0 → yes`, `1 → no`, `2 → uncertain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerType {
  Yes,
  No,
  Uncertain,
}

impl AnswerType {
  /// The integer code of this answer.
  pub fn code(self) -> i64 {
    match self {
      Self::Yes => 0,
      Self::No => 1,
      Self::Uncertain => 2,
    }
  }
}

impl TryFrom<i64> for AnswerType {
  type Error = Error;

  /// Any code other than `0`, `1` or `2` is rejected; there is no fallback.
  fn try_from(code: i64) -> Result<Self> {
    match code {
      0 => Ok(Self::Yes),
      1 => Ok(Self::No),
      2 => Ok(Self::Uncertain),
      other => Err(Error::UnknownAnswerCode(other)),
    }
  }
}

/// Who produced an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluatorType {
  Human,
  Llm,
}

/// The categorical verdict of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationStatus {
  Approved,
  Rejected,
  Uncertain,
}

// ─── Raw input ───────────────────────────────────────────────────────────────

/// One raw answer as produced by an evaluator, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
  pub question_index: u32,
  pub answer_enum:    i64,
}

/// The answers plus free-text summary produced for one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryInput {
  pub questions: Vec<AnswerInput>,
  pub summary:   String,
}

// ─── Stored records ──────────────────────────────────────────────────────────

/// One evaluator's assessment of one application. At most one exists per
/// `(evaluator, application_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
  pub id:                i64,
  pub application_id:    i64,
  pub evaluator:         String,
  pub evaluator_type:    EvaluatorType,
  pub summary:           String,
  /// 0–100.
  pub evaluator_score:   u8,
  pub evaluation_status: EvaluationStatus,
  /// Content address of the application snapshot that was evaluated.
  pub metadata_cid:      String,
  pub created_at:        DateTime<Utc>,
}

/// A stored answer to one rubric question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationAnswer {
  pub id:                     i64,
  pub evaluation_id:          i64,
  pub evaluation_question_id: i64,
  pub question_index:         u32,
  pub answer:                 AnswerType,
}

/// An evaluation bundled with its answers, ordered by question index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationWithAnswers {
  pub evaluation: Evaluation,
  pub answers:    Vec<EvaluationAnswer>,
}

/// Input to [`crate::store::EvaluationStore::replace_evaluation`].
///
/// The store writes the evaluation and all of its answers as one unit, after
/// deleting any earlier evaluation by the same evaluator for the same
/// application.
#[derive(Debug, Clone)]
pub struct NewEvaluation {
  /// Answer indices refer to the current rubric of this application's pool.
  pub application_id:    i64,
  pub evaluator:         String,
  pub evaluator_type:    EvaluatorType,
  pub summary:           String,
  pub evaluator_score:   u8,
  pub evaluation_status: EvaluationStatus,
  pub metadata_cid:      String,
  /// `(question_index, answer)` pairs.
  pub answers:           Vec<(u32, AnswerType)>,
}
