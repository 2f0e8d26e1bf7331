//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings and enumerations as their
//! lowercase names.

use chrono::{DateTime, Utc};
use checker_core::{
  evaluation::{
    AnswerType, Evaluation, EvaluationAnswer, EvaluationStatus, EvaluatorType,
  },
  pool::{Application, Pool},
  rubric::EvaluationQuestion,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── EvaluatorType ───────────────────────────────────────────────────────────

pub fn encode_evaluator_type(t: EvaluatorType) -> &'static str {
  match t {
    EvaluatorType::Human => "human",
    EvaluatorType::Llm => "llm",
  }
}

pub fn decode_evaluator_type(s: &str) -> Result<EvaluatorType> {
  match s {
    "human" => Ok(EvaluatorType::Human),
    "llm" => Ok(EvaluatorType::Llm),
    other => Err(Error::Decode(format!("unknown evaluator type: {other:?}"))),
  }
}

// ─── EvaluationStatus ────────────────────────────────────────────────────────

pub fn encode_status(s: EvaluationStatus) -> &'static str {
  match s {
    EvaluationStatus::Approved => "approved",
    EvaluationStatus::Rejected => "rejected",
    EvaluationStatus::Uncertain => "uncertain",
  }
}

pub fn decode_status(s: &str) -> Result<EvaluationStatus> {
  match s {
    "approved" => Ok(EvaluationStatus::Approved),
    "rejected" => Ok(EvaluationStatus::Rejected),
    "uncertain" => Ok(EvaluationStatus::Uncertain),
    other => Err(Error::Decode(format!("unknown evaluation status: {other:?}"))),
  }
}

// ─── AnswerType ──────────────────────────────────────────────────────────────

pub fn encode_answer(a: AnswerType) -> &'static str {
  match a {
    AnswerType::Yes => "yes",
    AnswerType::No => "no",
    AnswerType::Uncertain => "uncertain",
  }
}

pub fn decode_answer(s: &str) -> Result<AnswerType> {
  match s {
    "yes" => Ok(AnswerType::Yes),
    "no" => Ok(AnswerType::No),
    "uncertain" => Ok(AnswerType::Uncertain),
    other => Err(Error::Decode(format!("unknown answer: {other:?}"))),
  }
}

// ─── Integers ────────────────────────────────────────────────────────────────

fn narrow<T: TryFrom<i64>>(value: i64, column: &str) -> Result<T> {
  T::try_from(value)
    .map_err(|_| Error::Decode(format!("{column} out of range: {value}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `pools` row.
pub struct RawPool {
  pub id:           i64,
  pub chain_id:     i64,
  pub allo_pool_id: String,
  pub created_at:   String,
}

impl RawPool {
  pub fn into_pool(self) -> Result<Pool> {
    Ok(Pool {
      id:           self.id,
      chain_id:     self.chain_id,
      allo_pool_id: self.allo_pool_id,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values from an `applications` row joined with `profiles`.
pub struct RawApplication {
  pub id:                  i64,
  pub chain_id:            i64,
  pub allo_application_id: String,
  pub pool_id:             i64,
  pub profile_id:          String,
}

impl RawApplication {
  pub fn into_application(self) -> Application {
    Application {
      id:                  self.id,
      chain_id:            self.chain_id,
      allo_application_id: self.allo_application_id,
      pool_id:             self.pool_id,
      profile_id:          self.profile_id,
    }
  }
}

/// Raw values from an `evaluation_questions` row.
pub struct RawQuestion {
  pub id:             i64,
  pub pool_id:        i64,
  pub question_index: i64,
  pub question:       String,
}

impl RawQuestion {
  pub fn into_question(self) -> Result<EvaluationQuestion> {
    Ok(EvaluationQuestion {
      id:             self.id,
      pool_id:        self.pool_id,
      question_index: narrow(self.question_index, "question_index")?,
      question:       self.question,
    })
  }
}

/// Raw values from an `evaluations` row.
pub struct RawEvaluation {
  pub id:                i64,
  pub application_id:    i64,
  pub evaluator:         String,
  pub evaluator_type:    String,
  pub summary:           String,
  pub evaluator_score:   i64,
  pub evaluation_status: String,
  pub metadata_cid:      String,
  pub created_at:        String,
}

impl RawEvaluation {
  pub fn into_evaluation(self) -> Result<Evaluation> {
    Ok(Evaluation {
      id:                self.id,
      application_id:    self.application_id,
      evaluator:         self.evaluator,
      evaluator_type:    decode_evaluator_type(&self.evaluator_type)?,
      summary:           self.summary,
      evaluator_score:   narrow(self.evaluator_score, "evaluator_score")?,
      evaluation_status: decode_status(&self.evaluation_status)?,
      metadata_cid:      self.metadata_cid,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values from an `evaluation_answers` row joined with its question.
pub struct RawAnswer {
  pub id:                     i64,
  pub evaluation_id:          i64,
  pub evaluation_question_id: i64,
  pub question_index:         i64,
  pub answer:                 String,
}

impl RawAnswer {
  pub fn into_answer(self) -> Result<EvaluationAnswer> {
    Ok(EvaluationAnswer {
      id:                     self.id,
      evaluation_id:          self.evaluation_id,
      evaluation_question_id: self.evaluation_question_id,
      question_index:         narrow(self.question_index, "question_index")?,
      answer:                 decode_answer(&self.answer)?,
    })
  }
}
