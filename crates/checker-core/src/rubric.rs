//! Rubric questions.

use serde::{Deserialize, Serialize};

/// One yes/no/uncertain question of a pool's rubric.
///
/// `question_index` is zero-based and unique within the pool. Rubrics are
/// replaced wholesale, never patched, so an index always refers to the
/// question of the rubric that was current when it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationQuestion {
  pub id:             i64,
  pub pool_id:        i64,
  pub question_index: u32,
  pub question:       String,
}

/// The question texts of a rubric, in index order.
pub fn question_texts(rubric: &[EvaluationQuestion]) -> Vec<String> {
  let mut sorted: Vec<&EvaluationQuestion> = rubric.iter().collect();
  sorted.sort_by_key(|q| q.question_index);
  sorted.into_iter().map(|q| q.question.clone()).collect()
}
