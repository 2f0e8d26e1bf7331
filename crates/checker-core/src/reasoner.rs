//! The [`Reasoner`] trait: the contract of the reasoning gateway.

use std::{future::Future, sync::Arc};

use serde_json::Value;

use crate::{Result, evaluation::SummaryInput, pool::PoolKey};

/// Round-level input to rubric generation and evaluation prompts.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSnapshot {
  pub pool:           PoolKey,
  pub round_metadata: Value,
}

/// Everything the gateway may look at when evaluating one application.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationSnapshot {
  pub round:               Arc<RoundSnapshot>,
  pub allo_application_id: String,
  /// Project identity; part of the result-cache fingerprint.
  pub project_id:          String,
  pub metadata:            Value,
}

/// Calls into the external reasoning service.
///
/// Implementations return typed failures ([`crate::Error::Transport`],
/// [`crate::Error::Parse`]) and never retry internally; retry policy belongs
/// to the caller.
pub trait Reasoner: Send + Sync {
  /// Answer every question of `rubric` for one application.
  ///
  /// The returned answers have indices in `0..rubric.len()` and answer codes
  /// in `{0, 1, 2}`.
  fn evaluate<'a>(
    &'a self,
    rubric: &'a [String],
    snapshot: &'a ApplicationSnapshot,
  ) -> impl Future<Output = Result<SummaryInput>> + Send + 'a;

  /// Produce an ordered, non-empty list of rubric questions for a round.
  fn generate_questions<'a>(
    &'a self,
    round: &'a RoundSnapshot,
  ) -> impl Future<Output = Result<Vec<String>>> + Send + 'a;

  /// Drop any remembered rubric for `round` so the next
  /// [`Reasoner::generate_questions`] asks the service again.
  fn forget_questions<'a>(
    &'a self,
    round: &'a RoundSnapshot,
  ) -> impl Future<Output = ()> + Send + 'a {
    let _ = round;
    async {}
  }
}
