use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Deployment environment. Anything but production caps LLM spend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
  #[default]
  Production,
  Development,
}

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
  pub environment:     Environment,
  /// Items evaluated concurrently per batch.
  pub batch_size:      usize,
  /// Pause between consecutive batches.
  pub batch_delay:     Duration,
  /// Work-set cap outside production, applied before batching.
  pub development_cap: usize,
  /// Total rubric generation attempts before a sync fails.
  pub rubric_attempts: u32,
  /// Window within which a finished sync is reused instead of re-run.
  pub sync_window:     Duration,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      environment:     Environment::Production,
      batch_size:      25,
      batch_delay:     Duration::from_millis(2_000),
      development_cap: 5,
      rubric_attempts: 5,
      sync_window:     Duration::from_secs(5),
    }
  }
}
