//! [`Gateway`]: limiter and caches in front of a [`CompletionBackend`].

use std::{sync::Arc, time::Duration};

use checker_core::{
  Error, Result,
  evaluation::SummaryInput,
  reasoner::{ApplicationSnapshot, Reasoner, RoundSnapshot},
};
use moka::future::Cache;
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;

use crate::{backend::CompletionBackend, prompt};

/// Tunables for a [`Gateway`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
  /// Process-wide bound on in-flight backend calls.
  pub max_concurrent:  usize,
  /// Memory budget shared by each cache, in approximate bytes.
  pub cache_max_bytes: u64,
  /// Lifetime of a cached evaluation.
  pub evaluation_ttl:  Duration,
  /// Bound on one backend call; expiry is a transport failure.
  pub call_timeout:    Duration,
}

impl Default for GatewayConfig {
  fn default() -> Self {
    Self {
      max_concurrent:  5,
      cache_max_bytes: 256 * 1024 * 1024,
      evaluation_ttl:  Duration::from_secs(24 * 60 * 60),
      call_timeout:    Duration::from_secs(60),
    }
  }
}

/// The reasoning gateway.
///
/// Construct one per process and share it behind an `Arc`; the limiter only
/// bounds calls made through the same instance.
pub struct Gateway<B> {
  backend:      B,
  limiter:      Arc<Semaphore>,
  call_timeout: Duration,
  evaluations:  Cache<String, SummaryInput>,
  questions:    Cache<String, Vec<String>>,
}

impl<B: CompletionBackend> Gateway<B> {
  pub fn new(backend: B, config: GatewayConfig) -> Self {
    let evaluations = Cache::builder()
      .weigher(|key: &String, value: &SummaryInput| {
        weight(key.len() + value.summary.len() + value.questions.len() * 16)
      })
      .max_capacity(config.cache_max_bytes)
      .time_to_live(config.evaluation_ttl)
      .build();

    let questions = Cache::builder()
      .weigher(|key: &String, value: &Vec<String>| {
        weight(key.len() + value.iter().map(String::len).sum::<usize>())
      })
      .max_capacity(config.cache_max_bytes)
      .build();

    Self {
      backend,
      limiter: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
      call_timeout: config.call_timeout,
      evaluations,
      questions,
    }
  }

  pub fn backend(&self) -> &B { &self.backend }

  /// Run one backend call under the limiter, bounded by the call timeout.
  async fn call(&self, prompt: &str) -> Result<String> {
    let _permit = self
      .limiter
      .acquire()
      .await
      .map_err(|_| Error::Transport("reasoning limiter closed".into()))?;
    tokio::time::timeout(self.call_timeout, self.backend.complete(prompt))
      .await
      .map_err(|_| {
        Error::Transport(format!("reasoning call timed out after {:?}", self.call_timeout))
      })?
  }
}

fn weight(bytes: usize) -> u32 { u32::try_from(bytes).unwrap_or(u32::MAX) }

fn sha256_hex(bytes: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  hex::encode(hasher.finalize())
}

/// Cache key of an evaluation: project identity, pool identity and rubric
/// content. Two applications of the same project in the same pool under the
/// same rubric share a result.
fn evaluation_fingerprint(rubric: &[String], snapshot: &ApplicationSnapshot) -> String {
  let identity = json!({
    "project": snapshot.project_id,
    "chainId": snapshot.round.pool.chain_id,
    "pool": snapshot.round.pool.allo_pool_id,
    "rubric": rubric,
  });
  sha256_hex(identity.to_string().as_bytes())
}

/// Cache key of a generated rubric: pool identity and the part of the round
/// metadata the prompt actually sees.
fn questions_fingerprint(round: &RoundSnapshot) -> String {
  let identity = json!({
    "chainId": round.pool.chain_id,
    "pool": round.pool.allo_pool_id,
    "round": prompt::sanitize_round(&round.round_metadata, prompt::ROUND_BUDGET_BYTES),
  });
  sha256_hex(identity.to_string().as_bytes())
}

impl<B: CompletionBackend> Reasoner for Gateway<B> {
  async fn evaluate<'a>(
    &'a self,
    rubric: &'a [String],
    snapshot: &'a ApplicationSnapshot,
  ) -> Result<SummaryInput> {
    let key = evaluation_fingerprint(rubric, snapshot);
    if let Some(hit) = self.evaluations.get(&key).await {
      tracing::debug!(
        pool = %snapshot.round.pool,
        application_id = %snapshot.allo_application_id,
        "evaluation cache hit"
      );
      return Ok(hit);
    }

    let text = self.call(&prompt::evaluation_prompt(rubric, snapshot)).await?;
    let parsed = prompt::parse_evaluation(&text, rubric.len())?;

    self.evaluations.insert(key, parsed.clone()).await;
    Ok(parsed)
  }

  async fn generate_questions<'a>(
    &'a self,
    round: &'a RoundSnapshot,
  ) -> Result<Vec<String>> {
    let key = questions_fingerprint(round);
    if let Some(hit) = self.questions.get(&key).await {
      tracing::debug!(pool = %round.pool, "rubric cache hit");
      return Ok(hit);
    }

    let text = self.call(&prompt::questions_prompt(round)).await?;
    let questions = prompt::parse_questions(&text)?;

    self.questions.insert(key, questions.clone()).await;
    Ok(questions)
  }

  async fn forget_questions<'a>(&'a self, round: &'a RoundSnapshot) {
    self.questions.invalidate(&questions_fingerprint(round)).await;
  }
}
