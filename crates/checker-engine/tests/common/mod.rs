//! In-process fakes for the indexer and the completion backend, plus a
//! harness wiring them to a real in-memory store and a real gateway.

#![allow(dead_code)]

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use checker_core::{
  Error, Result,
  indexer::{Indexer, IndexerApplication, IndexerApplicationWithRound, IndexerRound},
  pool::PoolKey,
};
use checker_engine::{Engine, EngineConfig, SyncDriver};
use checker_llm::{CompletionBackend, Gateway, GatewayConfig};
use checker_store_sqlite::SqliteStore;
use serde_json::json;

pub const CHAIN: i64 = 10;

pub type TestEngine = Engine<SqliteStore, FakeIndexer, Gateway<FakeBackend>>;
pub type TestDriver = SyncDriver<SqliteStore, FakeIndexer, Gateway<FakeBackend>>;

// ─── Indexer ─────────────────────────────────────────────────────────────────

/// A round with `count` applications `app-1..=app-count`, each from its own
/// project.
pub fn round(pool: &str, count: usize) -> IndexerRound {
  let applications = (1..=count)
    .map(|i| IndexerApplication {
      id:           format!("app-{i}"),
      metadata:     json!({ "application": { "project": { "title": format!("app-{i}") } } }),
      metadata_cid: format!("cid-{i}"),
      status:       Some("PENDING".into()),
      project_id:   format!("proj-{pool}-{i}"),
      project:      None,
    })
    .collect();

  IndexerRound {
    chain_id: CHAIN,
    id: pool.into(),
    round_metadata: json!({ "name": format!("Round {pool}"), "roundType": "public" }),
    round_metadata_cid: None,
    applications,
  }
}

pub struct FakeIndexer {
  rounds:  Mutex<HashMap<PoolKey, IndexerRound>>,
  fetches: AtomicUsize,
  delay:   Duration,
}

impl FakeIndexer {
  pub fn new(rounds: Vec<IndexerRound>) -> Self {
    Self::with_delay(rounds, Duration::ZERO)
  }

  pub fn with_delay(rounds: Vec<IndexerRound>, delay: Duration) -> Self {
    let rounds = rounds.into_iter().map(|r| (r.key(), r)).collect();
    Self { rounds: Mutex::new(rounds), fetches: AtomicUsize::new(0), delay }
  }

  /// Number of `round_with_applications` calls so far.
  pub fn fetches(&self) -> usize { self.fetches.load(Ordering::SeqCst) }

  fn lookup(&self, key: &PoolKey) -> Option<IndexerRound> {
    self.rounds.lock().unwrap().get(key).cloned()
  }
}

impl Indexer for FakeIndexer {
  async fn round_with_applications(&self, key: PoolKey) -> Result<Option<IndexerRound>> {
    self.fetches.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(self.delay).await;
    let round = self.lookup(&key);
    Ok(round)
  }

  async fn application_with_round(
    &self,
    key: PoolKey,
    application_id: String,
  ) -> Result<Option<IndexerApplicationWithRound>> {
    let round = self.lookup(&key);
    Ok(round.and_then(|r| {
      let application = r.application(&application_id)?.clone();
      Some(IndexerApplicationWithRound {
        application,
        chain_id: r.chain_id,
        round_id: r.id.clone(),
        round_metadata: r.round_metadata.clone(),
      })
    }))
  }

  async fn pool_managers(&self, _key: PoolKey) -> Result<Vec<String>> {
    Ok(Vec::new())
  }
}

// ─── Completion backend ──────────────────────────────────────────────────────

const EVALUATION_REPLY: &str = r#"Here is my assessment:
{"questions": [
  {"questionIndex": 0, "answerEnum": 0},
  {"questionIndex": 1, "answerEnum": 0},
  {"questionIndex": 2, "answerEnum": 2}
], "summary": "Solid project."}"#;

/// Answers rubric prompts with three numbered questions and evaluation
/// prompts with a fixed assessment, failing on demand.
#[derive(Default)]
pub struct FakeBackend {
  /// Applications (by title) whose evaluation fails.
  fail_titles:      HashSet<String>,
  /// Applications (by title) whose evaluation never answers.
  stall_titles:     HashSet<String>,
  /// Rubric calls still to fail before one succeeds.
  rubric_failures:  AtomicUsize,
  rubric_calls:     AtomicUsize,
  evaluation_calls: AtomicUsize,
  in_flight:        AtomicUsize,
  max_in_flight:    AtomicUsize,
  delay:            Duration,
}

impl FakeBackend {
  pub fn new() -> Self { Self::default() }

  pub fn failing(mut self, titles: &[&str]) -> Self {
    self.fail_titles = titles.iter().map(|t| (*t).to_owned()).collect();
    self
  }

  pub fn stalling(mut self, titles: &[&str]) -> Self {
    self.stall_titles = titles.iter().map(|t| (*t).to_owned()).collect();
    self
  }

  pub fn rubric_failures(self, n: usize) -> Self {
    self.rubric_failures.store(n, Ordering::SeqCst);
    self
  }

  pub fn delay(mut self, delay: Duration) -> Self {
    self.delay = delay;
    self
  }

  pub fn rubric_calls(&self) -> usize { self.rubric_calls.load(Ordering::SeqCst) }

  pub fn evaluation_calls(&self) -> usize { self.evaluation_calls.load(Ordering::SeqCst) }

  pub fn max_in_flight(&self) -> usize { self.max_in_flight.load(Ordering::SeqCst) }

  fn mentions(titles: &HashSet<String>, prompt: &str) -> bool {
    titles.iter().any(|t| prompt.contains(&format!("\"{t}\"")))
  }

  fn reply(&self, prompt: &str) -> Result<String> {
    if prompt.contains("generate") {
      let n = self.rubric_calls.fetch_add(1, Ordering::SeqCst) + 1;
      let fail = self
        .rubric_failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok();
      if fail {
        return Err(Error::Transport("rubric service unavailable".into()));
      }
      return Ok(format!(
        r#"["1. Generation {n} first?", "2. Generation {n} second?", "3. Generation {n} third?"]"#
      ));
    }

    self.evaluation_calls.fetch_add(1, Ordering::SeqCst);
    if Self::mentions(&self.fail_titles, prompt) {
      return Err(Error::Transport("evaluation service unavailable".into()));
    }
    Ok(EVALUATION_REPLY.to_owned())
  }
}

impl CompletionBackend for FakeBackend {
  async fn complete<'a>(&'a self, prompt: &'a str) -> Result<String> {
    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(self.delay).await;
    if Self::mentions(&self.stall_titles, prompt) {
      tokio::time::sleep(Duration::from_secs(30)).await;
    }
    let reply = self.reply(prompt);
    self.in_flight.fetch_sub(1, Ordering::SeqCst);
    reply
  }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

/// Production defaults with short pauses.
pub fn config() -> EngineConfig {
  EngineConfig { batch_delay: Duration::from_millis(10), ..EngineConfig::default() }
}

pub async fn engine_with(
  indexer: FakeIndexer,
  backend: FakeBackend,
  config: EngineConfig,
) -> TestEngine {
  engine_with_gateway(indexer, backend, config, GatewayConfig::default()).await
}

pub async fn engine_with_gateway(
  indexer: FakeIndexer,
  backend: FakeBackend,
  config: EngineConfig,
  gateway: GatewayConfig,
) -> TestEngine {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  let gateway = Gateway::new(backend, gateway);
  Engine::new(Arc::new(store), Arc::new(indexer), Arc::new(gateway), config)
}

pub async fn engine(indexer: FakeIndexer, backend: FakeBackend) -> TestEngine {
  engine_with(indexer, backend, config()).await
}

pub fn key(pool: &str) -> PoolKey { PoolKey::new(CHAIN, pool) }
