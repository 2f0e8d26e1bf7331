//! JSON API for the grant-application checker.
//!
//! Exposes an axum [`Router`] over a [`SyncDriver`], generic over the store,
//! indexer and reasoner so tests can run it against in-process fakes. The
//! `checker-server` binary wires it to SQLite, the GraphQL indexer and an
//! OpenAI-compatible backend.

pub mod auth;
pub mod error;
pub mod evaluations;
pub mod pools;

pub use error::ApiError;

use std::{path::PathBuf, time::Duration};

use axum::{
  Router,
  routing::{get, post},
};
use checker_core::{indexer::Indexer, reasoner::Reasoner, store::EvaluationStore};
use checker_engine::{Engine, EngineConfig, Environment, SyncDriver};
use checker_llm::{GatewayConfig, OpenAiConfig};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `checker.toml` and
/// `CHECKER_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                        String,
  #[serde(default = "default_port")]
  pub port:                        u16,
  #[serde(default = "default_store_path")]
  pub store_path:                  PathBuf,
  #[serde(default)]
  pub environment:                 Environment,
  pub indexer_url:                 String,
  #[serde(default = "default_openai_base_url")]
  pub openai_base_url:             String,
  pub openai_api_key:              String,
  #[serde(default = "default_openai_model")]
  pub openai_model:                String,
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs:        u64,
  #[serde(default = "default_max_concurrent_evaluations")]
  pub max_concurrent_evaluations:  usize,
  #[serde(default = "default_evaluation_batch_size")]
  pub evaluation_batch_size:       usize,
  #[serde(default = "default_evaluation_batch_delay_ms")]
  pub evaluation_batch_delay_ms:   u64,
  #[serde(default = "default_cache_max_bytes")]
  pub cache_max_bytes:             u64,
  #[serde(default = "default_evaluation_cache_ttl_secs")]
  pub evaluation_cache_ttl_secs:   u64,
  #[serde(default = "default_rubric_retry_attempts")]
  pub rubric_retry_attempts:       u32,
  #[serde(default = "default_development_evaluation_cap")]
  pub development_evaluation_cap:  usize,
  #[serde(default = "default_sync_window_secs")]
  pub sync_window_secs:            u64,
}

fn default_host() -> String { "0.0.0.0".into() }
fn default_port() -> u16 { 3000 }
fn default_store_path() -> PathBuf { PathBuf::from("checker.db") }
fn default_openai_base_url() -> String { "https://api.openai.com/v1".into() }
fn default_openai_model() -> String { "gpt-4o".into() }
fn default_request_timeout_secs() -> u64 { 60 }
fn default_max_concurrent_evaluations() -> usize { 5 }
fn default_evaluation_batch_size() -> usize { 25 }
fn default_evaluation_batch_delay_ms() -> u64 { 2_000 }
fn default_cache_max_bytes() -> u64 { 256 * 1024 * 1024 }
fn default_evaluation_cache_ttl_secs() -> u64 { 24 * 60 * 60 }
fn default_rubric_retry_attempts() -> u32 { 5 }
fn default_development_evaluation_cap() -> usize { 5 }
fn default_sync_window_secs() -> u64 { 5 }

impl ServerConfig {
  pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs) }

  pub fn engine_config(&self) -> EngineConfig {
    EngineConfig {
      environment:     self.environment,
      batch_size:      self.evaluation_batch_size.max(1),
      batch_delay:     Duration::from_millis(self.evaluation_batch_delay_ms),
      development_cap: self.development_evaluation_cap,
      rubric_attempts: self.rubric_retry_attempts.max(1),
      sync_window:     Duration::from_secs(self.sync_window_secs),
    }
  }

  pub fn gateway_config(&self) -> GatewayConfig {
    GatewayConfig {
      max_concurrent:  self.max_concurrent_evaluations.max(1),
      cache_max_bytes: self.cache_max_bytes,
      evaluation_ttl:  Duration::from_secs(self.evaluation_cache_ttl_secs),
      call_timeout:    self.request_timeout(),
    }
  }

  pub fn openai_config(&self) -> OpenAiConfig {
    OpenAiConfig {
      base_url: self.openai_base_url.clone(),
      api_key:  self.openai_api_key.clone(),
      model:    self.openai_model.clone(),
      timeout:  self.request_timeout(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, I, R> {
  pub driver: SyncDriver<S, I, R>,
}

impl<S, I, R> Clone for AppState<S, I, R> {
  fn clone(&self) -> Self { Self { driver: self.driver.clone() } }
}

impl<S, I, R> AppState<S, I, R>
where
  S: EvaluationStore + 'static,
  I: Indexer + 'static,
  R: Reasoner + 'static,
{
  pub fn new(engine: Engine<S, I, R>) -> Self { Self { driver: SyncDriver::new(engine) } }

  pub fn engine(&self) -> &Engine<S, I, R> { self.driver.engine() }

  pub fn store(&self) -> &S { self.engine().store() }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`], with every route under `/api`.
pub fn router<S, I, R>(state: AppState<S, I, R>) -> Router
where
  S: EvaluationStore + 'static,
  I: Indexer + 'static,
  R: Reasoner + 'static,
{
  let api = Router::new()
    // Pools
    .route("/pools",                get(pools::list::<S, I, R>))
    .route("/pools/sync",           post(pools::sync::<S, I, R>))
    .route("/pools/{chain_id}/{allo_pool_id}/questions", get(pools::questions::<S, I, R>))
    .route(
      "/pools/{chain_id}/{allo_pool_id}/applications/{allo_application_id}/evaluations",
      get(pools::evaluations::<S, I, R>),
    )
    // Evaluations
    .route("/evaluations",          post(evaluations::record::<S, I, R>))
    .route("/evaluations/llm",      post(evaluations::trigger_llm::<S, I, R>))
    .route(
      "/evaluations/questions/recreate",
      post(evaluations::recreate_questions::<S, I, R>),
    )
    .with_state(state);

  Router::new().nest("/api", api).layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────
