//! Indexer data types and the [`Indexer`] trait.
//!
//! The indexer is the read-only source of truth for rounds, applications and
//! pool managers. Metadata documents are kept as raw JSON; only the reasoning
//! gateway looks inside them, and only at an allow-listed projection.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, pool::PoolKey};

// ─── Types ───────────────────────────────────────────────────────────────────

/// The canonical project behind an application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerProject {
  #[serde(default)]
  pub metadata:     Value,
  #[serde(default)]
  pub metadata_cid: Option<String>,
}

/// One application as reported by the indexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerApplication {
  pub id:           String,
  #[serde(default)]
  pub metadata:     Value,
  pub metadata_cid: String,
  #[serde(default)]
  pub status:       Option<String>,
  pub project_id:   String,
  #[serde(default)]
  pub project:      Option<IndexerProject>,
}

/// A round together with all of its applications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerRound {
  pub chain_id:           i64,
  pub id:                 String,
  #[serde(default)]
  pub round_metadata:     Value,
  #[serde(default)]
  pub round_metadata_cid: Option<String>,
  #[serde(default)]
  pub applications:       Vec<IndexerApplication>,
}

impl IndexerRound {
  pub fn key(&self) -> PoolKey { PoolKey::new(self.chain_id, self.id.clone()) }

  pub fn application(&self, id: &str) -> Option<&IndexerApplication> {
    self.applications.iter().find(|a| a.id == id)
  }
}

/// A single application together with its round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerApplicationWithRound {
  pub application:    IndexerApplication,
  pub chain_id:       i64,
  pub round_id:       String,
  #[serde(default)]
  pub round_metadata: Value,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Read access to the indexer.
///
/// "Not found" is `Ok(None)`; `Err` is reserved for transport and decoding
/// failures.
pub trait Indexer: Send + Sync {
  /// Round metadata plus all applications of a pool.
  fn round_with_applications(
    &self,
    key: PoolKey,
  ) -> impl Future<Output = Result<Option<IndexerRound>>> + Send + '_;

  /// One application of a pool, with its round metadata.
  fn application_with_round(
    &self,
    key: PoolKey,
    application_id: String,
  ) -> impl Future<Output = Result<Option<IndexerApplicationWithRound>>> + Send + '_;

  /// Addresses authorised to manage a pool. Empty if the pool is unknown.
  fn pool_managers(
    &self,
    key: PoolKey,
  ) -> impl Future<Output = Result<Vec<String>>> + Send + '_;
}
