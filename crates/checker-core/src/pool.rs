//! Pools, profiles and applications.
//!
//! A pool is written once on its first sync and never changes afterwards.
//! Applications are likewise immutable once created; re-syncing a pool skips
//! applications that already exist instead of updating them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Keys ────────────────────────────────────────────────────────────────────

/// The natural identity of a pool: chain plus the platform-assigned pool id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolKey {
  pub chain_id:     i64,
  pub allo_pool_id: String,
}

impl PoolKey {
  pub fn new(chain_id: i64, allo_pool_id: impl Into<String>) -> Self {
    Self { chain_id, allo_pool_id: allo_pool_id.into() }
  }
}

impl fmt::Display for PoolKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.chain_id, self.allo_pool_id)
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// A funding round being evaluated. Unique on `(chain_id, allo_pool_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
  pub id:           i64,
  pub chain_id:     i64,
  pub allo_pool_id: String,
  pub created_at:   DateTime<Utc>,
}

impl Pool {
  pub fn key(&self) -> PoolKey {
    PoolKey::new(self.chain_id, self.allo_pool_id.clone())
  }
}

/// The project identity behind one or more applications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
  pub id:         i64,
  pub profile_id: String,
}

/// A project's submission into a pool. Unique on
/// `(chain_id, pool_id, allo_application_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
  pub id:                  i64,
  pub chain_id:            i64,
  pub allo_application_id: String,
  pub pool_id:             i64,
  pub profile_id:          String,
}

/// Input to [`crate::store::EvaluationStore::upsert_applications`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
  pub allo_application_id: String,
  /// The project id reported by the indexer; upserted as a [`Profile`].
  pub profile_id:          String,
}
