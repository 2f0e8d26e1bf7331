//! The evaluation orchestration engine.
//!
//! [`Engine`] bundles the three collaborators (store, indexer, reasoner)
//! with the tunables in [`EngineConfig`]. Its behaviour is split by concern:
//!
//! - `rubric`: reuse-or-generate policy with bounded retries
//! - `recorder`: scoring plus the replace-one-evaluation write
//! - `orchestrator`: batched, paced LLM evaluation of a pool
//! - `sync`: the per-pool sync state machine, coalesced by [`SyncDriver`]

mod coalesce;
mod config;
mod engine;
mod orchestrator;
mod recorder;
mod rubric;
mod sync;

pub use coalesce::Coalescer;
pub use config::{EngineConfig, Environment};
pub use engine::Engine;
pub use recorder::RecordRequest;
pub use sync::{SyncDriver, SyncOutcome, SyncRequest};
