//! Core types and trait definitions for the grant-application checker.
//!
//! Nothing here talks HTTP or SQL. The crate holds the domain model, the
//! error taxonomy, the scoring rules, and the collaborator traits the engine
//! is written against: [`store::EvaluationStore`], [`indexer::Indexer`] and
//! [`reasoner::Reasoner`].

// Trait methods spell out `impl Future + Send`; implementors may still write
// `async fn`.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod evaluation;
pub mod indexer;
pub mod pool;
pub mod reasoner;
pub mod rubric;
pub mod scoring;
pub mod store;

pub use error::{Error, Result};

/// Evaluator address under which LLM evaluations are recorded (the address
/// derived from the integer `1`).
pub const LLM_EVALUATOR_ADDRESS: &str =
  "0x0000000000000000000000000000000000000001";
