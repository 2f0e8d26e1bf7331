//! The reasoning gateway: every call to the external LLM service goes
//! through here.
//!
//! [`Gateway`] implements [`checker_core::reasoner::Reasoner`] on top of any
//! [`CompletionBackend`]. It owns the process-wide concurrency limiter and
//! the two result caches; the backend only turns a prompt into text.

#![allow(async_fn_in_trait)]

mod backend;
mod gateway;
pub mod json;
mod openai;
pub mod prompt;

pub use backend::CompletionBackend;
pub use gateway::{Gateway, GatewayConfig};
pub use openai::{OpenAiBackend, OpenAiConfig};
