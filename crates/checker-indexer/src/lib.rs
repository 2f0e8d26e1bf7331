//! GraphQL client for the grants indexer.
//!
//! [`IndexerClient`] implements [`checker_core::indexer::Indexer`]. It holds
//! no cache; callers that need one scope it themselves.

#![allow(async_fn_in_trait)]

mod client;
mod queries;

pub use client::{IndexerClient, normalize_endpoint};
