//! # Index Client Adapters
//!
//! Implementations of the [`IndexClient`](crate::IndexClient) interface.

pub mod elasticsearch;
pub mod memory;

pub use elasticsearch::{ElasticsearchConfig, ElasticsearchIndexClient, AUTH_TOKEN_HEADER};
pub use memory::InMemoryIndexClient;
