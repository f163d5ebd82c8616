//! # In-Memory Index Client
//!
//! Records indexed documents instead of sending them anywhere. Used by tests
//! and by dry runs of the operator CLI.

use crate::index_client::{IndexClient, IndexError, IndexRequest, IndexResponse};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

/// Thread-safe recording index client
///
/// Clones share the same recorded documents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIndexClient {
    requests: Arc<Mutex<Vec<IndexRequest>>>,
    failure: Arc<Mutex<Option<IndexError>>>,
}

impl InMemoryIndexClient {
    /// Create an empty client
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every following request with the given error
    pub fn fail_with(&self, error: IndexError) {
        *lock(&self.failure) = Some(error);
    }

    /// Accept requests again
    pub fn succeed(&self) {
        *lock(&self.failure) = None;
    }

    /// All successfully recorded requests, oldest first
    pub fn requests(&self) -> Vec<IndexRequest> {
        lock(&self.requests).clone()
    }

    /// Recorded document bodies for one collection
    pub fn documents(&self, index: &str) -> Vec<serde_json::Value> {
        lock(&self.requests)
            .iter()
            .filter(|r| r.index == index)
            .map(|r| r.body.clone())
            .collect()
    }

    /// Number of recorded requests
    pub fn len(&self) -> usize {
        lock(&self.requests).len()
    }

    /// True if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl IndexClient for InMemoryIndexClient {
    async fn index(&self, request: IndexRequest) -> Result<IndexResponse, IndexError> {
        if let Some(error) = lock(&self.failure).clone() {
            return Err(error);
        }

        let mut requests = lock(&self.requests);
        requests.push(request);
        Ok(IndexResponse {
            id: Some(format!("memory-{}", requests.len())),
            result: Some("created".to_string()),
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
