//! # Index Client Interface
//!
//! Abstraction over the search backend that stores audit documents. The
//! backend is asked to index one document at a time into a named collection
//! with a document kind.
//!
//! See [`crate::adapters`] for the Elasticsearch and in-memory implementations.

use crate::adapters::{ElasticsearchConfig, ElasticsearchIndexClient};
use crate::settings::AuditSettings;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::debug;

// ============================================================================
// Records and Requests
// ============================================================================

/// Audit document with a fixed destination collection
pub trait AuditRecord: Serialize {
    /// Collection the document is indexed into
    const INDEX: &'static str;

    /// Document kind within the collection
    const DOC_TYPE: &'static str;
}

/// Request to index a single document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRequest {
    pub index: String,
    pub doc_type: String,
    pub body: serde_json::Value,
}

impl IndexRequest {
    /// Build the request for an audit record
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Serialization`] if the record cannot be
    /// represented as JSON.
    pub fn for_record<R: AuditRecord>(record: &R) -> Result<Self, IndexError> {
        let body = serde_json::to_value(record).map_err(|e| IndexError::Serialization {
            message: e.to_string(),
        })?;

        Ok(Self {
            index: R::INDEX.to_string(),
            doc_type: R::DOC_TYPE.to_string(),
            body,
        })
    }
}

/// Backend acknowledgement of an indexed document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexResponse {
    /// Identifier assigned by the backend
    #[serde(default, rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Backend result label, e.g. `created`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

// ============================================================================
// Core Trait
// ============================================================================

/// Interface for the audit search backend
///
/// Implementations must be safe to share between tasks; the pipeline clones
/// an `Arc` into every delivery task.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Index one document
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable, times out, or rejects
    /// the document.
    async fn index(&self, request: IndexRequest) -> Result<IndexResponse, IndexError>;
}

/// Create the backend client for the configured endpoint
///
/// Returns `Ok(None)` when no endpoint is configured; the process then runs
/// with auditing disabled.
pub fn build_index_client(
    settings: &AuditSettings,
) -> Result<Option<Arc<dyn IndexClient>>, IndexError> {
    let Some(endpoint) = settings.audit_endpoint() else {
        debug!("No audit endpoint configured; index client not created");
        return Ok(None);
    };

    let config = ElasticsearchConfig::from_audit_endpoint(endpoint, settings)?;
    let client = ElasticsearchIndexClient::new(config)?;
    Ok(Some(Arc::new(client)))
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while delivering a document to the backend
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("Invalid audit endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Request timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Backend rejected document: {status} - {message}")]
    Rejected { status: u16, message: String },

    #[error("Client initialization failed: {message}")]
    ClientInitialization { message: String },
}

impl IndexError {
    /// Check if error is transient
    ///
    /// The pipeline never retries; this only feeds log severity and callers
    /// that add their own policy.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            Self::InvalidEndpoint { .. }
            | Self::Serialization { .. }
            | Self::ClientInitialization { .. } => false,
        }
    }
}

#[cfg(test)]
#[path = "index_client_tests.rs"]
mod tests;
