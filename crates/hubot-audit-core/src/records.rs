//! # Audit Records
//!
//! Flat, JSON-serializable audit documents and the pure functions that build
//! them from host runtime objects.
//!
//! Field names on the wire are fixed (`uuid`, `spaceId`, `statusCode`, ...)
//! because existing index mappings depend on them.

use crate::index_client::AuditRecord;
use crate::{IdentityTags, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder for names the host could not resolve
pub const UNKNOWN: &str = "unknown";

const DEFAULT_PROTOCOL: &str = "http:";

// ============================================================================
// Adapter Log Entry
// ============================================================================

/// One inbound chat message deemed audit-worthy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterLogEntry {
    #[serde(rename = "uuid")]
    pub instance_id: String,
    pub space_id: String,
    pub group_id: String,

    /// Always true for chat messages
    pub is_incoming_request: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    /// Email if resolvable, otherwise the raw user id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,

    pub room_name: String,
    pub adapter: String,
    pub robot: String,
    pub timestamp: Timestamp,
}

impl AuditRecord for AdapterLogEntry {
    const INDEX: &'static str = "hubotadapterrequest";
    const DOC_TYPE: &'static str = "AdapterLogEntry";
}

/// Message fields resolved by the pipeline before building an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterCallDetails {
    pub user_name: Option<String>,
    pub user_id: Option<String>,
    pub text: String,
    pub room: Option<String>,
    pub room_name: String,
    pub adapter_name: String,
    pub robot_name: String,
}

impl Default for AdapterCallDetails {
    fn default() -> Self {
        Self {
            user_name: None,
            user_id: None,
            text: String::new(),
            room: None,
            room_name: UNKNOWN.to_string(),
            adapter_name: UNKNOWN.to_string(),
            robot_name: UNKNOWN.to_string(),
        }
    }
}

/// Build an adapter log entry
///
/// Pure and total: identical inputs give identical entries.
pub fn transform_to_adapter_log_entry(
    tags: &IdentityTags,
    details: AdapterCallDetails,
    timestamp: Timestamp,
) -> AdapterLogEntry {
    AdapterLogEntry {
        instance_id: tags.instance_id.clone(),
        space_id: tags.space_id.clone(),
        group_id: tags.group_id.clone(),
        is_incoming_request: true,
        user_name: details.user_name,
        user_id: details.user_id,
        text: details.text,
        room: details.room,
        room_name: details.room_name,
        adapter: details.adapter_name,
        robot: details.robot_name,
        timestamp,
    }
}

// ============================================================================
// HTTP Exchange Descriptors
// ============================================================================

/// Request side of an HTTP exchange as reported by instrumentation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpRequestDescriptor {
    /// Scheme, possibly with a trailing `:`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// Request headers; names are matched case-insensitively
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub method: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl HttpRequestDescriptor {
    /// Create a request descriptor
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the scheme
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Set the `host` header
    pub fn with_host(self, host: impl Into<String>) -> Self {
        self.with_header("host", host)
    }

    /// Set a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Destination host
    pub fn host(&self) -> Option<&str> {
        self.header("host")
    }
}

/// Response side of an HTTP exchange
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponseDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl HttpResponseDescriptor {
    /// Response with a status code
    pub fn with_status(status_code: u16) -> Self {
        Self {
            status_code: Some(status_code),
        }
    }

    /// No response was received
    pub fn none() -> Self {
        Self::default()
    }
}

// ============================================================================
// HTTP Log Entry
// ============================================================================

/// One HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpLogEntry {
    #[serde(rename = "uuid")]
    pub instance_id: String,
    pub space_id: String,
    pub group_id: String,

    /// Response status, `-1` when no response status was reported
    pub status_code: i32,

    /// Scheme without trailing separator
    pub protocol: String,

    /// Host concatenated with path
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    pub method: String,
    pub is_incoming_request: bool,
    pub timestamp: Timestamp,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Request body serialized to a JSON string, incoming requests only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl AuditRecord for HttpLogEntry {
    const INDEX: &'static str = "hubothttprequest";
    const DOC_TYPE: &'static str = "HttpLogEntry";
}

/// Build an HTTP log entry stamped with the current time
pub fn transform_to_http_log_entry(
    tags: &IdentityTags,
    request: &HttpRequestDescriptor,
    response: &HttpResponseDescriptor,
    is_incoming: bool,
) -> HttpLogEntry {
    transform_to_http_log_entry_at(tags, request, response, is_incoming, Timestamp::now())
}

/// Build an HTTP log entry with an explicit timestamp
pub fn transform_to_http_log_entry_at(
    tags: &IdentityTags,
    request: &HttpRequestDescriptor,
    response: &HttpResponseDescriptor,
    is_incoming: bool,
    timestamp: Timestamp,
) -> HttpLogEntry {
    let protocol = request
        .protocol
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_PROTOCOL);
    let protocol = protocol.strip_suffix(':').unwrap_or(protocol);

    let status_code = match response.status_code {
        Some(code) if code != 0 => i32::from(code),
        _ => -1,
    };

    let host = request.host().map(str::to_string);
    let url = format!("{}{}", host.as_deref().unwrap_or_default(), request.path);

    // Serialized as a string so arbitrary body shapes never touch the index mapping
    let body = if is_incoming {
        request
            .body
            .as_ref()
            .and_then(|b| serde_json::to_string(b).ok())
    } else {
        None
    };

    HttpLogEntry {
        instance_id: tags.instance_id.clone(),
        space_id: tags.space_id.clone(),
        group_id: tags.group_id.clone(),
        status_code,
        protocol: protocol.to_string(),
        url,
        host,
        method: request.method.clone(),
        is_incoming_request: is_incoming,
        timestamp,
        user_agent: request.header("user-agent").map(str::to_string),
        body,
    }
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod tests;
