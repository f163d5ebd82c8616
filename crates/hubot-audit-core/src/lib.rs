//! # Hubot Audit Core
//!
//! Audit trail for a chat-bot host: inbound chat messages and outbound HTTP
//! exchanges are normalized into flat, versioned records and handed to a
//! search backend for indexing.
//!
//! ## Architecture
//!
//! The pipeline is built from small pieces, leaves first:
//! - [`settings`]: startup configuration and the re-evaluated audit gate
//! - [`host_filter`]: destination hosts that must never be audited
//! - [`records`]: pure transformers producing [`AdapterLogEntry`] and [`HttpLogEntry`]
//! - [`pipeline`]: gate check, transform, filter and fire-and-forget delivery
//! - [`event_sources`]: wiring into the host's middleware and HTTP instrumentation
//!
//! The search backend and the chat host are only known through traits
//! ([`IndexClient`], [`RobotIdentity`], [`RoomDirectory`]), so the pipeline
//! can be driven by an Elasticsearch client in production and an in-memory
//! recorder in tests.
//!
//! ## Usage
//!
//! ```rust
//! use hubot_audit_core::{transform_to_http_log_entry, HttpRequestDescriptor,
//!     HttpResponseDescriptor, IdentityTags};
//!
//! let request = HttpRequestDescriptor::new("GET", "/requestpath").with_host("www.cnn.com");
//! let response = HttpResponseDescriptor::with_status(200);
//! let entry = transform_to_http_log_entry(&IdentityTags::default(), &request, &response, false);
//! assert_eq!(entry.url, "www.cnn.com/requestpath");
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Shared Types
// ============================================================================

/// Literal instance id used when none is configured
pub const DEFAULT_INSTANCE_ID: &str = "DEFAULT_UUID";

/// Literal space id used when none is configured
pub const DEFAULT_SPACE_ID: &str = "DEFAULT_SPACE";

/// Literal group id used when none is configured
pub const DEFAULT_GROUP_ID: &str = "DEFAULT_GROUP";

/// Point in time expressed as milliseconds since the Unix epoch
///
/// Serialized as a bare integer so indexed documents carry the same
/// `timestamp` shape regardless of the producing host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Create timestamp from epoch milliseconds
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Get epoch milliseconds
    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// Convert to a UTC date time, if representable
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}ms", self.0),
        }
    }
}

/// Process-wide identity tags copied into every audit record
///
/// Resolved once at startup and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityTags {
    /// Bot instance identifier
    pub instance_id: String,

    /// Space the bot is deployed into
    pub space_id: String,

    /// Group owning the bot; also used as the backend auth token
    pub group_id: String,
}

impl IdentityTags {
    /// Create identity tags, substituting the literal defaults for empty values
    pub fn new(
        instance_id: impl Into<String>,
        space_id: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: non_empty_or(instance_id.into(), DEFAULT_INSTANCE_ID),
            space_id: non_empty_or(space_id.into(), DEFAULT_SPACE_ID),
            group_id: non_empty_or(group_id.into(), DEFAULT_GROUP_ID),
        }
    }
}

impl Default for IdentityTags {
    fn default() -> Self {
        Self {
            instance_id: DEFAULT_INSTANCE_ID.to_string(),
            space_id: DEFAULT_SPACE_ID.to_string(),
            group_id: DEFAULT_GROUP_ID.to_string(),
        }
    }
}

fn non_empty_or(value: String, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Startup settings and the audit enable/disable gate
pub mod settings;

/// Blacklist of destination hosts excluded from auditing
pub mod host_filter;

/// Chat message model and the per-message idempotence marker
pub mod message;

/// Chat host identity and room lookup capabilities
pub mod robot;

/// Pure record transformers and the audit record shapes
pub mod records;

/// Search backend abstraction
pub mod index_client;

/// Gate, transform, filter and deliver
pub mod pipeline;

/// Registration against the host's event sources
pub mod event_sources;

/// Index client implementations
pub mod adapters;

// Re-export key types for convenience
pub use adapters::{ElasticsearchConfig, ElasticsearchIndexClient, InMemoryIndexClient};
pub use event_sources::{
    register_audit, ChatRobot, EventHandler, HttpEventKind, HttpInstrumentation, HttpListener,
    ListenerMiddleware, LocalChatRobot, MiddlewareNext, RequestLogger, AUDIT_CUSTOM_EVENT,
};
pub use host_filter::{remove_protocol, HostFilter, PLATFORM_API_HOST};
pub use index_client::{
    build_index_client, AuditRecord, IndexClient, IndexError, IndexRequest, IndexResponse,
};
pub use message::{ChatMessage, ChatUser, ListenerContext, LoggedMarker, MarkState, UserProfile};
pub use pipeline::{
    AdapterCallOutcome, AuditPipeline, AuditPipelineBuilder, DeliveryHandle, DeliveryStatus,
    HttpLogOutcome, SkipReason,
};
pub use records::{
    transform_to_adapter_log_entry, transform_to_http_log_entry, transform_to_http_log_entry_at,
    AdapterCallDetails,
    AdapterLogEntry, HttpLogEntry, HttpRequestDescriptor, HttpResponseDescriptor, UNKNOWN,
};
pub use robot::{InMemoryRoomDirectory, RobotIdentity, RoomDirectory, RoomInfo, StaticRobotIdentity};
pub use settings::{
    is_truthy_flag, AuditGate, AuditSettings, DisableFlagSource, EnvDisableFlag,
    FallbackDisableFlag, GateState, SettingsError, SharedDisableFlag,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
