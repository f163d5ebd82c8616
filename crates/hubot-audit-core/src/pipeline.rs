//! # Delivery Pipeline
//!
//! Gate check, transform, filter and send, for both chat messages and HTTP
//! exchanges.
//!
//! Delivery is fire-and-forget: the index call is spawned on the current
//! tokio runtime and its result is only logged. Callers get a
//! [`DeliveryHandle`] they may await, but nothing in the host's own control
//! flow waits on it, and no failure is ever returned to the host.

use crate::event_sources::HttpEventKind;
use crate::host_filter::HostFilter;
use crate::index_client::{AuditRecord, IndexClient, IndexRequest};
use crate::message::{ChatMessage, ListenerContext};
use crate::records::{
    transform_to_adapter_log_entry, transform_to_http_log_entry, AdapterCallDetails,
    HttpRequestDescriptor, HttpResponseDescriptor, UNKNOWN,
};
use crate::robot::RobotIdentity;
use crate::settings::{AuditGate, AuditSettings, GateState};
use crate::{IdentityTags, Timestamp};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

// ============================================================================
// Outcomes
// ============================================================================

/// Final state of one delivery task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// The backend acknowledged the document
    Indexed,
    /// The backend call failed; the failure was logged
    Failed,
}

impl DeliveryStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Indexed => "indexed",
            Self::Failed => "failed",
        }
    }
}

/// Handle to a spawned delivery task
///
/// Dropping the handle does not cancel delivery.
#[derive(Debug)]
pub struct DeliveryHandle {
    handle: JoinHandle<DeliveryStatus>,
}

impl DeliveryHandle {
    /// Wait for the delivery task to finish
    pub async fn wait(self) -> DeliveryStatus {
        self.handle.await.unwrap_or(DeliveryStatus::Failed)
    }
}

/// Why an eligible-looking message produced no record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The message has no text
    MissingText,
    /// The message has no sender
    MissingSender,
    /// The sender is a system or test account
    IgnoredSender,
}

/// Result of one adapter-call pass
#[derive(Debug)]
pub enum AdapterCallOutcome {
    /// The gate is closed
    AuditDisabled,
    /// The message was processed by an earlier pass
    AlreadyLogged,
    /// The message is not audit-worthy; it stays unmarked
    Skipped(SkipReason),
    /// A record was built and handed to the backend
    Submitted(DeliveryHandle),
    /// A record was built but could not be dispatched
    Undeliverable,
}

impl AdapterCallOutcome {
    /// Short label for reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::AuditDisabled => "audit-disabled",
            Self::AlreadyLogged => "already-logged",
            Self::Skipped(SkipReason::MissingText) => "skipped-missing-text",
            Self::Skipped(SkipReason::MissingSender) => "skipped-missing-sender",
            Self::Skipped(SkipReason::IgnoredSender) => "skipped-ignored-sender",
            Self::Submitted(_) => "submitted",
            Self::Undeliverable => "undeliverable",
        }
    }

    /// Delivery handle, if a record was submitted
    pub fn into_delivery(self) -> Option<DeliveryHandle> {
        match self {
            Self::Submitted(handle) => Some(handle),
            _ => None,
        }
    }

    /// True if a record was submitted
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted(_))
    }
}

/// Result of one HTTP exchange pass
#[derive(Debug)]
pub enum HttpLogOutcome {
    /// The gate is closed
    AuditDisabled,
    /// The destination has no host or is blacklisted
    Filtered,
    /// A record was built and handed to the backend
    Submitted(DeliveryHandle),
    /// A record was built but could not be dispatched
    Undeliverable,
}

impl HttpLogOutcome {
    /// Short label for reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::AuditDisabled => "audit-disabled",
            Self::Filtered => "filtered",
            Self::Submitted(_) => "submitted",
            Self::Undeliverable => "undeliverable",
        }
    }

    /// Delivery handle, if a record was submitted
    pub fn into_delivery(self) -> Option<DeliveryHandle> {
        match self {
            Self::Submitted(handle) => Some(handle),
            _ => None,
        }
    }

    /// True if a record was submitted
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted(_))
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Audit pipeline shared by every event source
pub struct AuditPipeline {
    gate: AuditGate,
    host_filter: HostFilter,
    tags: IdentityTags,
    index_client: Option<Arc<dyn IndexClient>>,
    robot: Option<Arc<dyn RobotIdentity>>,
    ignored_users: Vec<String>,
}

impl AuditPipeline {
    /// Start building a pipeline around a gate and identity tags
    pub fn builder(gate: AuditGate, tags: IdentityTags) -> AuditPipelineBuilder {
        AuditPipelineBuilder::new(gate, tags)
    }

    /// Build a pipeline from startup settings
    ///
    /// The gate reads the disable flag from the environment on every check.
    pub fn from_settings(
        settings: &AuditSettings,
        index_client: Option<Arc<dyn IndexClient>>,
    ) -> AuditPipelineBuilder {
        let gate = AuditGate::from_settings(settings);
        let host_filter = HostFilter::new(settings.audit_endpoint(), &settings.platform_api_host);

        let mut builder = Self::builder(gate, settings.identity_tags())
            .host_filter(host_filter)
            .ignored_users(settings.ignored_users());
        if let Some(client) = index_client {
            builder = builder.index_client(client);
        }
        builder
    }

    /// Audit gate
    pub fn gate(&self) -> &AuditGate {
        &self.gate
    }

    /// Destination blacklist
    pub fn host_filter(&self) -> &HostFilter {
        &self.host_filter
    }

    /// Identity tags stamped on every record
    pub fn tags(&self) -> &IdentityTags {
        &self.tags
    }

    /// Emit the startup diagnostic when auditing is off
    pub fn announce_gate_state(&self) -> GateState {
        let state = self.gate.state();
        if state != GateState::Enabled {
            error!(
                state = %state,
                "Auditing is disabled. To enable auditing, ensure HUBOT_AUDIT_ENDPOINT is defined \
                 and HUBOT_BLUEMIX_AUDIT_DISABLED is not set to true"
            );
        }
        state
    }

    /// Middleware entry point for inbound chat messages
    ///
    /// Audits the message at most once, then always invokes `next` so the
    /// host's own handling chain continues.
    pub fn record_adapter_call<F>(&self, context: &ListenerContext, next: F) -> AdapterCallOutcome
    where
        F: FnOnce(),
    {
        let outcome = self.audit_message(&context.message);
        next();
        outcome
    }

    fn audit_message(&self, message: &ChatMessage) -> AdapterCallOutcome {
        if self.gate.audit_disabled() {
            return AdapterCallOutcome::AuditDisabled;
        }

        debug!(is_logged = message.is_logged(), "recordAdapterCall");
        if message.is_logged() {
            return AdapterCallOutcome::AlreadyLogged;
        }

        let Some(text) = message.non_empty_text() else {
            debug!("No text detected so no audit message sent");
            return AdapterCallOutcome::Skipped(SkipReason::MissingText);
        };

        let Some(user) = message.user.as_ref() else {
            debug!("No sender on message so no audit message sent");
            return AdapterCallOutcome::Skipped(SkipReason::MissingSender);
        };

        if user
            .name
            .as_deref()
            .is_some_and(|name| self.ignored_users.iter().any(|ignored| ignored == name))
        {
            debug!(user = ?user.name, "Ignoring message from system account");
            return AdapterCallOutcome::Skipped(SkipReason::IgnoredSender);
        }

        if !message.marker().try_mark() {
            return AdapterCallOutcome::AlreadyLogged;
        }
        debug!("Marked message as logged");

        let room = message.room_id();
        let details = AdapterCallDetails {
            user_name: user.name.clone(),
            user_id: user.resolved_id(),
            text: text.to_string(),
            room: room.map(str::to_string),
            room_name: self.resolve_room_name(room),
            adapter_name: self.resolve_adapter_name(),
            robot_name: self.resolve_robot_name(),
        };
        debug!(
            adapter = %details.adapter_name,
            robot = %details.robot_name,
            room_name = %details.room_name,
            "Resolved adapter call details"
        );

        let entry = transform_to_adapter_log_entry(&self.tags, details, Timestamp::now());
        match self.submit(&entry) {
            Some(handle) => AdapterCallOutcome::Submitted(handle),
            None => AdapterCallOutcome::Undeliverable,
        }
    }

    /// Entry point for HTTP instrumentation notifications
    pub fn save_log(
        &self,
        request: &HttpRequestDescriptor,
        response: &HttpResponseDescriptor,
        is_incoming: bool,
        kind: HttpEventKind,
    ) -> HttpLogOutcome {
        if self.gate.audit_disabled() {
            return HttpLogOutcome::AuditDisabled;
        }

        let entry = transform_to_http_log_entry(&self.tags, request, response, is_incoming);
        if entry.host.is_none() || !self.host_filter.is_allowed(&entry.url) {
            return HttpLogOutcome::Filtered;
        }

        debug!(kind = %kind, url = %entry.url, "Logging outgoing HTTP exchange");
        match self.submit(&entry) {
            Some(handle) => HttpLogOutcome::Submitted(handle),
            None => HttpLogOutcome::Undeliverable,
        }
    }

    fn resolve_adapter_name(&self) -> String {
        self.robot
            .as_ref()
            .and_then(|robot| robot.adapter_name())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    fn resolve_robot_name(&self) -> String {
        self.robot
            .as_ref()
            .and_then(|robot| robot.robot_name())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    fn resolve_room_name(&self, room_id: Option<&str>) -> String {
        let (Some(robot), Some(room_id)) = (self.robot.as_ref(), room_id) else {
            return UNKNOWN.to_string();
        };

        robot
            .room_directory()
            .and_then(|rooms| rooms.channel_group_or_dm_by_id(room_id))
            .and_then(|room| room.name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    fn submit<R: AuditRecord>(&self, record: &R) -> Option<DeliveryHandle> {
        let index = R::INDEX;
        let request = match IndexRequest::for_record(record) {
            Ok(request) => request,
            Err(e) => {
                error!(index, error = %e, "Failed to build audit document");
                return None;
            }
        };

        let Some(client) = self.index_client.clone() else {
            warn!(index, "No index client configured; audit document dropped");
            return None;
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(index, "No async runtime available; audit document dropped");
                return None;
            }
        };

        debug!(index, doc_type = R::DOC_TYPE, body = %request.body, "Sending audit document");
        let handle = runtime.spawn(deliver(client, request, index));

        Some(DeliveryHandle { handle })
    }
}

async fn deliver(
    client: Arc<dyn IndexClient>,
    request: IndexRequest,
    index: &'static str,
) -> DeliveryStatus {
    match client.index(request).await {
        Ok(ack) => {
            debug!(index, id = ?ack.id, "Audit document indexed");
            DeliveryStatus::Indexed
        }
        Err(e) => {
            error!(
                index,
                error = %e,
                transient = e.is_transient(),
                "Failed to index audit document"
            );
            DeliveryStatus::Failed
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`AuditPipeline`]
pub struct AuditPipelineBuilder {
    gate: AuditGate,
    tags: IdentityTags,
    host_filter: Option<HostFilter>,
    index_client: Option<Arc<dyn IndexClient>>,
    robot: Option<Arc<dyn RobotIdentity>>,
    ignored_users: Vec<String>,
}

impl AuditPipelineBuilder {
    fn new(gate: AuditGate, tags: IdentityTags) -> Self {
        Self {
            gate,
            tags,
            host_filter: None,
            index_client: None,
            robot: None,
            ignored_users: vec!["hubot".to_string()],
        }
    }

    /// Set the destination blacklist
    ///
    /// Defaults to the gate's endpoint plus the platform API host.
    pub fn host_filter(mut self, host_filter: HostFilter) -> Self {
        self.host_filter = Some(host_filter);
        self
    }

    /// Set the backend client
    pub fn index_client(mut self, client: Arc<dyn IndexClient>) -> Self {
        self.index_client = Some(client);
        self
    }

    /// Set the host robot identity
    pub fn robot(mut self, robot: Arc<dyn RobotIdentity>) -> Self {
        self.robot = Some(robot);
        self
    }

    /// Replace the ignored sender names
    pub fn ignored_users(mut self, users: Vec<String>) -> Self {
        self.ignored_users = users;
        self
    }

    /// Build the pipeline
    pub fn build(self) -> AuditPipeline {
        let host_filter = self.host_filter.unwrap_or_else(|| {
            HostFilter::new(self.gate.endpoint(), crate::host_filter::PLATFORM_API_HOST)
        });

        AuditPipeline {
            gate: self.gate,
            host_filter,
            tags: self.tags,
            index_client: self.index_client,
            robot: self.robot,
            ignored_users: self.ignored_users,
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
