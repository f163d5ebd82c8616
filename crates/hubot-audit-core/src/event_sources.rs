//! # Event Sources
//!
//! Registration of the audit pipeline with the chat host and the outbound
//! HTTP instrumentation. Nothing here decides what gets audited; it only
//! routes signals to [`AuditPipeline::record_adapter_call`] and
//! [`AuditPipeline::save_log`].

use crate::message::ListenerContext;
use crate::pipeline::AuditPipeline;
use crate::records::{HttpRequestDescriptor, HttpResponseDescriptor};
use crate::settings::GateState;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{debug, info};

/// Custom event a skill emits to have a message audited explicitly
pub const AUDIT_CUSTOM_EVENT: &str = "ibmcloud-nlc-to-audit";

/// Outbound HTTP notification kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpEventKind {
    Success,
    Error,
}

impl HttpEventKind {
    /// Every notification kind
    pub const ALL: [HttpEventKind; 2] = [HttpEventKind::Success, HttpEventKind::Error];

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for HttpEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Continuation a middleware calls to hand the message on
pub type MiddlewareNext = Box<dyn FnOnce() + Send>;

/// Middleware run for every inbound message before listeners see it
pub type ListenerMiddleware = Arc<dyn Fn(ListenerContext, MiddlewareNext) + Send + Sync>;

/// Handler for a named custom event
pub type EventHandler = Arc<dyn Fn(ListenerContext) + Send + Sync>;

/// Listener for one outbound HTTP notification
pub type HttpListener =
    Arc<dyn Fn(&HttpRequestDescriptor, &HttpResponseDescriptor) + Send + Sync>;

// ============================================================================
// Host Interfaces
// ============================================================================

/// Chat host able to run listener middleware and dispatch custom events
pub trait ChatRobot: Send + Sync {
    /// Add a middleware to the inbound message chain
    fn listener_middleware(&self, middleware: ListenerMiddleware);

    /// Subscribe to a named custom event
    fn on(&self, event: &str, handler: EventHandler);
}

/// Source of outbound HTTP success and error notifications
pub trait HttpInstrumentation: Send + Sync {
    /// Subscribe to one notification kind
    fn on(&self, kind: HttpEventKind, listener: HttpListener);
}

// ============================================================================
// Registration
// ============================================================================

/// Wire the pipeline into a chat host and an HTTP instrumentation source
///
/// Emits the startup diagnostic, then registers:
/// - the adapter-call middleware on every inbound message
/// - the [`AUDIT_CUSTOM_EVENT`] handler, with a no-op continuation
/// - `saveLog` for both HTTP notification kinds, as outbound exchanges
///
/// Registration happens even when the gate is closed, since the disable flag
/// may be cleared later.
pub fn register_audit(
    pipeline: Arc<AuditPipeline>,
    robot: &dyn ChatRobot,
    instrumentation: &dyn HttpInstrumentation,
) -> GateState {
    let state = pipeline.announce_gate_state();

    let middleware_pipeline = Arc::clone(&pipeline);
    robot.listener_middleware(Arc::new(move |context: ListenerContext, next: MiddlewareNext| {
        middleware_pipeline.record_adapter_call(&context, next);
    }));

    let event_pipeline = Arc::clone(&pipeline);
    robot.on(
        AUDIT_CUSTOM_EVENT,
        Arc::new(move |context: ListenerContext| {
            debug!(event = AUDIT_CUSTOM_EVENT, "Custom audit event received");
            event_pipeline.record_adapter_call(&context, || {});
        }),
    );

    for kind in HttpEventKind::ALL {
        let http_pipeline = Arc::clone(&pipeline);
        instrumentation.on(
            kind,
            Arc::new(
                move |request: &HttpRequestDescriptor, response: &HttpResponseDescriptor| {
                    http_pipeline.save_log(request, response, false, kind);
                },
            ),
        );
    }

    info!(state = %state, "Audit pipeline registered");
    state
}

// ============================================================================
// In-Process Hosts
// ============================================================================

/// In-process HTTP instrumentation hub
///
/// HTTP clients call [`RequestLogger::emit`] after each exchange; every
/// listener subscribed to that kind is invoked in subscription order.
#[derive(Clone, Default)]
pub struct RequestLogger {
    listeners: Arc<Mutex<HashMap<HttpEventKind, Vec<HttpListener>>>>,
}

impl RequestLogger {
    /// Create a hub with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Notify listeners of a finished exchange
    pub fn emit(
        &self,
        kind: HttpEventKind,
        request: &HttpRequestDescriptor,
        response: &HttpResponseDescriptor,
    ) {
        // Snapshot so listeners may subscribe without deadlocking
        let listeners = lock(&self.listeners)
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        for listener in listeners {
            listener(request, response);
        }
    }

    /// Number of listeners for a kind
    pub fn listener_count(&self, kind: HttpEventKind) -> usize {
        lock(&self.listeners).get(&kind).map_or(0, Vec::len)
    }
}

impl HttpInstrumentation for RequestLogger {
    fn on(&self, kind: HttpEventKind, listener: HttpListener) {
        lock(&self.listeners).entry(kind).or_default().push(listener);
    }
}

impl fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLogger")
            .field("success", &self.listener_count(HttpEventKind::Success))
            .field("error", &self.listener_count(HttpEventKind::Error))
            .finish()
    }
}

/// Minimal chat host running middleware and custom events in process
///
/// Drives registered middleware the way a chat adapter would, for hosts
/// without an adapter of their own and for tests.
#[derive(Clone, Default)]
pub struct LocalChatRobot {
    middleware: Arc<Mutex<Vec<ListenerMiddleware>>>,
    handlers: Arc<Mutex<HashMap<String, Vec<EventHandler>>>>,
}

impl LocalChatRobot {
    /// Create a host with no middleware
    pub fn new() -> Self {
        Self::default()
    }

    /// Run an inbound message through the middleware chain
    ///
    /// `done` runs after the last middleware calls its continuation. A
    /// middleware that never calls `next` stops the chain.
    pub fn receive(&self, context: ListenerContext, done: MiddlewareNext) {
        let stack = Arc::new(lock(&self.middleware).clone());
        run_middleware(stack, 0, context, done);
    }

    /// Dispatch a custom event to its handlers
    pub fn emit(&self, event: &str, context: ListenerContext) {
        let handlers = lock(&self.handlers)
            .get(event)
            .cloned()
            .unwrap_or_default();

        for handler in handlers {
            handler(context.clone());
        }
    }

    /// Number of registered middleware
    pub fn middleware_count(&self) -> usize {
        lock(&self.middleware).len()
    }

    /// Number of handlers for a custom event
    pub fn handler_count(&self, event: &str) -> usize {
        lock(&self.handlers).get(event).map_or(0, Vec::len)
    }
}

impl ChatRobot for LocalChatRobot {
    fn listener_middleware(&self, middleware: ListenerMiddleware) {
        lock(&self.middleware).push(middleware);
    }

    fn on(&self, event: &str, handler: EventHandler) {
        lock(&self.handlers)
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }
}

impl fmt::Debug for LocalChatRobot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalChatRobot")
            .field("middleware", &self.middleware_count())
            .finish_non_exhaustive()
    }
}

fn run_middleware(
    stack: Arc<Vec<ListenerMiddleware>>,
    position: usize,
    context: ListenerContext,
    done: MiddlewareNext,
) {
    let Some(middleware) = stack.get(position).cloned() else {
        done();
        return;
    };

    let next_context = context.clone();
    let next: MiddlewareNext =
        Box::new(move || run_middleware(stack, position + 1, next_context, done));
    middleware(context, next);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
#[path = "event_sources_tests.rs"]
mod tests;
