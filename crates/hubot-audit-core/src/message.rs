//! # Chat Messages
//!
//! The slice of the host's message model the audit pipeline reads, plus the
//! idempotence marker the pipeline attaches to each message.

use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

// ============================================================================
// Idempotence Marker
// ============================================================================

/// Whether a message has already been processed by the audit pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkState {
    /// Not yet processed, eligible for auditing
    Unmarked,
    /// Already processed, later passes are no-ops
    Marked,
}

/// Per-message marker set exactly once and never cleared
///
/// Marking is an atomic compare-and-set, so when several middleware passes
/// race over the same message only one of them wins.
#[derive(Default)]
pub struct LoggedMarker {
    marked: AtomicBool,
}

impl LoggedMarker {
    /// Current state
    pub fn state(&self) -> MarkState {
        if self.marked.load(Ordering::Acquire) {
            MarkState::Marked
        } else {
            MarkState::Unmarked
        }
    }

    /// True once the message has been marked
    pub fn is_marked(&self) -> bool {
        self.state() == MarkState::Marked
    }

    /// Transition to `Marked`; returns false if another pass marked it first
    pub fn try_mark(&self) -> bool {
        self.marked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl fmt::Debug for LoggedMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LoggedMarker").field(&self.state()).finish()
    }
}

impl Clone for LoggedMarker {
    fn clone(&self) -> Self {
        Self {
            marked: AtomicBool::new(self.is_marked()),
        }
    }
}

// ============================================================================
// Message Model
// ============================================================================

/// Optional profile data some adapters attach to a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Sender of a chat message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    /// Raw adapter user id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Room the user sent the message from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,

    /// Email address resolved by the adapter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,

    /// Adapter profile data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<UserProfile>,
}

impl ChatUser {
    /// Create a user with a display name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set the raw user id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the room
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Set the adapter-resolved email address
    pub fn with_email_address(mut self, email: impl Into<String>) -> Self {
        self.email_address = Some(email.into());
        self
    }

    /// Set the profile email
    pub fn with_profile_email(mut self, email: impl Into<String>) -> Self {
        self.profile = Some(UserProfile {
            email: Some(email.into()),
        });
        self
    }

    /// Best identifier for the user: email address, profile email, raw id
    pub fn resolved_id(&self) -> Option<String> {
        non_blank(self.email_address.as_deref())
            .or_else(|| non_blank(self.profile.as_ref().and_then(|p| p.email.as_deref())))
            .or_else(|| non_blank(self.id.as_deref()))
            .map(str::to_string)
    }
}

/// Inbound chat message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Sender
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ChatUser>,

    /// Room the message was posted in, when the adapter sets it on the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,

    #[serde(skip)]
    marker: LoggedMarker,
}

impl ChatMessage {
    /// Create a message with text from a user
    pub fn new(text: impl Into<String>, user: ChatUser) -> Self {
        Self {
            text: Some(text.into()),
            user: Some(user),
            ..Self::default()
        }
    }

    /// Set the message room
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Text, if present and not empty
    pub fn non_empty_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }

    /// Room identifier: the sender's room, else the message room
    pub fn room_id(&self) -> Option<&str> {
        self.user
            .as_ref()
            .and_then(|u| u.room.as_deref())
            .or(self.room.as_deref())
    }

    /// Idempotence marker
    pub fn marker(&self) -> &LoggedMarker {
        &self.marker
    }

    /// True once the audit pipeline has processed this message
    pub fn is_logged(&self) -> bool {
        self.marker.is_marked()
    }
}

/// What a middleware pass or custom event hands to the audit pipeline
///
/// The message is shared so a marker set during one pass is visible to every
/// later pass over the same message instance.
#[derive(Debug, Clone)]
pub struct ListenerContext {
    pub message: Arc<ChatMessage>,
}

impl ListenerContext {
    /// Wrap a shared message
    pub fn new(message: Arc<ChatMessage>) -> Self {
        Self { message }
    }
}

impl From<ChatMessage> for ListenerContext {
    fn from(message: ChatMessage) -> Self {
        Self::new(Arc::new(message))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
