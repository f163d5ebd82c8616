//! # Robot Identity
//!
//! Read-only view of the chat host the pipeline runs inside: its adapter and
//! robot names, and an optional adapter-specific room lookup.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

/// Room returned by an adapter data store lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Adapter data store able to resolve a room id to channel, group or DM
pub trait RoomDirectory: Send + Sync {
    /// Look up a channel, group or direct-message room by id
    fn channel_group_or_dm_by_id(&self, room_id: &str) -> Option<RoomInfo>;
}

/// Identity of the hosting robot
///
/// Every accessor is optional; the pipeline substitutes `unknown`.
pub trait RobotIdentity: Send + Sync {
    /// Name of the chat adapter the robot runs on
    fn adapter_name(&self) -> Option<String>;

    /// Name of the robot
    fn robot_name(&self) -> Option<String>;

    /// Room lookup capability, when the adapter exposes one
    fn room_directory(&self) -> Option<Arc<dyn RoomDirectory>> {
        None
    }
}

/// Robot identity with fixed values
#[derive(Clone, Default)]
pub struct StaticRobotIdentity {
    adapter_name: Option<String>,
    robot_name: Option<String>,
    rooms: Option<Arc<dyn RoomDirectory>>,
}

impl StaticRobotIdentity {
    /// Create an identity with no known values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the adapter name
    pub fn with_adapter_name(mut self, name: impl Into<String>) -> Self {
        self.adapter_name = Some(name.into());
        self
    }

    /// Set the robot name
    pub fn with_robot_name(mut self, name: impl Into<String>) -> Self {
        self.robot_name = Some(name.into());
        self
    }

    /// Attach a room lookup
    pub fn with_room_directory(mut self, rooms: Arc<dyn RoomDirectory>) -> Self {
        self.rooms = Some(rooms);
        self
    }
}

impl RobotIdentity for StaticRobotIdentity {
    fn adapter_name(&self) -> Option<String> {
        self.adapter_name.clone()
    }

    fn robot_name(&self) -> Option<String> {
        self.robot_name.clone()
    }

    fn room_directory(&self) -> Option<Arc<dyn RoomDirectory>> {
        self.rooms.clone()
    }
}

/// Room directory backed by a map
#[derive(Debug, Clone, Default)]
pub struct InMemoryRoomDirectory {
    rooms: HashMap<String, RoomInfo>,
}

impl InMemoryRoomDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named room
    pub fn with_room(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        let id = id.into();
        self.rooms.insert(
            id.clone(),
            RoomInfo {
                id,
                name: Some(name.into()),
            },
        );
        self
    }

    /// Add a room the adapter knows but has no name for
    pub fn with_unnamed_room(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.rooms.insert(id.clone(), RoomInfo { id, name: None });
        self
    }
}

impl RoomDirectory for InMemoryRoomDirectory {
    fn channel_group_or_dm_by_id(&self, room_id: &str) -> Option<RoomInfo> {
        self.rooms.get(room_id).cloned()
    }
}
