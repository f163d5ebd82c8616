//! # Audit Settings and Gate
//!
//! Startup configuration for the audit pipeline and the enable/disable gate.
//!
//! Settings are resolved once, with increasing precedence, from built-in
//! defaults, an optional configuration file and the process environment. The
//! keys are the environment variable names the bot host already uses
//! (`HUBOT_AUDIT_ENDPOINT`, `uuid`, `space_id`, `group_id`, ...), lowercased.
//!
//! The disable flag is the exception: [`AuditGate`] asks its
//! [`DisableFlagSource`] on every call so an operator can switch auditing off
//! in a running process.

use crate::{IdentityTags, DEFAULT_GROUP_ID, DEFAULT_INSTANCE_ID, DEFAULT_SPACE_ID};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::Path,
    sync::{Arc, RwLock},
    time::Duration,
};
use thiserror::Error;
use tracing::debug;

/// Environment variable naming the audit destination endpoint
pub const AUDIT_ENDPOINT_ENV: &str = "HUBOT_AUDIT_ENDPOINT";

/// Environment variable carrying the disable override
pub const DISABLE_FLAG_ENV: &str = "HUBOT_BLUEMIX_AUDIT_DISABLED";

// ============================================================================
// Settings
// ============================================================================

/// Audit configuration resolved at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Audit destination endpoint; absent means auditing is off for the process
    #[serde(default, rename = "hubot_audit_endpoint")]
    pub audit_endpoint: Option<String>,

    /// Disable override as seen at startup
    ///
    /// A value from the settings file is kept as the fallback when the
    /// environment variable is unset; see [`AuditGate::from_settings`].
    #[serde(default, rename = "hubot_bluemix_audit_disabled")]
    pub audit_disabled: Option<String>,

    /// Bot instance identifier
    #[serde(default = "default_instance_id", rename = "uuid")]
    pub instance_id: String,

    /// Space identifier
    #[serde(default = "default_space_id")]
    pub space_id: String,

    /// Group identifier, also sent as the backend auth token
    #[serde(default = "default_group_id")]
    pub group_id: String,

    /// Backend request timeout in seconds
    #[serde(
        default = "default_request_timeout_seconds",
        rename = "hubot_audit_request_timeout_seconds"
    )]
    pub request_timeout_seconds: u64,

    /// Maximum pooled connections kept to the backend
    #[serde(
        default = "default_max_connections",
        rename = "hubot_audit_max_connections"
    )]
    pub max_connections: usize,

    /// Scheme used to reach the backend host
    #[serde(
        default = "default_backend_protocol",
        rename = "hubot_audit_backend_protocol"
    )]
    pub backend_protocol: String,

    /// Port used to reach the backend host
    #[serde(default = "default_backend_port", rename = "hubot_audit_backend_port")]
    pub backend_port: u16,

    /// Platform API host substring that is never audited
    #[serde(
        default = "default_platform_api_host",
        rename = "hubot_audit_platform_api_host"
    )]
    pub platform_api_host: String,

    /// Comma separated sender names whose messages are never audited
    #[serde(
        default = "default_ignored_users",
        rename = "hubot_audit_ignored_users"
    )]
    pub ignored_users: String,
}

fn default_instance_id() -> String {
    DEFAULT_INSTANCE_ID.to_string()
}

fn default_space_id() -> String {
    DEFAULT_SPACE_ID.to_string()
}

fn default_group_id() -> String {
    DEFAULT_GROUP_ID.to_string()
}

fn default_request_timeout_seconds() -> u64 {
    60
}

fn default_max_connections() -> usize {
    1000
}

fn default_backend_protocol() -> String {
    "https".to_string()
}

fn default_backend_port() -> u16 {
    443
}

fn default_platform_api_host() -> String {
    crate::host_filter::PLATFORM_API_HOST.to_string()
}

fn default_ignored_users() -> String {
    "hubot".to_string()
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            audit_endpoint: None,
            audit_disabled: None,
            instance_id: default_instance_id(),
            space_id: default_space_id(),
            group_id: default_group_id(),
            request_timeout_seconds: default_request_timeout_seconds(),
            max_connections: default_max_connections(),
            backend_protocol: default_backend_protocol(),
            backend_port: default_backend_port(),
            platform_api_host: default_platform_api_host(),
            ignored_users: default_ignored_users(),
        }
    }
}

impl AuditSettings {
    /// Load settings from the environment only
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::load(None)
    }

    /// Load settings from an optional file, overridden by the environment
    ///
    /// The file format is inferred from its extension (YAML, TOML or JSON).
    /// A missing explicit file is an error; missing keys fall back to defaults.
    pub fn load(config_file: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_file {
            debug!(path = %path.display(), "Loading audit settings file");
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(config::Environment::default())
            .build()
            .map_err(|e| SettingsError::Load {
                message: e.to_string(),
            })?;

        let settings: AuditSettings =
            config
                .try_deserialize()
                .map_err(|e| SettingsError::Load {
                    message: e.to_string(),
                })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check that tuning values are usable
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.request_timeout_seconds == 0 {
            return Err(SettingsError::Invalid {
                key: "hubot_audit_request_timeout_seconds".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        if self.backend_port == 0 {
            return Err(SettingsError::Invalid {
                key: "hubot_audit_backend_port".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        match self.backend_protocol.as_str() {
            "http" | "https" => Ok(()),
            other => Err(SettingsError::Invalid {
                key: "hubot_audit_backend_protocol".to_string(),
                message: format!("expected http or https, got '{}'", other),
            }),
        }
    }

    /// Configured endpoint, ignoring blank values
    pub fn audit_endpoint(&self) -> Option<&str> {
        self.audit_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    /// Identity tags with literal defaults for blank values
    pub fn identity_tags(&self) -> IdentityTags {
        IdentityTags::new(
            self.instance_id.clone(),
            self.space_id.clone(),
            self.group_id.clone(),
        )
    }

    /// Sender names excluded from the adapter audit trail
    pub fn ignored_users(&self) -> Vec<String> {
        self.ignored_users
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Backend request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

// ============================================================================
// Disable Flag Sources
// ============================================================================

/// Source of the disable override, consulted on every gate check
pub trait DisableFlagSource: Send + Sync + fmt::Debug {
    /// Current raw value of the disable flag, if set
    fn disable_flag(&self) -> Option<String>;
}

/// Reads the disable flag from a process environment variable on each call
#[derive(Debug, Clone)]
pub struct EnvDisableFlag {
    variable: String,
}

impl EnvDisableFlag {
    /// Read the flag from a custom variable
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl Default for EnvDisableFlag {
    fn default() -> Self {
        Self::new(DISABLE_FLAG_ENV)
    }
}

impl DisableFlagSource for EnvDisableFlag {
    fn disable_flag(&self) -> Option<String> {
        std::env::var(&self.variable).ok()
    }
}

/// In-process disable flag that can be toggled at runtime
///
/// Clones share the same underlying value.
#[derive(Debug, Clone, Default)]
pub struct SharedDisableFlag {
    value: Arc<RwLock<Option<String>>>,
}

impl SharedDisableFlag {
    /// Create a flag holding an initial value
    pub fn with_value(value: impl Into<String>) -> Self {
        let flag = Self::default();
        flag.set(value);
        flag
    }

    /// Replace the flag value
    pub fn set(&self, value: impl Into<String>) {
        let mut guard = match self.value.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(value.into());
    }

    /// Remove the flag value
    pub fn clear(&self) {
        let mut guard = match self.value.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = None;
    }
}

impl DisableFlagSource for SharedDisableFlag {
    fn disable_flag(&self) -> Option<String> {
        match self.value.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Live flag source with a fallback value from startup settings
///
/// The live source wins whenever it holds a value, so runtime toggles keep
/// working; the fallback applies only while the live source is unset.
#[derive(Debug, Clone)]
pub struct FallbackDisableFlag {
    live: Arc<dyn DisableFlagSource>,
    fallback: Option<String>,
}

impl FallbackDisableFlag {
    /// Wrap a live source with a fallback value
    pub fn new(live: Arc<dyn DisableFlagSource>, fallback: Option<String>) -> Self {
        Self { live, fallback }
    }
}

impl DisableFlagSource for FallbackDisableFlag {
    fn disable_flag(&self) -> Option<String> {
        self.live.disable_flag().or_else(|| self.fallback.clone())
    }
}

/// Whether a disable flag value switches auditing off
///
/// Only the exact strings `true` and `TRUE` count.
pub fn is_truthy_flag(value: &str) -> bool {
    value == "true" || value == "TRUE"
}

// ============================================================================
// Gate
// ============================================================================

/// Why the gate is open or closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateState {
    /// Records are produced and delivered
    Enabled,
    /// The disable flag is set to a truthy value
    DisabledByFlag,
    /// No audit endpoint is configured
    NoEndpoint,
}

impl GateState {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::DisabledByFlag => "disabled-by-flag",
            Self::NoEndpoint => "no-endpoint",
        }
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Enable/disable check consulted before any record is produced
///
/// The endpoint is fixed at construction. The disable flag is read from the
/// source on every call and never cached.
#[derive(Debug, Clone)]
pub struct AuditGate {
    endpoint: Option<String>,
    flag: Arc<dyn DisableFlagSource>,
}

impl AuditGate {
    /// Create a gate for an endpoint and flag source
    pub fn new(endpoint: Option<String>, flag: Arc<dyn DisableFlagSource>) -> Self {
        let endpoint = endpoint
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        Self { endpoint, flag }
    }

    /// Create a gate reading the disable flag from the environment
    ///
    /// While the environment variable is unset, the flag loaded from the
    /// settings file applies. A startup value that came from the environment
    /// itself is not kept, so unsetting the variable re-enables auditing.
    pub fn from_settings(settings: &AuditSettings) -> Self {
        let live = EnvDisableFlag::default();
        let fallback = match live.disable_flag() {
            Some(_) => None,
            None => settings.audit_disabled.clone(),
        };

        Self::new(
            settings.audit_endpoint().map(str::to_string),
            Arc::new(FallbackDisableFlag::new(Arc::new(live), fallback)),
        )
    }

    /// Configured audit endpoint
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Current gate state
    pub fn state(&self) -> GateState {
        let flagged = self
            .flag
            .disable_flag()
            .is_some_and(|value| is_truthy_flag(&value));

        if flagged {
            GateState::DisabledByFlag
        } else if self.endpoint.is_none() {
            GateState::NoEndpoint
        } else {
            GateState::Enabled
        }
    }

    /// True if the disable flag is truthy or no endpoint is configured
    pub fn audit_disabled(&self) -> bool {
        self.state() != GateState::Enabled
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while resolving audit settings
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Failed to load audit settings: {message}")]
    Load { message: String },

    #[error("Invalid audit setting '{key}': {message}")]
    Invalid { key: String, message: String },
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
