//! # Host Filter
//!
//! Substring blacklist of destinations whose HTTP traffic is never audited:
//! the audit backend itself (auditing its own requests would loop forever)
//! and the chat platform's API host.

use serde::{Deserialize, Serialize};

/// Platform API host substring excluded from the HTTP audit trail
pub const PLATFORM_API_HOST: &str = "api.slack.com/api/";

const HTTP_PREFIX: &str = "http://";
const HTTPS_PREFIX: &str = "https://";

/// Strip a leading `http://` or `https://` from a URL
///
/// Only one prefix is removed; `http://` is checked first. Returns `None` for
/// missing or empty input and the input unchanged when neither prefix leads.
///
/// # Examples
///
/// ```
/// use hubot_audit_core::remove_protocol;
///
/// assert_eq!(remove_protocol(Some("https://estest")), Some("estest".to_string()));
/// assert_eq!(remove_protocol(Some("estest")), Some("estest".to_string()));
/// assert_eq!(remove_protocol(None), None);
/// ```
pub fn remove_protocol(url: Option<&str>) -> Option<String> {
    let url = url.filter(|u| !u.is_empty())?;

    if let Some(rest) = url.strip_prefix(HTTP_PREFIX) {
        return Some(rest.to_string());
    }

    if let Some(rest) = url.strip_prefix(HTTPS_PREFIX) {
        return Some(rest.to_string());
    }

    Some(url.to_string())
}

/// Blacklist of destination host substrings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFilter {
    blacklisted_hosts: Vec<String>,
}

impl HostFilter {
    /// Build the filter from the audit endpoint and the platform API host
    ///
    /// Blank entries are dropped: an empty substring would match every URL.
    pub fn new(audit_endpoint: Option<&str>, platform_api_host: &str) -> Self {
        let mut blacklisted_hosts = Vec::with_capacity(2);

        if let Some(endpoint_host) = remove_protocol(audit_endpoint) {
            blacklisted_hosts.push(endpoint_host);
        }
        blacklisted_hosts.push(platform_api_host.to_string());

        Self::from_hosts(blacklisted_hosts)
    }

    /// Build a filter from explicit substrings
    pub fn from_hosts<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let blacklisted_hosts = hosts
            .into_iter()
            .map(Into::into)
            .filter(|h: &String| !h.trim().is_empty())
            .collect();
        Self { blacklisted_hosts }
    }

    /// Blacklisted substrings in match order
    pub fn blacklisted_hosts(&self) -> &[String] {
        &self.blacklisted_hosts
    }

    /// False if the URL contains any blacklisted substring
    pub fn is_allowed(&self, candidate_url: &str) -> bool {
        !self
            .blacklisted_hosts
            .iter()
            .any(|host| candidate_url.contains(host.as_str()))
    }
}

#[cfg(test)]
#[path = "host_filter_tests.rs"]
mod tests;
