//! Tests for the destination host blacklist.

use super::*;

mod remove_protocol_tests {
    use super::*;

    #[test]
    fn test_strips_http_prefix() {
        assert_eq!(
            remove_protocol(Some("http://estest/path")),
            Some("estest/path".to_string())
        );
    }

    #[test]
    fn test_strips_https_prefix() {
        assert_eq!(
            remove_protocol(Some("https://estest")),
            Some("estest".to_string())
        );
    }

    #[test]
    fn test_leaves_bare_host_unchanged() {
        assert_eq!(
            remove_protocol(Some("www.cnn.com")),
            Some("www.cnn.com".to_string())
        );
    }

    #[test]
    fn test_missing_or_empty_input_is_none() {
        assert_eq!(remove_protocol(None), None);
        assert_eq!(remove_protocol(Some("")), None);
    }

    /// Verify only the first matching prefix is removed
    #[test]
    fn test_strips_only_one_prefix() {
        assert_eq!(
            remove_protocol(Some("http://https://estest")),
            Some("https://estest".to_string())
        );
    }

    /// Verify a prefix that does not lead the string is kept
    #[test]
    fn test_embedded_prefix_is_not_stripped() {
        assert_eq!(
            remove_protocol(Some("proxy/https://estest")),
            Some("proxy/https://estest".to_string())
        );
    }
}

mod host_filter_tests {
    use super::*;

    fn audit_filter() -> HostFilter {
        HostFilter::new(Some("https://estest"), PLATFORM_API_HOST)
    }

    #[test]
    fn test_blacklist_contains_endpoint_and_platform_host() {
        let filter = audit_filter();

        assert_eq!(
            filter.blacklisted_hosts(),
            &["estest".to_string(), "api.slack.com/api/".to_string()]
        );
    }

    #[test]
    fn test_rejects_platform_api_url() {
        assert!(!audit_filter().is_allowed("api.slack.com/api/"));
        assert!(!audit_filter().is_allowed("api.slack.com/api/chat.postMessage"));
    }

    #[test]
    fn test_rejects_audit_endpoint_variants() {
        let filter = audit_filter();

        assert!(!filter.is_allowed("estest/hubothttprequest/HttpLogEntry"));
        assert!(!filter.is_allowed("eu.estest.internal/path"));
    }

    #[test]
    fn test_accepts_unrelated_url() {
        assert!(audit_filter().is_allowed("www.cnn.com"));
        assert!(audit_filter().is_allowed("www.cnn.com/requestpath"));
    }

    /// Verify a missing endpoint leaves only the platform host blacklisted
    #[test]
    fn test_missing_endpoint_keeps_platform_host() {
        let filter = HostFilter::new(None, PLATFORM_API_HOST);

        assert_eq!(filter.blacklisted_hosts().len(), 1);
        assert!(filter.is_allowed("www.cnn.com"));
        assert!(!filter.is_allowed("api.slack.com/api/users.info"));
    }

    /// Verify blank entries never blacklist everything
    #[test]
    fn test_blank_entries_are_dropped() {
        let filter = HostFilter::from_hosts(["", "  ", "estest"]);

        assert_eq!(filter.blacklisted_hosts(), &["estest".to_string()]);
        assert!(filter.is_allowed("www.cnn.com"));
    }
}
