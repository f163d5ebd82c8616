//! Tests for audit settings loading and the audit gate.

use super::*;
use serial_test::serial;
use std::io::Write;

const SETTINGS_VARS: &[&str] = &[
    "HUBOT_AUDIT_ENDPOINT",
    "HUBOT_BLUEMIX_AUDIT_DISABLED",
    "uuid",
    "space_id",
    "group_id",
    "HUBOT_AUDIT_BACKEND_PROTOCOL",
    "HUBOT_AUDIT_BACKEND_PORT",
    "HUBOT_AUDIT_IGNORED_USERS",
];

fn clear_settings_env() {
    for var in SETTINGS_VARS {
        std::env::remove_var(var);
    }
}

fn gate_with_flag(endpoint: Option<&str>, flag: &SharedDisableFlag) -> AuditGate {
    AuditGate::new(endpoint.map(str::to_string), Arc::new(flag.clone()))
}

// ============================================================================
// Settings Loading
// ============================================================================

mod settings_loading_tests {
    use super::*;

    /// Verify an empty environment yields the built-in defaults
    #[test]
    #[serial]
    fn test_load_without_environment_uses_defaults() {
        clear_settings_env();

        let settings = AuditSettings::from_env().unwrap();

        assert_eq!(settings.audit_endpoint(), None);
        assert_eq!(settings.identity_tags(), IdentityTags::default());
        assert_eq!(settings.request_timeout(), Duration::from_secs(60));
        assert_eq!(settings.max_connections, 1000);
        assert_eq!(settings.backend_protocol, "https");
        assert_eq!(settings.backend_port, 443);
        assert_eq!(settings.platform_api_host, "api.slack.com/api/");
        assert_eq!(settings.ignored_users(), vec!["hubot".to_string()]);
    }

    /// Verify the host's environment variable names are honoured
    #[test]
    #[serial]
    fn test_load_reads_host_environment_variables() {
        clear_settings_env();
        std::env::set_var("HUBOT_AUDIT_ENDPOINT", "https://estest");
        std::env::set_var("uuid", "instance-7");
        std::env::set_var("space_id", "space-7");
        std::env::set_var("group_id", "group-7");
        std::env::set_var("HUBOT_AUDIT_IGNORED_USERS", "hubot, test-runner");

        let settings = AuditSettings::from_env().unwrap();
        clear_settings_env();

        assert_eq!(settings.audit_endpoint(), Some("https://estest"));
        assert_eq!(
            settings.identity_tags(),
            IdentityTags::new("instance-7", "space-7", "group-7")
        );
        assert_eq!(
            settings.ignored_users(),
            vec!["hubot".to_string(), "test-runner".to_string()]
        );
    }

    /// Verify blank identity values fall back to the literal defaults
    #[test]
    #[serial]
    fn test_blank_identity_values_use_defaults() {
        clear_settings_env();
        std::env::set_var("uuid", "");

        let settings = AuditSettings::from_env().unwrap();
        clear_settings_env();

        assert_eq!(settings.identity_tags().instance_id, "DEFAULT_UUID");
    }

    /// Verify file values apply and the environment overrides them
    #[test]
    #[serial]
    fn test_file_values_are_overridden_by_environment() {
        clear_settings_env();
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "hubot_audit_endpoint: https://from-file.example.com").unwrap();
        writeln!(file, "space_id: file-space").unwrap();
        writeln!(file, "hubot_audit_backend_port: 9200").unwrap();
        std::env::set_var("space_id", "env-space");

        let settings = AuditSettings::load(Some(file.path())).unwrap();
        clear_settings_env();

        assert_eq!(
            settings.audit_endpoint(),
            Some("https://from-file.example.com")
        );
        assert_eq!(settings.space_id, "env-space");
        assert_eq!(settings.backend_port, 9200);
    }

    /// Verify a missing explicit settings file is reported
    #[test]
    #[serial]
    fn test_missing_settings_file_fails() {
        clear_settings_env();
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("absent.yaml");

        let result = AuditSettings::load(Some(&missing));

        assert!(matches!(result, Err(SettingsError::Load { .. })));
    }

    /// Verify an unsupported backend protocol is rejected
    #[test]
    #[serial]
    fn test_invalid_backend_protocol_fails_validation() {
        clear_settings_env();
        std::env::set_var("HUBOT_AUDIT_BACKEND_PROTOCOL", "ftp");

        let result = AuditSettings::from_env();
        clear_settings_env();

        match result {
            Err(SettingsError::Invalid { key, .. }) => {
                assert_eq!(key, "hubot_audit_backend_protocol")
            }
            other => panic!("expected Invalid error, got {:?}", other),
        }
    }

    /// Verify a blank endpoint counts as absent
    #[test]
    fn test_blank_endpoint_is_absent() {
        let settings = AuditSettings {
            audit_endpoint: Some("   ".to_string()),
            ..AuditSettings::default()
        };

        assert_eq!(settings.audit_endpoint(), None);
    }
}

// ============================================================================
// Audit Gate
// ============================================================================

mod audit_gate_tests {
    use super::*;

    /// Verify only the two exact truthy spellings disable auditing
    #[test]
    fn test_truthy_flag_values() {
        assert!(is_truthy_flag("true"));
        assert!(is_truthy_flag("TRUE"));

        assert!(!is_truthy_flag("True"));
        assert!(!is_truthy_flag("1"));
        assert!(!is_truthy_flag("yes"));
        assert!(!is_truthy_flag("false"));
        assert!(!is_truthy_flag(""));
    }

    /// Verify a missing endpoint keeps the gate closed
    #[test]
    fn test_gate_without_endpoint_is_disabled() {
        let flag = SharedDisableFlag::default();
        let gate = gate_with_flag(None, &flag);

        assert!(gate.audit_disabled());
        assert_eq!(gate.state(), GateState::NoEndpoint);
    }

    /// Verify a configured endpoint and no flag opens the gate
    #[test]
    fn test_gate_with_endpoint_is_enabled() {
        let flag = SharedDisableFlag::with_value("false");
        let gate = gate_with_flag(Some("https://estest"), &flag);

        assert!(!gate.audit_disabled());
        assert_eq!(gate.state(), GateState::Enabled);
        assert_eq!(gate.endpoint(), Some("https://estest"));
    }

    /// Verify toggling the flag takes effect on the next check
    #[test]
    fn test_gate_rereads_flag_on_every_call() {
        let flag = SharedDisableFlag::default();
        let gate = gate_with_flag(Some("https://estest"), &flag);
        assert!(!gate.audit_disabled());

        flag.set("TRUE");
        assert!(gate.audit_disabled());
        assert_eq!(gate.state(), GateState::DisabledByFlag);

        flag.clear();
        assert!(!gate.audit_disabled());
    }

    /// Verify the flag wins over a configured endpoint when both disable
    #[test]
    fn test_flag_reported_before_missing_endpoint() {
        let flag = SharedDisableFlag::with_value("true");
        let gate = gate_with_flag(None, &flag);

        assert_eq!(gate.state(), GateState::DisabledByFlag);
    }

    /// Verify the environment flag source is read live
    #[test]
    #[serial]
    fn test_env_flag_source_reads_variable_each_call() {
        let source = EnvDisableFlag::new("HUBOT_AUDIT_TEST_DISABLE_FLAG");
        std::env::remove_var("HUBOT_AUDIT_TEST_DISABLE_FLAG");
        let gate = AuditGate::new(Some("https://estest".to_string()), Arc::new(source));

        assert!(!gate.audit_disabled());

        std::env::set_var("HUBOT_AUDIT_TEST_DISABLE_FLAG", "true");
        assert!(gate.audit_disabled());

        std::env::remove_var("HUBOT_AUDIT_TEST_DISABLE_FLAG");
        assert!(!gate.audit_disabled());
    }

    /// Verify a disable flag in the settings file closes the gate
    #[test]
    #[serial]
    fn test_flag_from_settings_file_disables_gate() {
        clear_settings_env();
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "hubot_audit_endpoint: https://estest").unwrap();
        writeln!(file, "hubot_bluemix_audit_disabled: \"true\"").unwrap();

        let settings = AuditSettings::load(Some(file.path())).unwrap();
        let gate = AuditGate::from_settings(&settings);

        assert_eq!(settings.audit_disabled.as_deref(), Some("true"));
        assert!(gate.audit_disabled());
        assert_eq!(gate.state(), GateState::DisabledByFlag);

        std::env::set_var(DISABLE_FLAG_ENV, "false");
        assert!(!gate.audit_disabled());

        std::env::remove_var(DISABLE_FLAG_ENV);
        assert!(gate.audit_disabled());
    }

    /// Verify a flag taken from the environment at startup can be unset later
    #[test]
    #[serial]
    fn test_startup_environment_flag_is_not_kept_as_fallback() {
        clear_settings_env();
        std::env::set_var("HUBOT_AUDIT_ENDPOINT", "https://estest");
        std::env::set_var(DISABLE_FLAG_ENV, "true");

        let settings = AuditSettings::from_env().unwrap();
        let gate = AuditGate::from_settings(&settings);
        assert!(gate.audit_disabled());

        std::env::remove_var(DISABLE_FLAG_ENV);
        let reenabled = !gate.audit_disabled();
        clear_settings_env();

        assert!(reenabled);
    }

    #[test]
    fn test_live_flag_wins_over_fallback() {
        let live = SharedDisableFlag::default();
        let source = FallbackDisableFlag::new(Arc::new(live.clone()), Some("TRUE".to_string()));

        assert_eq!(source.disable_flag().as_deref(), Some("TRUE"));

        live.set("false");
        assert_eq!(source.disable_flag().as_deref(), Some("false"));
    }
}
