use sb_domain::config::{
    Config, ConfigSeverity, FailurePolicy, LogFormat, OutputFormat, StorageKind,
};

#[test]
fn default_orchestrator_bounds() {
    let config = Config::default();
    assert_eq!(config.orchestrator.max_tool_rounds, 10);
    assert_eq!(config.orchestrator.invalid_call_threshold, 2);
    assert_eq!(config.orchestrator.output_format, OutputFormat::Text);
    assert!(!config.orchestrator.fallback_message.is_empty());
    assert!(config.bootstrap.is_none());
}

#[test]
fn default_config_validates_clean() {
    assert!(Config::default().validate().is_empty());
}

#[test]
fn bootstrap_section_parses_with_default_limits() {
    let toml_str = r#"
[bootstrap]
failure_policy = "strict"

[[bootstrap.intent_calls]]
intent_code = "account-summary"
params = { include_history = true }

[[bootstrap.intent_calls]]
intent_code = "open-bookings"
"#;
    let config = Config::from_toml(toml_str).unwrap();
    let bootstrap = config.bootstrap.expect("bootstrap section");
    assert_eq!(bootstrap.failure_policy, FailurePolicy::Strict);
    assert_eq!(bootstrap.intent_calls.len(), 2);
    assert_eq!(bootstrap.intent_calls[0].params["include_history"], true);
    assert!(bootstrap.intent_calls[1].params.as_object().unwrap().is_empty());
    assert_eq!(bootstrap.limits.max_depth, 4);
    assert_eq!(bootstrap.limits.max_array_items, 20);
    assert_eq!(bootstrap.limits.max_object_keys, 30);
    assert_eq!(bootstrap.limits.max_string_chars, 280);
    assert_eq!(bootstrap.limits.max_payload_bytes, 12_000);
}

#[test]
fn empty_bootstrap_is_a_warning() {
    let config = Config::from_toml("[bootstrap]\n").unwrap();
    let issues = config.validate();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, ConfigSeverity::Warning);
    assert_eq!(issues[0].field, "bootstrap.intent_calls");
}

#[test]
fn jsonl_storage_requires_state_path() {
    let config = Config::from_toml("[sessions]\nstorage = \"jsonl\"\n").unwrap();
    assert_eq!(config.sessions.storage, StorageKind::Jsonl);
    let issues = config.validate();
    assert!(issues
        .iter()
        .any(|e| e.field == "sessions.state_path" && e.severity == ConfigSeverity::Error));
}

#[test]
fn zero_ttl_disables_expiry() {
    let config = Config::from_toml("[sessions]\nttl_secs = 0\n").unwrap();
    assert!(config.sessions.ttl().is_none());
    assert_eq!(Config::default().sessions.ttl().unwrap().as_secs(), 86_400);
}

#[test]
fn observability_defaults_to_json() {
    let config = Config::default();
    assert_eq!(config.observability.log_format, LogFormat::Json);
    assert_eq!(config.observability.log_filter, "info,sb_runtime=debug");
}

#[test]
fn load_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.orchestrator.max_tool_rounds, 10);
}

#[test]
fn load_reports_parse_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("switchboard.toml");
    std::fs::write(&path, "[orchestrator]\nmax_tool_rounds = \"many\"\n").unwrap();
    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("switchboard.toml"));
}
