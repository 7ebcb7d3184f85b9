use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use bugline::{config::GlobalConfig, AppError};

fn sample_toml() -> String {
    r#"
http_port = 8080
default_assignee = "Rushil Nagarsheth"

[slack]
trigger_keyword = "bug!"
listen_to_mentions = true

[linear]
team_id = "team-123"

[enrichment]
model = "gpt-4o-mini"
temperature = 0.3

[http]
timeout_seconds = 10
max_retries = 2
retry_delay_ms = 100

[labels]
Bug = "label-bug"
feature = "label-feature"
Improvement = "label-improvement"

[[roster]]
name = "Bhavik Patel"
role = "Founding Engineer"
expertise = "core functionality issues and backend performance problems"
assignee_id = "user-bhavik"

[[roster]]
name = "Rushil Nagarsheth"
role = "Founder"
expertise = "infrastructure and triage"
assignee_id = "user-rushil"
aliases = ["kp07usa"]
"#
    .to_owned()
}

fn minimal_toml() -> String {
    r#"
default_assignee = "Sam"

[linear]
team_id = "team-1"

[labels]
Bug = "label-bug"

[[roster]]
name = "Sam"
expertise = "everything"
assignee_id = "user-sam"
"#
    .to_owned()
}

#[test]
fn parses_valid_config() {
    let config = GlobalConfig::from_toml_str(&sample_toml()).expect("valid config");

    assert_eq!(config.http_port, 8080);
    assert_eq!(config.linear.team_id, "team-123");
    assert_eq!(config.enrichment.model, "gpt-4o-mini");
    assert!((config.enrichment.temperature - 0.3).abs() < f32::EPSILON);
    assert_eq!(config.roster.len(), 2);
    assert_eq!(config.default_assignee, "Rushil Nagarsheth");

    let policy = config.http.retry_policy();
    assert_eq!(policy.timeout, Duration::from_secs(10));
    assert_eq!(policy.max_retries, 2);
    assert_eq!(policy.base_delay, Duration::from_millis(100));
}

#[test]
fn defaults_fill_omitted_sections() {
    let config = GlobalConfig::from_toml_str(&minimal_toml()).expect("valid config");

    assert_eq!(config.http_port, 5005);
    assert_eq!(config.slack.trigger_keyword, "bug!");
    assert!(config.slack.listen_to_mentions);
    assert_eq!(config.linear.api_url, "https://api.linear.app/graphql");
    assert_eq!(
        config.enrichment.api_url,
        "https://api.openai.com/v1/chat/completions"
    );
    assert_eq!(config.enrichment.model, "gpt-4o");
    assert!(config.enrichment.include_image_urls);
    assert_eq!(config.http.timeout_seconds, 30);
    assert_eq!(config.http.max_retries, 1);
}

#[test]
fn credentials_are_never_read_from_toml() {
    let toml = minimal_toml().replace(
        "[linear]\nteam_id = \"team-1\"",
        "[linear]\nteam_id = \"team-1\"\napi_key = \"lin_api_secret\"",
    );
    let config = GlobalConfig::from_toml_str(&toml).expect("valid config");
    assert!(config.linear.api_key.is_empty());
}

#[test]
fn label_catalog_capitalizes_keys() {
    let config = GlobalConfig::from_toml_str(&sample_toml()).expect("valid config");
    let catalog = config.label_catalog().expect("catalog");

    assert_eq!(catalog.id_for("Feature"), Some("label-feature"));
    assert_eq!(catalog.id_for("feature"), Some("label-feature"));
    assert_eq!(catalog.fallback_id(), "label-bug");
}

#[test]
fn roster_default_resolves_through_config() {
    let config = GlobalConfig::from_toml_str(&sample_toml()).expect("valid config");
    let roster = config.roster().expect("roster");

    assert_eq!(roster.default_entry().assignee_id, "user-rushil");
    assert_eq!(
        roster.lookup("kp07usa").map(|e| e.assignee_id.as_str()),
        Some("user-rushil")
    );
}

#[test]
fn missing_team_id_is_rejected() {
    let toml = minimal_toml().replace("team_id = \"team-1\"", "team_id = \"\"");
    let err = GlobalConfig::from_toml_str(&toml).expect_err("must fail");
    assert!(matches!(err, AppError::Config(msg) if msg.contains("team_id")));
}

#[test]
fn missing_bug_label_is_rejected() {
    let toml = minimal_toml().replace("Bug = \"label-bug\"", "Feature = \"label-feature\"");
    let err = GlobalConfig::from_toml_str(&toml).expect_err("must fail");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn unknown_default_assignee_is_rejected() {
    let toml = minimal_toml().replace("default_assignee = \"Sam\"", "default_assignee = \"Alex\"");
    let err = GlobalConfig::from_toml_str(&toml).expect_err("must fail");
    assert!(matches!(err, AppError::Config(msg) if msg.contains("Alex")));
}

#[test]
fn empty_roster_is_rejected() {
    let toml = r#"
roster = []
default_assignee = "Sam"

[linear]
team_id = "team-1"

[labels]
Bug = "label-bug"
"#;
    let err = GlobalConfig::from_toml_str(toml).expect_err("must fail");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn out_of_range_temperature_is_rejected() {
    for bad in ["0.0", "2.5"] {
        let toml = format!("{}\n[enrichment]\ntemperature = {bad}\n", minimal_toml());
        let err = GlobalConfig::from_toml_str(&toml).expect_err("must fail");
        assert!(matches!(err, AppError::Config(msg) if msg.contains("temperature")));
    }
}

#[test]
fn zero_timeout_is_rejected() {
    let toml = format!("{}\n[http]\ntimeout_seconds = 0\n", minimal_toml());
    assert!(GlobalConfig::from_toml_str(&toml).is_err());
}

#[test]
fn invalid_toml_maps_to_config_error() {
    let err = GlobalConfig::from_toml_str("default_assignee = [").expect_err("must fail");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn env_overrides_replace_file_values() {
    let env: HashMap<&str, &str> = HashMap::from([
        ("LINEAR_TEAM_ID", "team-from-env"),
        ("LINEAR_FEATURE_LABEL_ID", "feature-from-env"),
        ("OPENAI_MODEL", "gpt-4.1"),
        ("LINEAR_IMPROVEMENT_LABEL_ID", "  "),
    ]);
    let config = GlobalConfig::from_toml_str_with_env(&sample_toml(), |key| {
        env.get(key).map(|value| (*value).to_owned())
    })
    .expect("valid config");

    assert_eq!(config.linear.team_id, "team-from-env");
    assert_eq!(config.enrichment.model, "gpt-4.1");

    let catalog = config.label_catalog().expect("catalog");
    assert_eq!(catalog.id_for("Feature"), Some("feature-from-env"));
    assert_eq!(catalog.id_for("Improvement"), Some("label-improvement"));
}

#[test]
fn env_override_supplies_missing_team_id() {
    let toml = minimal_toml().replace("team_id = \"team-1\"", "");
    let config = GlobalConfig::from_toml_str_with_env(&toml, |key| {
        (key == "LINEAR_TEAM_ID").then(|| "team-env".to_owned())
    })
    .expect("valid config");
    assert_eq!(config.linear.team_id, "team-env");
}

#[test]
fn loads_from_file_path() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(minimal_toml().as_bytes()).expect("write");

    let config = GlobalConfig::load_from_path(file.path()).expect("loads");
    assert_eq!(config.default_assignee, "Sam");
}

#[test]
fn missing_file_is_a_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = GlobalConfig::load_from_path(dir.path().join("absent.toml")).expect_err("must fail");
    assert!(matches!(err, AppError::Config(_)));
}
