use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use slicknxt_core::config::AppConfig;
use slicknxt_core::error::SlickError;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(content.as_bytes()).expect("write toml");
    tmp
}

#[test]
fn test_load_full_config_from_file() {
    let tmp = write_config(
        r#"
[engine]
tick_rate_hz = 20
input_queue_capacity = 64
event_capacity = 32
autostart = true
flow_file = "flows/demo.json"

[gateway]
bind = "0.0.0.0:9999"
token = "test-token"
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.engine.tick_rate_hz, 20.0);
    assert_eq!(config.engine.tick_interval(), Duration::from_millis(50));
    assert_eq!(config.engine.input_queue_capacity, 64);
    assert_eq!(config.engine.event_capacity, 32);
    assert!(config.engine.autostart);
    assert_eq!(config.engine.flow_file, Some(PathBuf::from("flows/demo.json")));
    assert_eq!(config.gateway.bind, "0.0.0.0:9999");
    assert_eq!(config.gateway.token.as_deref(), Some("test-token"));
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("SLICKNXT_TEST_TOKEN", "expanded-token");

    let tmp = write_config(
        r#"
[gateway]
token = "${SLICKNXT_TEST_TOKEN}"
"#,
    );

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.gateway.token.as_deref(), Some("expanded-token"));

    std::env::remove_var("SLICKNXT_TEST_TOKEN");
}

#[test]
fn test_empty_config_uses_defaults() {
    let tmp = write_config("");
    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.engine.tick_rate_hz, 10.0);
    assert_eq!(config.engine.tick_interval(), Duration::from_millis(100));
    assert_eq!(config.engine.input_queue_capacity, 1024);
    assert_eq!(config.engine.event_capacity, 256);
    assert!(!config.engine.autostart);
    assert!(config.engine.flow_file.is_none());
    assert_eq!(config.gateway.bind, "127.0.0.1:8000");
    assert!(config.gateway.token.is_none());
}

#[test]
fn test_missing_explicit_file_is_not_found() {
    let err = AppConfig::load(std::path::Path::new("/nonexistent/slicknxt.toml")).unwrap_err();
    assert!(matches!(err, SlickError::ConfigNotFound(_)));
    assert_eq!(err.kind(), "config");
}

#[test]
fn test_load_or_default_tolerates_missing_file() {
    let config = AppConfig::load_or_default(std::path::Path::new("/nonexistent/slicknxt.toml"))
        .expect("defaults");
    assert_eq!(config.engine.tick_rate_hz, 10.0);
}

#[test]
fn test_parse_error_is_config_error() {
    let tmp = write_config("[engine]\ntick_rate_hz = \"fast\"\n");
    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, SlickError::Config(_)));
}

#[test]
fn test_effective_config_round_trips_through_toml() {
    let config = AppConfig::default();
    let rendered = toml::to_string_pretty(&config).expect("render");
    let tmp = write_config(&rendered);
    let reloaded = AppConfig::load(tmp.path()).expect("reload");
    assert_eq!(reloaded.gateway.bind, config.gateway.bind);
    assert_eq!(reloaded.engine.tick_rate_hz, config.engine.tick_rate_hz);
}
