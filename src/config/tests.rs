use super::*;
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_defaults() {
    let config = MuxConfig::default();
    assert_eq!(config.flush_timeout, Duration::from_millis(4150));
    assert_eq!(config.color_seed, 50);
    assert_eq!(config.force_sequences_var, "FORCE_TERMINAL_SEQUENCES");
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = MuxConfig::from_toml_str(r#"flush_timeout = "250ms""#).unwrap();
    assert_eq!(config.flush_timeout, Duration::from_millis(250));
    assert_eq!(config.color_seed, 50);
}

#[test]
fn test_full_toml() {
    let config = MuxConfig::from_toml_str(
        r#"
flush_timeout = "2s"
color_seed = 9
force_sequences_var = "CLICOLOR_FORCE"
"#,
    )
    .unwrap();
    assert_eq!(config.flush_timeout, Duration::from_secs(2));
    assert_eq!(config.color_seed, 9);
    assert_eq!(config.force_sequences_var, "CLICOLOR_FORCE");
}

#[test]
fn test_unknown_key_rejected() {
    let result = MuxConfig::from_toml_str("flush_timout = \"1s\"");
    assert!(matches!(result, Err(Error::Toml(_))));
}

#[test]
fn test_zero_timeout_rejected() {
    let result = MuxConfig::from_toml_str(r#"flush_timeout = "0s""#);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("procmux.toml");
    fs::write(&path, "color_seed = 1234\n").unwrap();

    let config = MuxConfig::load(&path).unwrap();
    assert_eq!(config.color_seed, 1234);
}

#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = MuxConfig::load(&dir.path().join("absent.toml"));
    match result {
        Err(Error::Config(message)) => assert!(message.contains("absent.toml")),
        other => panic!("Expected Config error, got {other:?}"),
    }
}

#[test]
fn test_env_overrides() {
    let config = MuxConfig::default()
        .merge_env_with(env(&[
            ("PROCMUX_FLUSH_TIMEOUT", "1500ms"),
            ("PROCMUX_COLOR_SEED", "77"),
        ]))
        .unwrap();
    assert_eq!(config.flush_timeout, Duration::from_millis(1500));
    assert_eq!(config.color_seed, 77);
}

#[test]
fn test_invalid_env_override() {
    let result = MuxConfig::default().merge_env_with(env(&[("PROCMUX_COLOR_SEED", "red")]));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_builder_methods() {
    let config = MuxConfig::new()
        .with_flush_timeout(Duration::from_millis(10))
        .with_color_seed(2);
    assert_eq!(config.flush_timeout, Duration::from_millis(10));
    assert_eq!(config.color_seed, 2);
}
