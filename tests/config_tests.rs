mod common;

use common::*;
use std::path::PathBuf;
use yematch::runs::{RunnerConfig, Scramble};

#[test]
fn test_load_config_file() {
    let dir = create_test_dir();
    let path = dir.path().join("yematch.yaml");
    std::fs::write(
        &path,
        r#"
data_root: /var/yematch/data
heartbeat_interval_secs: 5
ready:
  host: ready.qa.internal
  user: yerunner
  ssh_options: ["-o", "BatchMode=yes"]
  scramble: classic
smart:
  base_url: https://ps.qa.internal:8443
  profit_year: 2025
  retry:
    max_attempts: 5
"#,
    )
    .unwrap();

    let config = RunnerConfig::load(&path).unwrap();
    assert_eq!(config.data_root, PathBuf::from("/var/yematch/data"));
    assert_eq!(config.golden_dir, PathBuf::from("golden"));
    assert_eq!(config.heartbeat_interval_secs, 5);
    assert_eq!(config.ready.destination(), "yerunner@ready.qa.internal");
    assert_eq!(config.ready.scramble, Scramble::Classic);
    assert_eq!(config.ready.completion_marker, "EJR COMPLETED");
    assert_eq!(config.smart.profit_year, 2025);
    assert_eq!(config.smart.retry.as_ref().unwrap().max_attempts, 5);
}

#[test]
fn test_invalid_config_names_file() {
    let dir = create_test_dir();
    let path = dir.path().join("broken.yaml");
    std::fs::write(&path, "ready: [not, a, map]\n").unwrap();

    let err = RunnerConfig::load(&path).unwrap_err();
    assert!(err.to_string().contains("broken.yaml"));
}

#[test]
fn test_environment_overrides() {
    let mut config = RunnerConfig::default();
    config.apply_overrides(|key| match key {
        "YEMATCH_SMART_URL" => Some("https://smart.test".to_string()),
        "YEMATCH_SMART_TOKEN" => Some("secret".to_string()),
        _ => None,
    });

    assert_eq!(config.smart.base_url, "https://smart.test");
    assert_eq!(config.smart.token.as_deref(), Some("secret"));
    assert_eq!(config.ready.host, "");
}
