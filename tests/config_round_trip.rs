//! Config round-trip tests.
//!
//! Write a TOML file and a `.env` file, read them back through
//! `Config::resolve_from`, and check precedence. Each test uses a tempdir for
//! isolation and never touches the process environment.

use std::collections::HashMap;
use std::time::Duration;

use tempfile::tempdir;

use volume_loader::ConfigError;
use volume_loader::config::{Config, ENV_MOUNT_PATH, ENV_STOP_GRACE_SECS};

/// Parse a .env file into a HashMap using dotenvy.
fn read_env_map(path: &std::path::Path) -> HashMap<String, String> {
    dotenvy::from_path_iter(path)
        .expect("dotenvy should parse the .env file")
        .filter_map(|r| r.ok())
        .collect()
}

fn lookup(
    map: HashMap<String, String>,
) -> impl Fn(&str) -> Result<Option<String>, ConfigError> {
    move |key| Ok(map.get(key).cloned())
}

#[test]
fn file_values_are_used() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("volume-loader.toml");
    std::fs::write(
        &path,
        r#"
stop_grace_secs = 45
mount_path = "/restore-target"
source_path = "/snapshot"
strict_resolve = true
keep_failed_loader = false
"#,
    )
    .unwrap();

    let config = Config::resolve_from(Some(&path), lookup(HashMap::new())).unwrap();

    assert_eq!(config.stop_grace_secs, 45);
    assert_eq!(config.mount_path, "/restore-target");
    assert_eq!(config.source_path, "/snapshot");
    assert!(config.strict_resolve);
    assert!(!config.keep_failed_loader);

    let runtime = config.volume_config();
    assert_eq!(runtime.stop_grace, Duration::from_secs(45));
    assert_eq!(runtime.bind_for("pgdata"), "pgdata:/restore-target");
}

#[test]
fn dotenv_overrides_file() {
    let dir = tempdir().unwrap();
    let toml_path = dir.path().join("volume-loader.toml");
    std::fs::write(&toml_path, "stop_grace_secs = 45\nmount_path = \"/from-file\"\n").unwrap();

    let env_path = dir.path().join(".env");
    std::fs::write(
        &env_path,
        format!("{ENV_STOP_GRACE_SECS}=5\n{ENV_MOUNT_PATH}=\"/from-env\"\n"),
    )
    .unwrap();

    let config = Config::resolve_from(Some(&toml_path), lookup(read_env_map(&env_path))).unwrap();

    assert_eq!(config.stop_grace_secs, 5);
    assert_eq!(config.mount_path, "/from-env");
}

#[test]
fn unknown_file_keys_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("volume-loader.toml");
    std::fs::write(&path, "stop_grace = 45\n").unwrap();

    let err = Config::resolve_from(Some(&path), lookup(HashMap::new())).unwrap_err();

    assert!(matches!(err, ConfigError::ParseFile { .. }), "got {err}");
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let err = Config::resolve_from(Some(&path), lookup(HashMap::new())).unwrap_err();

    assert!(matches!(err, ConfigError::Io(_)));
}
