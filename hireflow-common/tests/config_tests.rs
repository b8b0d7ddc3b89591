//! Configuration loading and root folder resolution
//!
//! Tests that touch HIREFLOW_* environment variables are marked #[serial]
//! so they never run in parallel with each other.

use hireflow_common::config::{
    default_root_folder, load_toml_config, resolve_root_folder, TomlConfig, CONFIG_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

fn clear_root_env() {
    env::remove_var("HIREFLOW_ROOT_FOLDER");
    env::remove_var("HIREFLOW_ROOT");
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    clear_root_env();
    let root = resolve_root_folder(None, &TomlConfig::default());
    assert_eq!(root, default_root_folder());
    assert!(!root.as_os_str().is_empty());
}

#[test]
#[serial]
fn test_cli_argument_beats_everything() {
    env::set_var("HIREFLOW_ROOT_FOLDER", "/tmp/hireflow-env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/hireflow-toml")),
        ..TomlConfig::default()
    };

    let root = resolve_root_folder(Some(Path::new("/tmp/hireflow-cli")), &toml);
    assert_eq!(root, PathBuf::from("/tmp/hireflow-cli"));
    clear_root_env();
}

#[test]
#[serial]
fn test_env_var_beats_toml() {
    clear_root_env();
    env::set_var("HIREFLOW_ROOT", "/tmp/hireflow-env-short");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/hireflow-toml")),
        ..TomlConfig::default()
    };

    assert_eq!(
        resolve_root_folder(None, &toml),
        PathBuf::from("/tmp/hireflow-env-short")
    );

    // The long form takes priority over the short one
    env::set_var("HIREFLOW_ROOT_FOLDER", "/tmp/hireflow-env-long");
    assert_eq!(
        resolve_root_folder(None, &toml),
        PathBuf::from("/tmp/hireflow-env-long")
    );
    clear_root_env();
}

#[test]
#[serial]
fn test_blank_env_var_is_ignored() {
    clear_root_env();
    env::set_var("HIREFLOW_ROOT_FOLDER", "   ");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/tmp/hireflow-toml")),
        ..TomlConfig::default()
    };
    assert_eq!(resolve_root_folder(None, &toml), PathBuf::from("/tmp/hireflow-toml"));
    clear_root_env();
}

#[test]
#[serial]
fn test_explicit_config_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hireflow.toml");
    std::fs::write(
        &path,
        "port = 6111\nroot_folder = \"/srv/hireflow\"\n[sla]\nsweep_interval_secs = 0\n",
    )
    .unwrap();

    let loaded = load_toml_config(Some(&path)).unwrap();
    assert_eq!(loaded.path.as_deref(), Some(path.as_path()));
    let config = loaded.config;
    assert_eq!(config.port, 6111);
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/hireflow")));
    assert_eq!(config.sla.sweep_interval_secs, 0);
}

#[test]
#[serial]
fn test_config_env_var_is_consulted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("from-env.toml");
    std::fs::write(&path, "bind_addr = \"0.0.0.0\"\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let loaded = load_toml_config(None).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(loaded.config.bind_addr, "0.0.0.0");
    assert_eq!(loaded.path, Some(path));
}

#[test]
#[serial]
fn test_malformed_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "port = [not valid").unwrap();

    assert!(load_toml_config(Some(&path)).is_err());
}

#[test]
#[serial]
fn test_missing_config_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    env::remove_var(CONFIG_ENV_VAR);

    let loaded = load_toml_config(Some(&missing)).unwrap();
    // a user or system config file may exist on the host
    if loaded.path.is_none() {
        assert_eq!(loaded.config.port, TomlConfig::default().port);
    }
    assert_ne!(loaded.path.as_deref(), Some(missing.as_path()));
}
