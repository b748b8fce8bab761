//! Configuration resolution tests
//!
//! Tests covering:
//! - Priority order: CLI → environment → TOML → compiled defaults
//! - Graceful handling of missing/invalid TOML files
//! - Upload folder initialization
//!
//! Note: Tests that manipulate process environment variables are marked
//! with #[serial] so they do not race each other.

use fingersheet_common::config::{
    load_toml_config, load_toml_config_or_default, CliOverrides, CompiledDefaults,
    ConfigResolver, EnvOverrides, Profile, TomlConfig, UploadFolderInitializer,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_defaults_without_overrides() {
    let config = ConfigResolver::new(Profile::Development)
        .with_env(EnvOverrides::default())
        .resolve();
    let defaults = CompiledDefaults::for_current_platform();

    assert_eq!(config.upload_folder, defaults.upload_folder);
    assert_eq!(config.tesseract_cmd, defaults.tesseract_cmd);
    assert_eq!(config.pdftoppm_cmd, "pdftoppm");
    assert_eq!(config.port, 5000);
    assert_eq!(config.log_level, "debug");
    assert!(config.debug);
    assert!(!config.testing);
    assert!(config.font_path.is_none());
}

#[test]
fn test_production_profile_logs_at_info() {
    let config = ConfigResolver::new(Profile::Production)
        .with_env(EnvOverrides::default())
        .resolve();
    assert!(!config.debug);
    assert_eq!(config.log_level, "info");
}

#[test]
fn test_toml_overrides_defaults() {
    let toml: TomlConfig = toml::from_str(
        r#"
        upload_folder = "/srv/sheets"
        tesseract_cmd = "/opt/tesseract/bin/tesseract"
        pdf_dpi = 300
        processing_timeout_secs = 60
        port = 8080

        [logging]
        level = "warn"
        file = "logs/app.log"
        "#,
    )
    .expect("valid TOML");

    let config = ConfigResolver::new(Profile::Development)
        .with_env(EnvOverrides::default())
        .with_toml(toml)
        .resolve();

    assert_eq!(config.upload_folder, PathBuf::from("/srv/sheets"));
    assert_eq!(config.tesseract_cmd, "/opt/tesseract/bin/tesseract");
    assert_eq!(config.pdf_dpi, 300);
    assert_eq!(config.processing_timeout, Duration::from_secs(60));
    assert_eq!(config.port, 8080);
    assert_eq!(config.log_level, "warn");
    assert_eq!(config.log_file, Some(PathBuf::from("logs/app.log")));
}

#[test]
fn test_env_beats_toml_and_cli_beats_env() {
    let toml = TomlConfig {
        upload_folder: Some(PathBuf::from("/from/toml")),
        tesseract_cmd: Some("toml-tesseract".to_string()),
        secret_key: Some("toml-secret".to_string()),
        ..Default::default()
    };
    let env = EnvOverrides {
        secret_key: Some("env-secret".to_string()),
        upload_folder: Some(PathBuf::from("/from/env")),
        tesseract_cmd: Some("env-tesseract".to_string()),
        pdftoppm_cmd: None,
    };
    let cli = CliOverrides {
        upload_folder: Some(PathBuf::from("/from/cli")),
        ..Default::default()
    };

    let config = ConfigResolver::new(Profile::Production)
        .with_toml(toml)
        .with_env(env)
        .with_cli(cli)
        .resolve();

    assert_eq!(config.upload_folder, PathBuf::from("/from/cli"));
    assert_eq!(config.tesseract_cmd, "env-tesseract");
    assert_eq!(config.secret_key, "env-secret");
}

#[test]
#[serial]
fn test_env_overrides_read_from_process() {
    env::set_var("TESSERACT_CMD", "/usr/local/bin/tesseract");
    env::set_var("SECRET_KEY", "s3cret");
    env::remove_var("UPLOAD_FOLDER");
    env::remove_var("PDFTOPPM_CMD");

    let overrides = EnvOverrides::from_process_env();
    assert_eq!(overrides.tesseract_cmd.as_deref(), Some("/usr/local/bin/tesseract"));
    assert_eq!(overrides.secret_key.as_deref(), Some("s3cret"));
    assert!(overrides.upload_folder.is_none());

    env::remove_var("TESSERACT_CMD");
    env::remove_var("SECRET_KEY");
}

#[test]
#[serial]
fn test_profile_from_env() {
    env::set_var("FLASK_ENV", "production");
    assert_eq!(Profile::from_env(), Profile::Production);

    env::set_var("FLASK_ENV", "something-else");
    assert_eq!(Profile::from_env(), Profile::Base);

    env::remove_var("FLASK_ENV");
    assert_eq!(Profile::from_env(), Profile::Development);
}

#[test]
fn test_missing_toml_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    assert!(load_toml_config(&missing).is_err());

    let config = load_toml_config_or_default(Some(&missing));
    assert!(config.upload_folder.is_none());
    assert!(config.logging.level.is_none());
}

#[test]
fn test_invalid_toml_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "port = \"not a number\"").unwrap();

    assert!(load_toml_config(&path).is_err());
    let config = load_toml_config_or_default(Some(&path));
    assert!(config.port.is_none());
}

#[test]
fn test_upload_folder_initializer_creates_directory() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("nested").join("uploads");

    let initializer = UploadFolderInitializer::new(folder.clone());
    initializer.ensure_directory_exists().unwrap();

    assert!(folder.is_dir());
    assert_eq!(initializer.upload_path("score.pdf"), folder.join("score.pdf"));

    // Idempotent
    initializer.ensure_directory_exists().unwrap();
}

#[test]
fn test_upload_folder_initializer_rejects_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("uploads");
    std::fs::write(&file, b"not a folder").unwrap();

    let initializer = UploadFolderInitializer::new(file);
    assert!(initializer.ensure_directory_exists().is_err());
}
