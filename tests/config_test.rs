use relbot::config::{load_config, Config};
use serial_test::serial;
use std::fs;
use std::io::Write;

#[test]
fn test_load_custom_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [branches]
        release = "trunk"
        stable = "published"

        [marker]
        path = "widget.toml"
        "#
    )
    .unwrap();

    let config = load_config(Some(file.path())).unwrap();
    assert_eq!(config.branches.release, "trunk");
    assert_eq!(config.branches.stable, "published");
    assert_eq!(config.marker.path, "widget.toml");
    // Unspecified sections keep their defaults.
    assert_eq!(config.marker.key, "version");
    assert_eq!(config.retry.attempts, 3);
}

#[test]
fn test_missing_custom_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(load_config(Some(&missing)).is_err());
}

#[test]
fn test_invalid_toml_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "branches = not valid toml").unwrap();
    let err = load_config(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}

#[test]
#[serial]
fn test_discovers_config_in_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("relbot.toml"),
        "[branches]\nrelease = \"trunk\"\n",
    )
    .unwrap();

    let original = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    let config = load_config(None).unwrap();
    std::env::set_current_dir(original).unwrap();

    assert_eq!(config.branches.release, "trunk");
}

#[test]
#[serial]
fn test_defaults_without_any_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let original = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    let config = load_config(None).unwrap();
    std::env::set_current_dir(original).unwrap();

    assert_eq!(config, Config::default());
}
