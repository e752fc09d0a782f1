use idlink_common::observability::LogFormat;
use idlink_config::IdlinkConfigLoader;
use serial_test::serial;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

const FILE_YAML: &str = r#"
api:
  base_url: "https://example.api.oneall.com"
  public_key: "${IDLINK_TEST_PUBLIC_KEY}"
  private_key: "${IDLINK_TEST_PRIVATE_KEY}"
  timeout_secs: 30
logging:
  format: json
  emit_stderr: true
"#;

#[test]
#[serial]
fn loads_file_and_expands_secrets() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "idlink.yaml", FILE_YAML);

    temp_env::with_vars(
        [
            ("IDLINK_TEST_PUBLIC_KEY", Some("pub-123")),
            ("IDLINK_TEST_PRIVATE_KEY", Some("priv-456")),
        ],
        || {
            let config = IdlinkConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load config");

            assert_eq!(config.api.base_url, "https://example.api.oneall.com");
            assert_eq!(config.api.public_key, "pub-123");
            assert_eq!(config.api.private_key, "priv-456");
            assert_eq!(config.api.timeout(), Some(Duration::from_secs(30)));
            assert_eq!(config.logging.format, LogFormat::Json);
            assert!(config.logging.emit_stderr);
            assert_eq!(config.logging.filter, "info");
        },
    );
}

#[test]
#[serial]
fn environment_overrides_file() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "idlink.yaml", FILE_YAML);

    temp_env::with_vars(
        [
            ("IDLINK__API__BASE_URL", Some("https://staging.example.test")),
            ("IDLINK_TEST_PUBLIC_KEY", Some("pub")),
            ("IDLINK_TEST_PRIVATE_KEY", Some("priv")),
        ],
        || {
            let config = IdlinkConfigLoader::new().with_file(&p).load().unwrap();
            assert_eq!(config.api.base_url, "https://staging.example.test");
        },
    );
}

#[test]
#[serial]
fn missing_optional_file_is_fine() {
    let tmp = TempDir::new().unwrap();
    let config = IdlinkConfigLoader::new()
        .with_optional_file(tmp.path().join("absent.yaml"))
        .with_yaml_str("api: { base_url: 'http://localhost', public_key: a, private_key: b }")
        .load()
        .unwrap();
    assert_eq!(config.api.timeout(), None);
    assert!(config.logging.dir.is_none());
}

#[test]
#[serial]
fn missing_required_file_fails() {
    let tmp = TempDir::new().unwrap();
    let result = IdlinkConfigLoader::new()
        .with_file(tmp.path().join("absent.yaml"))
        .load();
    assert!(result.is_err());
}

#[test]
#[serial]
fn missing_api_section_fails() {
    let result = IdlinkConfigLoader::new()
        .with_yaml_str("logging: { filter: debug }")
        .load();
    assert!(result.is_err());
}
