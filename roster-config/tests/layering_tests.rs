//! Layering of defaults, files and environment pairs into Settings

use roster_config::*;
use std::fs;
use std::path::PathBuf;

fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

struct TempFile(PathBuf);

impl TempFile {
    fn new(name: &str, content: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "roster-config-{}-{}",
            std::process::id(),
            name
        ));
        fs::write(&path, content).unwrap();
        TempFile(path)
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

#[test]
fn test_defaults_only() {
    let settings = Settings::from_sources(None, Vec::new()).unwrap();
    assert_eq!(settings, Settings::default());
}

#[test]
fn test_file_then_environment() {
    let file = TempFile::new(
        "layers.toml",
        r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [session]
            public_paths = ["/health", "/assets/*"]
        "#,
    );

    let settings = Settings::from_sources(
        Some(&file.0),
        env(&[
            ("ROSTER_SERVER__PORT", "9100"),
            ("ROSTER_DATABASE__PATH", "/var/lib/roster.sqlite"),
            ("ROSTER_CORS__ENABLED", "false"),
            ("UNRELATED", "ignored"),
        ]),
    )
    .unwrap();

    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 9100);
    assert_eq!(settings.database.path, "/var/lib/roster.sqlite");
    assert!(!settings.cors.enabled);
    assert_eq!(
        settings.session.public_paths,
        vec!["/health".to_string(), "/assets/*".to_string()]
    );
    assert_eq!(settings.session.login_path, "/login");
}

#[test]
fn test_environment_list_values() {
    let settings = Settings::from_sources(
        None,
        env(&[("ROSTER_SESSION__PUBLIC_PATHS", "/health,/docs/*")]),
    )
    .unwrap();
    assert_eq!(
        settings.session.public_paths,
        vec!["/health".to_string(), "/docs/*".to_string()]
    );
}

#[test]
fn test_json_file() {
    let file = TempFile::new("layers.json", r#"{"database": {"busy_timeout_ms": 250}}"#);
    let settings = Settings::from_sources(Some(&file.0), Vec::new()).unwrap();
    assert_eq!(settings.database.busy_timeout_ms, 250);
}

#[test]
fn test_invalid_port_fails_validation() {
    let result = Settings::from_sources(None, env(&[("ROSTER_SERVER__PORT", "0")]));
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn test_unparseable_number_fails_deserialization() {
    let result = Settings::from_sources(None, env(&[("ROSTER_SERVER__PORT", "eighty")]));
    assert!(matches!(result, Err(ConfigError::DeserializationError(_))));
}

#[test]
fn test_empty_database_path_rejected() {
    let result = Settings::from_sources(None, env(&[("ROSTER_DATABASE__PATH", "")]));
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn test_missing_file_is_load_error() {
    let missing = std::env::temp_dir().join("roster-config-does-not-exist.toml");
    let result = Settings::from_sources(Some(&missing), Vec::new());
    assert!(matches!(result, Err(ConfigError::LoadError(_))));
}
