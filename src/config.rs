use crate::core::{OrmError, Result};
use crate::schema::check_identifier;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    pub logging: Option<LoggingConfig>,
}

/// Connection-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path, or ":memory:" for an in-memory database
    #[serde(default = "default_database_path")]
    pub path: String,
    pub journal_mode: Option<String>,
    pub synchronous: Option<String>,
    pub busy_timeout_ms: Option<u64>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: default_database_path(),
            journal_mode: None,
            synchronous: None,
            busy_timeout_ms: None,
        }
    }
}

fn default_database_path() -> String {
    ":memory:".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// One of "trace", "debug", "info", "warn", "error"
    pub level: Option<String>,
}

impl Config {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| OrmError::Config(e.to_string()))
    }

    /// Pragma statements implied by this configuration, in execution order.
    ///
    /// `journal_mode` and `synchronous` must be bare keywords; anything else
    /// is rejected before it reaches SQL text.
    pub fn pragmas(&self) -> Result<Vec<String>> {
        let mut pragmas = Vec::new();
        if let Some(mode) = &self.database.journal_mode {
            let mode = pragma_keyword("journal_mode", mode)?;
            pragmas.push(format!("PRAGMA journal_mode = {};", mode));
        }
        if let Some(sync) = &self.database.synchronous {
            let sync = pragma_keyword("synchronous", sync)?;
            pragmas.push(format!("PRAGMA synchronous = {};", sync));
        }
        if let Some(timeout) = self.database.busy_timeout_ms {
            pragmas.push(format!("PRAGMA busy_timeout = {};", timeout));
        }
        Ok(pragmas)
    }
}

fn pragma_keyword<'a>(setting: &str, value: &'a str) -> Result<&'a str> {
    check_identifier(value)
        .map_err(|_| OrmError::Config(format!("invalid {} value: {:?}", setting, value)))?;
    Ok(value)
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
///
/// # Example
///
/// ```no_run
/// let config = sqlorm::config::load_config("sqlorm.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    Config::from_toml_str(&content)
}

/// Per-user configuration location, e.g. `~/.config/sqlorm/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sqlorm").join("config.toml"))
}

/// Installs a `tracing` fmt subscriber at the configured level.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<()> {
    let level = match config.and_then(|c| c.level.as_deref()) {
        Some(level) => tracing::Level::from_str(level)
            .map_err(|_| OrmError::Config(format!("unknown log level: {}", level)))?,
        None => tracing::Level::INFO,
    };
    let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_CONFIG: &str = r#"
[database]
path = "mapped.db"
journal_mode = "WAL"
synchronous = "NORMAL"
busy_timeout_ms = 2500

[logging]
level = "debug"
"#;

    #[test]
    fn test_load_config_from_str() {
        let config = Config::from_toml_str(SAMPLE_CONFIG).expect("Failed to parse sample config");
        assert_eq!(config.database.path, "mapped.db");
        assert_eq!(config.database.busy_timeout_ms, Some(2500));
        assert_eq!(config.logging.unwrap().level.unwrap(), "debug");
    }

    #[test]
    fn test_missing_database_section_defaults_to_memory() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.database.path, ":memory:");
        assert!(config.pragmas().unwrap().is_empty());
    }

    #[test]
    fn test_pragmas_follow_config() {
        let config = Config::from_toml_str(SAMPLE_CONFIG).unwrap();
        assert_eq!(
            config.pragmas().unwrap(),
            vec![
                "PRAGMA journal_mode = WAL;".to_string(),
                "PRAGMA synchronous = NORMAL;".to_string(),
                "PRAGMA busy_timeout = 2500;".to_string(),
            ]
        );
    }

    #[test]
    fn test_pragma_keywords_are_validated() {
        let config =
            Config::from_toml_str("[database]\njournal_mode = \"WAL; DROP TABLE users\"\n").unwrap();
        assert!(matches!(config.pragmas(), Err(OrmError::Config(_))));

        let config = Config::from_toml_str("[database]\nsynchronous = \"1 OR 1\"\n").unwrap();
        assert!(matches!(config.pragmas(), Err(OrmError::Config(_))));

        let config = Config::from_toml_str("[database]\nsynchronous = \"off\"\n").unwrap();
        assert_eq!(config.pragmas().unwrap(), vec!["PRAGMA synchronous = off;".to_string()]);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_CONFIG.as_bytes()).unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.database.journal_mode.as_deref(), Some("WAL"));
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let result = Config::from_toml_str("[database]\npath = 12");
        assert!(matches!(result, Err(OrmError::Config(_))));
        assert!(matches!(load_config("/nonexistent/sqlorm.toml"), Err(OrmError::Io(_))));
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let logging = LoggingConfig { level: Some("loud".to_string()) };
        assert!(init_logging(Some(&logging)).is_err());
    }
}
