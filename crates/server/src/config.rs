//! Server settings.
//!
//! Settings live in `qrshare/config.toml` under the platform config
//! directory. The file is optional; `QRSHARE_*` environment variables are
//! applied on top of it and command-line flags on top of those.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::files::CycleGuard;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("bind must be an IP address, got {0}")]
    InvalidBind(String),

    #[error("port must be greater than 0")]
    InvalidPort,

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("token must not contain whitespace")]
    InvalidToken,

    #[error("user entries need a non-empty username, got {0:?}")]
    InvalidUser(String),
}

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the QrShare server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Listener and logging configuration.
    pub server: ServerConfig,

    /// What is shared and how.
    pub share: ShareConfig,

    /// Authentication settings.
    pub security: SecurityConfig,

    /// Directory traversal settings.
    pub listing: ListingConfig,
}

/// Listener and logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,

    /// Port to listen on.
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Directory for daily rolling log files. Console only when unset.
    pub log_dir: Option<PathBuf>,
}

/// What is shared and how.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ShareConfig {
    /// Files and directories to share.
    pub paths: Vec<PathBuf>,

    /// Reject every modifying request.
    pub readonly: bool,
}

/// Authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// Fixed access token. A random one is generated at startup when unset.
    pub token: Option<String>,

    /// Accounts accepted through HTTP basic authentication.
    pub users: Vec<UserCredentials>,
}

/// One basic-auth account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserCredentials {
    pub username: String,
    pub password: String,
}

/// Directory traversal settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ListingConfig {
    /// How traversal reacts to a directory link it has already followed.
    pub cycle_guard: CycleGuard,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8000,
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

/// `<config dir>/qrshare/config.toml`, or relative to the working
/// directory when the platform has no config directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("qrshare")
        .join("config.toml")
}

impl Config {
    /// Overlay `QRSHARE_*` environment variables. Empty values are ignored.
    ///
    /// - QRSHARE_TOKEN: Override the access token
    /// - QRSHARE_READONLY: `true` or `1` enables read-only mode
    /// - QRSHARE_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    /// - QRSHARE_PORT: Override the listening port
    ///
    /// Runs before logging is set up, so nothing is logged here. Returns one
    /// line per variable that was applied or rejected, for the caller to log
    /// once the subscriber exists. Token values never appear in it.
    pub fn apply_env_overrides(&mut self) -> Vec<String> {
        let mut notes = Vec::new();

        if let Ok(token) = std::env::var("QRSHARE_TOKEN") {
            if !token.is_empty() {
                notes.push("Overriding token from environment".to_string());
                self.security.token = Some(token);
            }
        }

        if let Ok(readonly) = std::env::var("QRSHARE_READONLY") {
            if !readonly.is_empty() {
                let enabled = matches!(readonly.to_lowercase().as_str(), "true" | "1");
                notes.push(format!("Overriding readonly from environment: {enabled}"));
                self.share.readonly = enabled;
            }
        }

        if let Ok(level) = std::env::var("QRSHARE_LOG_LEVEL") {
            if !level.is_empty() {
                notes.push(format!("Overriding log_level from environment: {level}"));
                self.server.log_level = level;
            }
        }

        if let Ok(port) = std::env::var("QRSHARE_PORT") {
            match port.parse::<u16>() {
                Ok(port) => {
                    notes.push(format!("Overriding port from environment: {port}"));
                    self.server.port = port;
                }
                Err(_) if port.is_empty() => {}
                Err(_) => notes.push(format!("Ignoring invalid QRSHARE_PORT: {port}")),
            }
        }

        notes
    }

    /// Check values that deserialization alone cannot rule out.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind.parse::<IpAddr>().is_err() {
            return Err(ConfigError::InvalidBind(self.server.bind.clone()));
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }

        let level = self.server.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.server.log_level.clone()));
        }

        if let Some(token) = &self.security.token {
            if token.is_empty() || token.chars().any(char::is_whitespace) {
                return Err(ConfigError::InvalidToken);
            }
        }

        if let Some(user) = self.security.users.iter().find(|u| u.username.trim().is_empty()) {
            return Err(ConfigError::InvalidUser(user.username.clone()));
        }

        Ok(())
    }

    /// Read `path`, falling back to defaults when it is absent.
    ///
    /// A present but malformed file is an error naming the file and the
    /// offending span.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };

        Self::from_toml(&text)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// [`Config::load`] on [`default_config_path`].
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse a TOML document. Missing tables and keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| anyhow::anyhow!("Invalid TOML: {}", describe_toml_error(&e)))
    }

    /// Write the configuration to `path`, creating its directory.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::debug!(path = %path.display(), "config saved");
        Ok(())
    }

    /// Render as pretty TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render config as TOML")
    }
}

fn describe_toml_error(error: &toml::de::Error) -> String {
    match error.span() {
        Some(span) => format!("{} (bytes {}..{})", error.message(), span.start, span.end),
        None => error.message().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "QRSHARE_TOKEN",
        "QRSHARE_READONLY",
        "QRSHARE_LOG_LEVEL",
        "QRSHARE_PORT",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.log_level, "info");
        assert!(config.server.log_dir.is_none());
        assert!(config.share.paths.is_empty());
        assert!(!config.share.readonly);
        assert!(config.security.token.is_none());
        assert!(config.security.users.is_empty());
        assert_eq!(config.listing.cycle_guard, CycleGuard::Coarse);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_empty() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
[server]
port = 9000

[share]
readonly = true
"#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.server.port, 9000);
        assert!(config.share.readonly);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.listing.cycle_guard, CycleGuard::Coarse);
    }

    #[test]
    fn test_from_toml_full() {
        let toml = r#"
[server]
bind = "127.0.0.1"
port = 8080
log_level = "debug"
log_dir = "/var/log/qrshare"

[share]
paths = ["/home/me/photos", "/tmp/notes.txt"]
readonly = true

[security]
token = "s3cret"

[[security.users]]
username = "alice"
password = "wonderland"

[listing]
cycle_guard = "per-entry"
"#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.server.log_dir, Some(PathBuf::from("/var/log/qrshare")));
        assert_eq!(
            config.share.paths,
            vec![PathBuf::from("/home/me/photos"), PathBuf::from("/tmp/notes.txt")]
        );
        assert!(config.share.readonly);
        assert_eq!(config.security.token.as_deref(), Some("s3cret"));
        assert_eq!(config.security.users.len(), 1);
        assert_eq!(config.security.users[0].username, "alice");
        assert_eq!(config.listing.cycle_guard, CycleGuard::PerEntry);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_invalid_syntax() {
        let result = Config::from_toml("[server\nport = 1");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_from_toml_wrong_type() {
        let result = Config::from_toml("[server]\nport = \"eighty\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_cycle_guard_rejected() {
        let result = Config::from_toml("[listing]\ncycle_guard = \"sometimes\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_roundtrip_custom() {
        let mut config = Config::default();
        config.server.port = 1234;
        config.share.paths = vec![PathBuf::from("/data")];
        config.security.users.push(UserCredentials {
            username: "bob".into(),
            password: "pw".into(),
        });
        config.listing.cycle_guard = CycleGuard::PerEntry;

        let toml = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&toml).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load(temp_dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_creates_directories_and_loads_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/dir/config.toml");

        let mut config = Config::default();
        config.share.readonly = true;
        config.save(&path).unwrap();

        assert!(path.exists());
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "not = [valid").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("qrshare/config.toml"));
    }

    #[test]
    fn test_validate_rejections() {
        let mut config = Config::default();
        config.server.bind = "localhost:80".into();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidBind("localhost:80".into()))
        );

        let mut config = Config::default();
        config.server.port = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidPort));

        let mut config = Config::default();
        config.server.log_level = "loud".into();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel("loud".into()))
        );

        let mut config = Config::default();
        config.security.token = Some("has space".into());
        assert_eq!(config.validate(), Err(ConfigError::InvalidToken));

        let mut config = Config::default();
        config.security.users.push(UserCredentials {
            username: " ".into(),
            password: "pw".into(),
        });
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUser(_))));
    }

    #[test]
    fn test_validate_log_level_case_insensitive() {
        let mut config = Config::default();
        config.server.log_level = "DEBUG".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var("QRSHARE_TOKEN", "from-env");
        std::env::set_var("QRSHARE_READONLY", "true");
        std::env::set_var("QRSHARE_LOG_LEVEL", "trace");
        std::env::set_var("QRSHARE_PORT", "9999");

        let mut config = Config::default();
        let notes = config.apply_env_overrides();

        assert_eq!(config.security.token.as_deref(), Some("from-env"));
        assert!(config.share.readonly);
        assert_eq!(config.server.log_level, "trace");
        assert_eq!(config.server.port, 9999);

        assert_eq!(notes.len(), 4);
        assert!(notes.iter().any(|n| n.ends_with("port from environment: 9999")));
        assert!(notes.iter().all(|n| !n.contains("from-env")));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_override_empty_does_not_override() {
        clear_env();
        std::env::set_var("QRSHARE_TOKEN", "");
        std::env::set_var("QRSHARE_PORT", "");

        let mut config = Config::default();
        config.security.token = Some("file-token".into());
        assert!(config.apply_env_overrides().is_empty());

        assert_eq!(config.security.token.as_deref(), Some("file-token"));
        assert_eq!(config.server.port, 8000);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_override_invalid_port_ignored() {
        clear_env();
        std::env::set_var("QRSHARE_PORT", "not-a-port");

        let mut config = Config::default();
        let notes = config.apply_env_overrides();
        assert_eq!(config.server.port, 8000);
        assert_eq!(notes, vec!["Ignoring invalid QRSHARE_PORT: not-a-port".to_string()]);

        clear_env();
    }
}
