//! Store configuration via `divan.toml`
//!
//! One file describes the database, the server connection and the store
//! defaults. Values are validated eagerly on load.

use divan_core::{Error, PageOptions, Result, DEFAULT_READ_SIZE};
use divan_gateway::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "divan.toml";

/// Whether the store may issue `_purge` requests.
///
/// Some deployments forbid permanent removal (or run servers without
/// `_purge`); `Disabled` makes `purge` fail with `Error::PurgeUnsupported`
/// without contacting the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurgePolicy {
    /// Purge requests are sent
    #[default]
    Enabled,
    /// Purge requests are refused locally
    Disabled,
}

fn default_read_size() -> usize {
    DEFAULT_READ_SIZE
}

/// Store configuration loaded from `divan.toml`.
///
/// # Example
///
/// ```toml
/// database = "app"
/// read_size = 50
/// purge = "enabled"
///
/// [server]
/// url = "http://127.0.0.1:5984"
/// username = "admin"
/// password = "secret"
/// timeout_ms = 10000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database name
    pub database: String,
    /// Default page size for queries without explicit options
    #[serde(default = "default_read_size")]
    pub read_size: usize,
    /// Purge availability
    #[serde(default)]
    pub purge: PurgePolicy,
    /// Server connection
    #[serde(default)]
    pub server: ConnectionConfig,
}

impl StoreConfig {
    /// Config for `database` with every other value at its default.
    pub fn new(database: &str) -> Self {
        StoreConfig {
            database: database.to_string(),
            read_size: DEFAULT_READ_SIZE,
            purge: PurgePolicy::default(),
            server: ConnectionConfig::default(),
        }
    }

    /// Default page options derived from this config.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidOptions` if `read_size` is zero.
    pub fn page_options(&self) -> Result<PageOptions> {
        PageOptions::default().with_read_size(self.read_size)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.database.is_empty() {
            return Err(Error::Config("`database` must not be empty".to_string()));
        }
        if self.server.url.is_empty() {
            return Err(Error::Config("`server.url` must not be empty".to_string()));
        }
        self.page_options()
            .map_err(|e| Error::Config(format!("`read_size`: {}", e)))?;
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Divan store configuration
#
# Database to read and write
database = "app"

# Page size of one HTTP round trip (default: 50)
read_size = 50

# Purge support: "enabled" (default) or "disabled"
#   "disabled" refuses purge locally with an error
purge = "enabled"

[server]
url = "http://127.0.0.1:5984"
# username = "admin"            # optional
# password = "secret"           # optional
timeout_ms = 10000
"#
    }

    /// Parse and validate a config from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_toml_parses_correctly() {
        let config = StoreConfig::parse(StoreConfig::default_toml()).unwrap();
        assert_eq!(config.database, "app");
        assert_eq!(config.read_size, 50);
        assert_eq!(config.purge, PurgePolicy::Enabled);
        assert_eq!(config.server.url, "http://127.0.0.1:5984");
        assert_eq!(config.server.username, None);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config = StoreConfig::parse("database = \"users\"").unwrap();
        assert_eq!(config, StoreConfig::new("users"));
    }

    #[test]
    fn parse_disabled_purge() {
        let config = StoreConfig::parse("database = \"a\"\npurge = \"disabled\"").unwrap();
        assert_eq!(config.purge, PurgePolicy::Disabled);
    }

    #[test]
    fn invalid_purge_value_returns_error() {
        assert!(StoreConfig::parse("database = \"a\"\npurge = \"sometimes\"").is_err());
    }

    #[test]
    fn zero_read_size_returns_error() {
        let err = StoreConfig::parse("database = \"a\"\nread_size = 0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn missing_database_returns_error() {
        assert!(StoreConfig::parse("read_size = 10").is_err());
        assert!(StoreConfig::parse("database = \"\"").is_err());
    }

    #[test]
    fn server_section_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut config = StoreConfig::new("users");
        config.read_size = 200;
        config.server = ConnectionConfig::new("https://couch.example.com")
            .with_credentials("admin", "secret");
        config.write_to_file(&path).unwrap();

        let parsed = StoreConfig::from_file(&path).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.page_options().unwrap().read_size(), 200);
    }

    #[test]
    fn from_file_missing_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope.toml");
        let err = StoreConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }
}
