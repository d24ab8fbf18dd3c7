// Configuration
//
// *La Configuration* (The Configuration) - TOML settings with environment overrides

use crate::search::ranking::RankingWeights;
use crate::search::response::ResponseConfig;
use crate::search::types::{DEFAULT_LIMIT, DEFAULT_RADIUS_M, MAX_LIMIT, MAX_RADIUS_M, MIN_RADIUS_M};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "tchaller.toml";

/// Default host address
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port number
pub const DEFAULT_PORT: u16 = 8000;

/// Default database path
pub const DEFAULT_DB_PATH: &str = "tchaller.db";

/// Default CORS origins (local front-end development)
pub const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:3000", "http://127.0.0.1:3000"];

/// Whole application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TchallerConfig {
    /// SQLite datastore
    pub storage: StorageConfig,

    /// HTTP server
    pub server: ServerConfig,

    /// Request defaults
    pub search: SearchSettings,

    /// Ranking weights
    pub ranking: RankingWeights,

    /// Reply synthesis
    pub response: ResponseConfig,
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database path
    pub db_path: String,

    /// Whether to enable WAL mode
    pub wal_enabled: bool,

    /// Cache size in pages
    pub cache_size_pages: Option<usize>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            wal_enabled: true,
            cache_size_pages: Some(10000),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Allowed CORS origins
    pub cors_origins: Vec<String>,

    /// Log level for tracing
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address for the server
    ///
    /// # Returns
    ///
    /// `Result<SocketAddr, String>` - Parsed address or error message
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| format!("Invalid address: {}", e))
    }

    /// Get the full server URL (e.g. "http://127.0.0.1:8000")
    #[must_use]
    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Defaults applied to requests that leave fields out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Radius in meters
    pub default_radius_m: f64,

    /// Number of results
    pub default_limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_radius_m: DEFAULT_RADIUS_M,
            default_limit: DEFAULT_LIMIT,
        }
    }
}

impl TchallerConfig {
    /// Load configuration
    ///
    /// With an explicit path the file must exist. Without one,
    /// `tchaller.toml` in the working directory is used when present and
    /// defaults otherwise. Environment overrides are applied last.
    ///
    /// # Arguments
    ///
    /// * `path` - Optional explicit configuration file
    ///
    /// # Returns
    ///
    /// `Result<TchallerConfig>` - Loaded configuration, not yet validated
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: TchallerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Save configuration as pretty TOML
    pub fn save(&self, path: &Path) -> Result<()> {
        let toml_string =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, toml_string)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Apply environment overrides through `lookup`
    ///
    /// Variables:
    /// - `TCHALLER_DB_PATH` - Database path
    /// - `TCHALLER_HOST` - Server host
    /// - `TCHALLER_PORT` - Server port (ignored when not a valid port)
    /// - `TCHALLER_LOG_LEVEL` - Log level (trace, debug, info, warn, error)
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(db_path) = lookup("TCHALLER_DB_PATH") {
            self.storage.db_path = db_path;
        }
        if let Some(host) = lookup("TCHALLER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("TCHALLER_PORT").and_then(|p| p.parse::<u16>().ok()) {
            self.server.port = port;
        }
        if let Some(log_level) = lookup("TCHALLER_LOG_LEVEL") {
            self.server.log_level = log_level;
        }
    }

    /// Validate configuration
    ///
    /// # Returns
    ///
    /// `Result<(), String>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<(), String> {
        if self.storage.db_path.is_empty() {
            return Err("Database path cannot be empty".to_string());
        }

        if self.server.port == 0 {
            return Err("Port cannot be zero".to_string());
        }
        if self.server.host.is_empty() {
            return Err("Host cannot be empty".to_string());
        }
        match self.server.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.server.log_level
                ));
            }
        }

        if !(MIN_RADIUS_M..=MAX_RADIUS_M).contains(&self.search.default_radius_m) {
            return Err(format!(
                "Default radius {} must be within [{}, {}]",
                self.search.default_radius_m, MIN_RADIUS_M, MAX_RADIUS_M
            ));
        }
        if !(1..=MAX_LIMIT).contains(&self.search.default_limit) {
            return Err(format!(
                "Default limit {} must be within [1, {}]",
                self.search.default_limit, MAX_LIMIT
            ));
        }

        self.ranking.validate()?;

        if !(0.0..=1.0).contains(&self.response.suggestion_probability) {
            return Err("Suggestion probability must be within [0, 1]".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = TchallerConfig::default();
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.storage.db_path, DEFAULT_DB_PATH);
        assert!(config.storage.wal_enabled);
        assert_eq!(config.response.suggestion_probability, 0.3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TchallerConfig = toml::from_str(
            r#"
            [server]
            port = 9090

            [ranking]
            open_bonus = 45.0
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.ranking.open_bonus, 45.0);
        assert_eq!(config.ranking.verified_bonus, 50.0);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TCHALLER_DB_PATH", "/tmp/places.db"),
            ("TCHALLER_HOST", "0.0.0.0"),
            ("TCHALLER_PORT", "8080"),
            ("TCHALLER_LOG_LEVEL", "debug"),
        ]
        .into_iter()
        .collect();

        let mut config = TchallerConfig::default();
        config.apply_env_from(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.storage.db_path, "/tmp/places.db");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.log_level, "debug");
    }

    #[test]
    fn test_invalid_port_env_is_ignored() {
        let mut config = TchallerConfig::default();
        config.apply_env_from(|key| (key == "TCHALLER_PORT").then(|| "http".to_string()));
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = TchallerConfig::default();
        config.server.log_level = "verbose".to_string();
        assert!(config.validate().is_err());

        let mut config = TchallerConfig::default();
        config.search.default_radius_m = 10.0;
        assert!(config.validate().is_err());

        let mut config = TchallerConfig::default();
        config.response.suggestion_probability = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_file() {
        let file = NamedTempFile::new().unwrap();
        let mut config = TchallerConfig::default();
        config.server.port = 7000;
        config.response.seed = Some(9);
        config.save(file.path()).unwrap();

        let loaded = TchallerConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.server.port, 7000);
        assert_eq!(loaded.response.seed, Some(9));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let result = TchallerConfig::load(Some(Path::new("/nonexistent/tchaller.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr().unwrap().port(), DEFAULT_PORT);
    }
}
