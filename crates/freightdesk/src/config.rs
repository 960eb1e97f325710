//! Configuration management for freightdesk.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "freightdesk";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "masters.db";

/// Environment variable prefix.
const ENV_PREFIX: &str = "FREIGHTDESK_";

/// Shown in place of secrets.
const REDACTED: &str = "********";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FREIGHTDESK_`, sections split by `__`)
/// 2. TOML config file at `~/.config/freightdesk/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Table backend configuration.
    pub backend: BackendConfig,
}

/// Which table backend records live in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// A hosted PostgREST-compatible API.
    Rest,
    /// A local `SQLite` file.
    #[default]
    Sqlite,
}

impl BackendKind {
    /// Name as written in the config file.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Sqlite => "sqlite",
        }
    }
}

/// Backend-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend to use.
    pub kind: BackendKind,
    /// Base URL of the REST backend, e.g. `https://xyz.supabase.co`.
    pub url: Option<String>,
    /// API key sent as `apikey` (and as bearer token when no access token is set).
    pub api_key: Option<String>,
    /// Bearer token of a signed-in session.
    pub access_token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Path to the local database file.
    /// Defaults to `~/.local/share/freightdesk/masters.db`
    pub database_path: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            url: None,
            api_key: None,
            access_token: None,
            timeout_secs: 30,
            database_path: None, // Will be resolved to default at runtime
        }
    }
}

impl BackendConfig {
    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config = Self::extract(config_path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration without validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or parsed.
    pub fn extract(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        Ok(Self::figment(&config_file).extract()?)
    }

    fn figment(config_file: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let backend = &self.backend;

        if backend.timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "backend.timeout_secs must be greater than 0".to_string(),
            });
        }

        if backend.kind == BackendKind::Rest {
            let url = backend.url.as_deref().unwrap_or_default().trim();
            if url.is_empty() {
                return Err(Error::ConfigValidation {
                    message: "backend.url is required for the rest backend".to_string(),
                });
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::ConfigValidation {
                    message: format!("backend.url must start with http:// or https://: {url}"),
                });
            }
            if backend.api_key.as_deref().unwrap_or_default().trim().is_empty() {
                return Err(Error::ConfigValidation {
                    message: "backend.api_key is required for the rest backend".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.backend
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// A copy safe to print: secrets masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        for secret in [&mut config.backend.api_key, &mut config.backend.access_token] {
            if secret.is_some() {
                *secret = Some(REDACTED.to_string());
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use figment::Jail;

    const REST_FILE: &str = r#"
[backend]
kind = "rest"
url = "https://example.supabase.co"
api_key = "anon-key"
timeout_secs = 5
"#;

    fn config_file() -> Option<PathBuf> {
        Some(PathBuf::from(CONFIG_FILE_NAME))
    }

    fn rest_config() -> Config {
        let mut config = Config::default();
        config.backend.kind = BackendKind::Rest;
        config.backend.url = Some("https://example.supabase.co".to_string());
        config.backend.api_key = Some("anon-key".to_string());
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.backend.kind, BackendKind::Sqlite);
        assert_eq!(config.backend.timeout_secs, 30);
        assert!(config.backend.url.is_none());
        assert!(config.backend.database_path.is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
        assert!(rest_config().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.backend.timeout_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("timeout_secs"));
    }

    #[test]
    fn test_validate_rest_requires_url() {
        let mut config = rest_config();
        config.backend.url = None;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("backend.url"));
    }

    #[test]
    fn test_validate_rest_rejects_non_http_url() {
        let mut config = rest_config();
        config.backend.url = Some("ftp://example.com".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("http://"));
    }

    #[test]
    fn test_validate_rest_requires_api_key() {
        let mut config = rest_config();
        config.backend.api_key = Some("  ".to_string());

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("api_key"));
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        let path = config.database_path();

        assert!(path.to_string_lossy().contains("freightdesk"));
        assert!(path.to_string_lossy().ends_with("masters.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.backend.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_timeout() {
        assert_eq!(BackendConfig::default().timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_redacted_masks_secrets() {
        let mut config = rest_config();
        config.backend.access_token = Some("jwt".to_string());

        let redacted = config.redacted();
        assert_eq!(redacted.backend.api_key.as_deref(), Some(REDACTED));
        assert_eq!(redacted.backend.access_token.as_deref(), Some(REDACTED));
        assert_eq!(redacted.backend.url, config.backend.url);
        assert!(Config::default().redacted().backend.api_key.is_none());
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("freightdesk"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.backend.kind, BackendKind::Sqlite);
            Ok(())
        });
    }

    #[test]
    fn test_load_toml_file() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(CONFIG_FILE_NAME, REST_FILE)?;

            let config = Config::load_from(config_file()).map_err(|e| e.to_string())?;
            assert_eq!(config.backend.kind, BackendKind::Rest);
            assert_eq!(
                config.backend.url.as_deref(),
                Some("https://example.supabase.co")
            );
            assert_eq!(config.backend.timeout(), Duration::from_secs(5));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file_with_double_underscore() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(CONFIG_FILE_NAME, REST_FILE)?;
            jail.set_env("FREIGHTDESK_BACKEND__URL", "http://localhost:54321");
            jail.set_env("FREIGHTDESK_BACKEND__TIMEOUT_SECS", "9");

            let config = Config::load_from(config_file()).map_err(|e| e.to_string())?;
            assert_eq!(config.backend.kind, BackendKind::Rest);
            assert_eq!(config.backend.url.as_deref(), Some("http://localhost:54321"));
            assert_eq!(config.backend.api_key.as_deref(), Some("anon-key"));
            assert_eq!(config.backend.timeout_secs, 9);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(CONFIG_FILE_NAME, "[backend]\nkind = \"rest\"\n")?;

            assert!(matches!(
                Config::load_from(config_file()),
                Err(Error::ConfigValidation { .. })
            ));
            let extracted = Config::extract(config_file()).map_err(|e| e.to_string())?;
            assert_eq!(extracted.backend.kind, BackendKind::Rest);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_unknown_backend() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(CONFIG_FILE_NAME, "[backend]\nkind = \"mysql\"\n")?;

            assert!(matches!(
                Config::load_from(config_file()),
                Err(Error::ConfigLoad(_))
            ));
            Ok(())
        });
    }

    #[test]
    fn test_backend_config_deserialize() {
        let json = r#"{"kind": "rest", "url": "http://localhost:54321"}"#;
        let backend: BackendConfig = serde_json::from_str(json).unwrap();
        assert_eq!(backend.kind, BackendKind::Rest);
        assert_eq!(backend.timeout_secs, 30);
    }
}
