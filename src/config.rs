//! Configuration file handling for VicCoin.
//!
//! The configuration file is stored at `$VICCOIN_HOME/config.json` and contains the backend base
//! URL, the ordered list of HTTP transports to try, and a few presentation settings. The local
//! key-value cache lives next to it in `$VICCOIN_HOME/cache.json`.

use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "viccoin";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const CACHE_JSON: &str = "cache.json";
const DEFAULT_BASE_URL: &str = "https://viccoin.onrender.com";
const DEFAULT_RECENT_LIMIT: usize = 5;

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$VICCOIN_HOME` and from there it loads `$VICCOIN_HOME/config.json`.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    cache_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the data directory and an initial `config.json` that points at `base_url`.
    ///
    /// # Errors
    /// - Returns an error if any file operations fail.
    /// - Returns an error if `base_url` is not an absolute http(s) URL.
    pub async fn create(dir: impl Into<PathBuf>, base_url: &str) -> Result<Self> {
        validate_base_url(base_url)?;

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the viccoin home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile {
            base_url: base_url.to_string(),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            cache_path: root.join(CACHE_JSON),
            root,
            config_path,
            config_file,
        })
    }

    /// This will
    /// - validate that `viccoin_home` exists and that the config file exists
    /// - load and validate the config file
    /// - return the loaded configuration object
    pub async fn load(viccoin_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = viccoin_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("VicCoin Home is missing, run 'viccoin init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        validate_base_url(&config_file.base_url)?;

        Ok(Self {
            cache_path: root.join(CACHE_JSON),
            root,
            config_path,
            config_file,
        })
    }

    /// Builds a `Config` without touching the filesystem. Used by tests and by callers that embed
    /// the library with their own storage.
    pub fn in_memory(base_url: impl Into<String>) -> Self {
        let root = PathBuf::from(".");
        Self {
            config_path: root.join(CONFIG_JSON),
            cache_path: root.join(CACHE_JSON),
            root,
            config_file: ConfigFile {
                base_url: base_url.into(),
                ..ConfigFile::default()
            },
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn base_url(&self) -> &str {
        &self.config_file.base_url
    }

    pub fn recent_limit(&self) -> usize {
        self.config_file.recent_limit
    }

    /// The transports to try, in order. The first is the primary.
    pub fn transports(&self) -> &[TransportSettings] {
        &self.config_file.transports
    }

    /// Replaces the transport list.
    pub fn with_transports(mut self, transports: Vec<TransportSettings>) -> Self {
        self.config_file.transports = transports;
        self
    }
}

/// How to build one HTTP client. The default configuration holds a pooled primary client and an
/// unpooled HTTP/1 alternate with a longer timeout.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct TransportSettings {
    /// Shows up in logs.
    pub name: String,

    /// Per-request timeout.
    pub timeout_secs: u64,

    /// Whether idle connections are kept for reuse.
    #[serde(default = "default_true")]
    pub pooled: bool,

    /// Restrict the client to HTTP/1.
    #[serde(default)]
    pub http1_only: bool,
}

impl TransportSettings {
    pub fn new(name: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            name: name.into(),
            timeout_secs,
            pooled: true,
            http1_only: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_transports() -> Vec<TransportSettings> {
    vec![
        TransportSettings::new("primary", 15),
        TransportSettings {
            name: "alternate".to_string(),
            timeout_secs: 30,
            pooled: false,
            http1_only: true,
        },
    ]
}

fn default_recent_limit() -> usize {
    DEFAULT_RECENT_LIMIT
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "viccoin",
///   "config_version": 1,
///   "base_url": "https://viccoin.onrender.com",
///   "recent_limit": 5,
///   "transports": [
///     { "name": "primary", "timeout_secs": 15, "pooled": true, "http1_only": false },
///     { "name": "alternate", "timeout_secs": 30, "pooled": false, "http1_only": true }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "viccoin"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Scheme and host of the backend, e.g. https://viccoin.onrender.com
    base_url: String,

    /// How many transactions the summary keeps in its recent list
    #[serde(default = "default_recent_limit")]
    recent_limit: usize,

    /// Primary transport first, then fallbacks
    #[serde(default = "default_transports")]
    transports: Vec<TransportSettings>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            base_url: DEFAULT_BASE_URL.to_string(),
            recent_limit: DEFAULT_RECENT_LIMIT,
            transports: default_transports(),
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if it belongs to another app.
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path)
            .await
            .with_context(|| format!("Failed to load config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            !config.transports.is_empty(),
            "The config file must list at least one transport"
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }
}

fn validate_base_url(base_url: &str) -> Result<()> {
    let parsed = url::Url::parse(base_url)
        .with_context(|| format!("The base URL '{base_url}' is not a valid URL"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => bail!("The base URL must use http or https, not '{other}'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_create_and_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("viccoin_home");

        let created = Config::create(&home, "https://api.example.com")
            .await
            .unwrap();
        assert_eq!(created.base_url(), "https://api.example.com");
        assert!(created.config_path().is_file());

        let loaded = Config::load(&home).await.unwrap();
        assert_eq!(loaded.base_url(), "https://api.example.com");
        assert_eq!(loaded.recent_limit(), DEFAULT_RECENT_LIMIT);
        assert_eq!(loaded.transports().len(), 2);
        assert_eq!(loaded.transports()[0].name, "primary");
        assert!(!loaded.transports()[1].pooled);
        assert_eq!(loaded.cache_path(), loaded.root().join(CACHE_JSON));
    }

    #[tokio::test]
    async fn test_config_create_rejects_bad_url() {
        let dir = TempDir::new().unwrap();
        let result = Config::create(dir.path(), "ftp://example.com").await;
        assert!(result.is_err());
        let result = Config::create(dir.path(), "not a url").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(dir.path().join("nope")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        let json = r#"{
            "app_name": "viccoin",
            "config_version": 1,
            "base_url": "http://localhost:8000"
        }"#;
        utils::write(&path, json).await.unwrap();

        let config = ConfigFile::load(&path).await.unwrap();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.recent_limit, DEFAULT_RECENT_LIMIT);
        assert_eq!(config.transports, default_transports());
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        let json = r#"{
            "app_name": "tiller",
            "config_version": 1,
            "base_url": "http://localhost:8000"
        }"#;
        utils::write(&path, json).await.unwrap();

        let result = ConfigFile::load(&path).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_rejects_empty_transports() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        let json = r#"{
            "app_name": "viccoin",
            "config_version": 1,
            "base_url": "http://localhost:8000",
            "transports": []
        }"#;
        utils::write(&path, json).await.unwrap();
        assert!(ConfigFile::load(&path).await.is_err());
    }

    #[test]
    fn test_in_memory() {
        let config = Config::in_memory("http://backend")
            .with_transports(vec![TransportSettings::new("only", 1)]);
        assert_eq!(config.base_url(), "http://backend");
        assert_eq!(config.transports().len(), 1);
    }
}
