//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::cache::FileCache;
use crate::session::{AuthUser, Session};
use crate::Config;
use tempfile::TempDir;

/// A viccoin home directory with a config and an empty cache. Holds the `TempDir` to keep the
/// directory alive for the duration of the test.
pub struct TestEnv {
    _temp_dir: TempDir,
    config: Config,
}

impl TestEnv {
    /// A home pointing at a placeholder backend, for tests that run in `Mode::Testing`.
    pub async fn new() -> Self {
        Self::with_base_url("http://viccoin.test").await
    }

    pub async fn with_base_url(base_url: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("viccoin");
        let config = Config::create(&root, base_url).await.unwrap();
        Self {
            _temp_dir: temp_dir,
            config,
        }
    }

    /// Stores a token and a user in the environment's cache.
    pub async fn logged_in(self) -> Self {
        let user = AuthUser {
            id: Some("1".to_string()),
            nome: Some("Teste".to_string()),
            ..AuthUser::default()
        };
        Session::new("test-token", Some(user))
            .save(&self.cache())
            .await
            .unwrap();
        self
    }

    /// Returns a clone of the Config.
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    pub fn cache(&self) -> FileCache {
        FileCache::new(self.config.cache_path())
    }
}
