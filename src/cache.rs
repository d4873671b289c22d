//! The local key-value cache: durable, process-wide storage keyed by string.
//!
//! There are no transactions. `FileCache` reads the whole file, changes one key and writes the
//! whole file back, so two writers racing on the same file can lose an update.

use crate::{utils, Result};
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Namespace prefix for every key this crate writes.
pub const NAMESPACE: &str = "@VicCoin";

pub const TOKEN_KEY: &str = "@VicCoin:token";
pub const USER_KEY: &str = "@VicCoin:user";

/// String-keyed storage that survives restarts.
#[async_trait::async_trait]
pub trait KvCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Reads the value under `key` and parses it as JSON. A missing key is `Ok(None)`.
pub async fn read_json<T>(cache: &dyn KvCache, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
{
    match cache.get(key).await? {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .with_context(|| format!("The cached value under '{key}' is not valid JSON"))
            .map(Some),
    }
}

/// Serializes `value` to JSON and stores it under `key`.
pub async fn write_json<T>(cache: &dyn KvCache, key: &str, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_string(value)
        .with_context(|| format!("Unable to serialize the value for '{key}'"))?;
    cache.set(key, raw).await
}

/// A cache persisted as a single JSON object on disk.
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.is_file() {
            return Ok(BTreeMap::new());
        }
        utils::deserialize(&self.path).await
    }

    async fn store(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(entries).context("Unable to serialize cache")?;
        utils::write(&self.path, json).await
    }
}

#[async_trait::async_trait]
impl KvCache for FileCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value);
        self.store(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.load().await?;
        if entries.remove(key).is_some() {
            self.store(&entries).await?;
        }
        Ok(())
    }
}

/// An in-memory cache, mostly for tests and for embedding without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("The memory cache lock was poisoned"))
    }
}

#[async_trait::async_trait]
impl KvCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
