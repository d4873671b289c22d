//! The auth context that is handed to every gateway call.
//!
//! Token storage itself is an opaque collaborator: the token and a snapshot of the user are JSON
//! values in the key-value cache and this module only reads, writes, and removes them.

use crate::cache::{self, KvCache, TOKEN_KEY, USER_KEY};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The logged-in user as the backend last described it.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    #[serde(default, alias = "uid", alias = "user_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub other_fields: BTreeMap<String, serde_json::Value>,
}

/// Explicit auth context. An empty session is valid; operations that need a token fail fast with
/// `SyncError::AuthMissing`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Session {
    token: Option<String>,
    user: Option<AuthUser>,
}

impl Session {
    pub fn new(token: impl Into<String>, user: Option<AuthUser>) -> Self {
        Self {
            token: Some(token.into()),
            user,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Loads the token and user snapshot from the cache. A missing or empty token yields a
    /// session without a token.
    pub async fn load(cache: &dyn KvCache) -> Result<Self> {
        let token: Option<String> = cache::read_json(cache, TOKEN_KEY).await?;
        let user: Option<AuthUser> = cache::read_json(cache, USER_KEY).await?;
        Ok(Self {
            token: token.filter(|t| !t.trim().is_empty()),
            user,
        })
    }

    /// Persists the token and user snapshot.
    pub async fn save(&self, cache: &dyn KvCache) -> Result<()> {
        match &self.token {
            Some(token) => cache::write_json(cache, TOKEN_KEY, token).await?,
            None => cache.remove(TOKEN_KEY).await?,
        }
        match &self.user {
            Some(user) => cache::write_json(cache, USER_KEY, user).await?,
            None => cache.remove(USER_KEY).await?,
        }
        Ok(())
    }

    /// Logout: removes the token and user snapshot from the cache.
    pub async fn clear(cache: &dyn KvCache) -> Result<()> {
        cache.remove(TOKEN_KEY).await?;
        cache.remove(USER_KEY).await
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.id.as_deref())
    }
}
