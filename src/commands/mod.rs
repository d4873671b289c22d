//! Command handlers for the viccoin CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod categories;
mod health;
mod init;
mod session;
mod transactions;

use crate::api::{self, Mode};
use crate::cache::{FileCache, KvCache};
use crate::categories::CategoryStore;
use crate::gateway::Gateway;
use crate::pipeline::ActionPipeline;
use crate::session::Session;
use crate::{Config, Result};
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info};

pub use categories::{add_category, list_categories};
pub use health::{health, HealthReport};
pub use init::init;
pub use session::{clear_session, set_token, show_session, SessionInfo};
pub use transactions::{add, list, report, summary, update};

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// The on-disk cache under `$VICCOIN_HOME`.
fn open_cache(config: &Config) -> Arc<dyn KvCache> {
    Arc::new(FileCache::new(config.cache_path()))
}

/// Wires the gateway, the category store and the stored session into a pipeline.
async fn open_pipeline(config: &Config, mode: Mode) -> Result<ActionPipeline> {
    let cache = open_cache(config);
    let session = Session::load(cache.as_ref()).await?;
    if session.token().is_none() {
        debug!("No token is stored; run 'viccoin session set-token' to authenticate");
    }
    let chain = api::transport_chain(config, mode)?;
    debug!("Transports: {:?}", chain.names());
    Ok(ActionPipeline::new(
        Gateway::new(config, chain),
        CategoryStore::new(cache),
        session,
    ))
}
