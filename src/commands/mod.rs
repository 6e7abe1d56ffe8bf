//! Command handlers for the pocketsheet CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod init;
mod sync;
mod tx;
mod voice;
mod wallet;

use crate::cache::LocalCache;
use crate::config::BackendKind;
use crate::registry::Registry;
use crate::store::{MemoryStore, Mode, RemoteStore, SheetsStore, StaticToken, WebhookStore};
use crate::sync::SyncController;
use crate::{Config, Result};
use anyhow::bail;
use serde::Serialize;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub use init::init;
pub use sync::{pull, push};
pub use tx::{add, delete, edit, list, pay, summary};
pub use voice::voice;
pub use wallet::{wallet_add, wallet_list, wallet_remove, wallet_use};

/// Environment variable holding the bearer token for the sheets backend.
const ACCESS_TOKEN_VAR: &str = "POCKETSHEET_ACCESS_TOKEN";

/// The output type for a command: a printable message plus, optionally,
/// structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of
    /// the command execution.
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
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

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

    /// Print the message to `info!` and the structured data (if it exists)
    /// as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// Everything a command handler needs, wired together from the config.
pub struct App {
    config: Config,
    controller: SyncController,
    registry: Registry,
}

impl App {
    /// Loads the config and builds the store, cache, controller and
    /// registry. Does not touch the network.
    pub async fn load(home: &Path, mode: Mode) -> Result<Self> {
        let config = Config::load(home).await?;
        let store = build_store(&config, mode)?;
        let cache = LocalCache::open(config.cache_dir())?;
        let controller = SyncController::new(store.clone(), cache.clone(), config.debounce());
        let registry = Registry::new(store, cache, controller.clone());
        Ok(Self {
            config,
            controller,
            registry,
        })
    }

    /// Loads the app and activates the configured active account. Commands
    /// that operate on the ledger need this; wallet management does not.
    pub async fn load_active(home: &Path, mode: Mode) -> Result<Self> {
        let app = Self::load(home, mode).await?;
        if app.config.active_account().is_none() {
            bail!("No active wallet; add one with `pocketsheet wallet add`");
        }
        app.registry.activate_configured(&app.config).await?;
        Ok(app)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn controller(&self) -> &SyncController {
        &self.controller
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

fn build_store(config: &Config, mode: Mode) -> Result<Arc<dyn RemoteStore>> {
    let store: Arc<dyn RemoteStore> = match (mode, config.backend()) {
        (Mode::Test, backend) => Arc::new(MemoryStore::new(backend == BackendKind::Sheets)),
        (Mode::Live, BackendKind::Webhook) => Arc::new(WebhookStore::new(config.timeout())?),
        (Mode::Live, BackendKind::Sheets) => {
            let token = StaticToken::from_env(ACCESS_TOKEN_VAR)?;
            Arc::new(SheetsStore::new(Arc::new(token), config.timeout())?)
        }
    };
    Ok(store)
}
