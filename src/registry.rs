//! The account (wallet) registry.
//!
//! One place that knows how accounts come into being and which one is
//! active. Per-row backends own the authoritative account list (backing
//! resources are discoverable), so listing and creation delegate to the
//! store; bulk backends have nothing to discover, so the config file is
//! the authority and creation is purely local.

use crate::cache::LocalCache;
use crate::model::Account;
use crate::store::RemoteStore;
use crate::sync::SyncController;
use crate::{Config, Result};
use anyhow::{bail, Context};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::warn;

pub struct Registry {
    store: Arc<dyn RemoteStore>,
    cache: LocalCache,
    controller: SyncController,
}

impl Registry {
    pub fn new(store: Arc<dyn RemoteStore>, cache: LocalCache, controller: SyncController) -> Self {
        Self {
            store,
            cache,
            controller,
        }
    }

    /// All known accounts: discovered from the store when it supports
    /// discovery, otherwise read from the config.
    pub async fn list(&self, config: &Config) -> Result<Vec<Account>> {
        if self.store.supports_row_ops() {
            let accounts = self
                .store
                .list_accounts()
                .await
                .context("Unable to list accounts from the remote store")?;
            return Ok(accounts);
        }
        Ok(config.accounts().to_vec())
    }

    /// Creates an account and persists it in the config. The first account
    /// ever created becomes active immediately.
    pub async fn create(
        &self,
        config: &mut Config,
        name: &str,
        endpoint: Option<String>,
        budget: Option<Decimal>,
    ) -> Result<Account> {
        let account = if self.store.supports_row_ops() {
            self.store
                .create_account(name)
                .await
                .context("Unable to provision the backing spreadsheet")?
        } else {
            let Some(endpoint) = endpoint else {
                bail!("A webhook account needs an endpoint URL");
            };
            Account::new(uuid::Uuid::new_v4().to_string(), name).with_endpoint(endpoint)
        };
        // The budget is display metadata; it lives in the config, not the
        // backing resource.
        let account = account.with_budget(budget);

        let first = config.accounts().is_empty();
        config.upsert_account(account.clone());
        if first {
            config.set_active_account(Some(account.id.clone()));
        }
        config.save().await?;

        if first {
            self.activate_best_effort(&account).await;
        }
        Ok(account)
    }

    /// Removes an account from the config and drops its cache entry. The
    /// remote backing resource is left untouched. When the removed account
    /// was active, activation falls back to the first remaining account.
    pub async fn remove(&self, config: &mut Config, id: &str) -> Result<()> {
        if config.account(id).is_none() {
            bail!("No account with id '{id}'");
        }
        let was_active = config.active_account().map(|a| a.id.clone()).as_deref() == Some(id);
        config.remove_account(id);
        config.save().await?;
        self.cache.remove(id)?;

        if was_active {
            match config.active_account().cloned() {
                Some(next) => self.activate_best_effort(&next).await,
                None => self.controller.deactivate(),
            }
        }
        Ok(())
    }

    /// Makes the given account active and pulls its data.
    pub async fn set_active(&self, config: &mut Config, id: &str) -> Result<()> {
        let account = config
            .account(id)
            .cloned()
            .with_context(|| format!("No account with id '{id}'"))?;
        config.set_active_account(Some(account.id.clone()));
        config.save().await?;
        self.activate_best_effort(&account).await;
        Ok(())
    }

    /// Activates the account recorded as active in the config, if any.
    pub async fn activate_configured(&self, config: &Config) -> Result<()> {
        if let Some(account) = config.active_account().cloned() {
            self.activate_best_effort(&account).await;
        }
        Ok(())
    }

    // Activation failure is not fatal: the controller degrades to cached
    // data and the account switch itself has already been persisted.
    async fn activate_best_effort(&self, account: &Account) {
        if let Err(e) = self.controller.activate(account.clone()).await {
            warn!(account = %account.id, "initial pull failed, serving cached data: {e}");
        }
    }
}
