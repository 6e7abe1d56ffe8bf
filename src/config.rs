//! Configuration file handling.
//!
//! Settings live at `$POCKETSHEET_HOME/config.json`: which backend kind is
//! in use, the configured accounts (wallets), which one is active, and a
//! few tunables. The transaction cache lives next to it under `cache/`.

use crate::model::Account;
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "pocketsheet";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const CACHE_DIR: &str = "cache";
const DEFAULT_DEBOUNCE_MS: u64 = 2000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Which remote store backend the app talks to.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Bulk mode: each account carries its own webhook endpoint URL.
    #[default]
    Webhook,
    /// Per-row mode: accounts are spreadsheets addressed by id.
    Sheets,
}

serde_plain::derive_display_from_serialize!(BackendKind);
serde_plain::derive_fromstr_from_deserialize!(BackendKind);

/// The app configuration, rooted at `$POCKETSHEET_HOME`. Instantiate with
/// [`Config::create`] (first run) or [`Config::load`], then persist changes
/// with [`Config::save`].
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    file: ConfigFile,
}

impl Config {
    /// Creates the home directory and an initial `config.json`.
    pub async fn create(dir: impl Into<PathBuf>, backend: BackendKind) -> Result<Self> {
        let root = dir.into();
        utils::make_dir(&root)
            .await
            .context("Unable to create the pocketsheet home directory")?;
        utils::make_dir(root.join(CACHE_DIR)).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.is_file() {
            bail!(
                "A config file already exists at '{}'",
                config_path.display()
            );
        }
        let file = ConfigFile {
            backend,
            ..ConfigFile::default()
        };
        file.save(&config_path).await?;
        Ok(Self {
            root,
            config_path,
            file,
        })
    }

    /// Loads an existing home directory, validating that it was initialized.
    pub async fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let root = dir.into();
        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!(
                "The config file is missing '{}' (run `pocketsheet init` first)",
                config_path.display()
            );
        }
        let file = ConfigFile::load(&config_path).await?;
        Ok(Self {
            root,
            config_path,
            file,
        })
    }

    pub async fn save(&self) -> Result<()> {
        self.file.save(&self.config_path).await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(CACHE_DIR)
    }

    pub fn backend(&self) -> BackendKind {
        self.file.backend
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.file.debounce_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.file.timeout_secs)
    }

    pub fn gemini_api_key(&self) -> Option<&str> {
        self.file.gemini_api_key.as_deref()
    }

    pub fn preferences(&self) -> &Preferences {
        &self.file.preferences
    }

    pub fn accounts(&self) -> &[Account] {
        &self.file.accounts
    }

    pub fn account(&self, id: &str) -> Option<&Account> {
        self.file.accounts.iter().find(|a| a.id == id)
    }

    /// The active account, if one is set and still configured.
    pub fn active_account(&self) -> Option<&Account> {
        let id = self.file.active_account.as_deref()?;
        self.account(id)
    }

    /// Adds or replaces an account, matched by id.
    pub fn upsert_account(&mut self, account: Account) {
        match self.file.accounts.iter_mut().find(|a| a.id == account.id) {
            Some(slot) => *slot = account,
            None => self.file.accounts.push(account),
        }
    }

    /// Removes an account. When it was active, activation falls back to
    /// the first remaining account, or to none.
    pub fn remove_account(&mut self, id: &str) {
        self.file.accounts.retain(|a| a.id != id);
        if self.file.active_account.as_deref() == Some(id) {
            self.file.active_account = self.file.accounts.first().map(|a| a.id.clone());
        }
    }

    pub fn set_active_account(&mut self, id: Option<String>) {
        self.file.active_account = id;
    }
}

/// Serialization format of `config.json`.
///
/// Example:
/// ```json
/// {
///   "app_name": "pocketsheet",
///   "config_version": 1,
///   "backend": "webhook",
///   "accounts": [
///     {"id": "f4b0...", "name": "Personal", "endpoint": "https://script.example/exec"}
///   ],
///   "active_account": "f4b0...",
///   "debounce_ms": 2000,
///   "timeout_secs": 30
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Should always be "pocketsheet".
    app_name: String,

    config_version: u8,

    backend: BackendKind,

    #[serde(default)]
    accounts: Vec<Account>,

    /// Id of the account to activate on startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_account: Option<String>,

    /// Quiet window between the last mutation and the bulk push.
    #[serde(default = "default_debounce_ms")]
    debounce_ms: u64,

    /// Client-side timeout for remote store requests.
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,

    /// API key for voice transaction recognition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gemini_api_key: Option<String>,

    /// Display preferences. Presentational only; nothing here affects
    /// what is stored or synced.
    #[serde(default)]
    preferences: Preferences,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Preferences {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_theme")]
    pub theme: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            theme: default_theme(),
        }
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_theme() -> String {
    "light".to_string()
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            backend: BackendKind::default(),
            accounts: Vec::new(),
            active_account: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            gemini_api_key: None,
            preferences: Preferences::default(),
        }
    }
}

impl ConfigFile {
    async fn load(path: &Path) -> Result<Self> {
        let config: ConfigFile = utils::deserialize(path).await?;
        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        Ok(config)
    }

    async fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(path, data)
            .await
            .context("Unable to write config file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_then_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("pocketsheet_home");

        let config = Config::create(&home, BackendKind::Sheets).await.unwrap();
        assert_eq!(config.backend(), BackendKind::Sheets);
        assert!(config.cache_dir().is_dir());

        let loaded = Config::load(&home).await.unwrap();
        assert_eq!(loaded.backend(), BackendKind::Sheets);
        assert!(loaded.accounts().is_empty());
        assert_eq!(loaded.debounce(), Duration::from_millis(2000));
        assert_eq!(loaded.timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_create_refuses_to_clobber() {
        let dir = TempDir::new().unwrap();
        Config::create(dir.path(), BackendKind::Webhook)
            .await
            .unwrap();
        assert!(Config::create(dir.path(), BackendKind::Webhook)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_load_uninitialized_home_fails() {
        let dir = TempDir::new().unwrap();
        let result = Config::load(dir.path()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_invalid_app_name() {
        let dir = TempDir::new().unwrap();
        let json = r#"{
            "app_name": "someone_else",
            "config_version": 1,
            "backend": "webhook"
        }"#;
        utils::write(&dir.path().join(CONFIG_JSON), json)
            .await
            .unwrap();
        let result = Config::load(dir.path()).await;
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_minimal_config_gets_defaults() {
        let dir = TempDir::new().unwrap();
        let json = r#"{
            "app_name": "pocketsheet",
            "config_version": 1,
            "backend": "sheets"
        }"#;
        utils::write(&dir.path().join(CONFIG_JSON), json)
            .await
            .unwrap();
        let config = Config::load(dir.path()).await.unwrap();
        assert_eq!(config.debounce(), Duration::from_millis(2000));
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.active_account().is_none());
    }

    #[tokio::test]
    async fn test_account_roundtrip_and_active_fallback() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::create(dir.path(), BackendKind::Webhook)
            .await
            .unwrap();

        config.upsert_account(Account::new("a1", "Personal").with_endpoint("https://x/exec"));
        config.upsert_account(Account::new("a2", "Household"));
        config.set_active_account(Some("a2".to_string()));
        config.save().await.unwrap();

        let mut loaded = Config::load(dir.path()).await.unwrap();
        assert_eq!(loaded.accounts().len(), 2);
        assert_eq!(loaded.active_account().unwrap().id, "a2");

        // Removing the active account falls back to the first remaining.
        loaded.remove_account("a2");
        assert_eq!(loaded.active_account().unwrap().id, "a1");
        loaded.remove_account("a1");
        assert!(loaded.active_account().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::create(dir.path(), BackendKind::Webhook)
            .await
            .unwrap();
        config.upsert_account(Account::new("a1", "Old Name"));
        config.upsert_account(Account::new("a1", "New Name"));
        assert_eq!(config.accounts().len(), 1);
        assert_eq!(config.accounts()[0].name, "New Name");
    }

    #[tokio::test]
    async fn test_preferences_default_and_roundtrip() {
        let dir = TempDir::new().unwrap();
        let json = r#"{
            "app_name": "pocketsheet",
            "config_version": 1,
            "backend": "webhook",
            "preferences": {"currency": "EUR"}
        }"#;
        utils::write(&dir.path().join(CONFIG_JSON), json)
            .await
            .unwrap();
        let config = Config::load(dir.path()).await.unwrap();
        assert_eq!(config.preferences().currency, "EUR");
        assert_eq!(config.preferences().theme, "light");
    }

    #[test]
    fn test_backend_kind_string_forms() {
        use std::str::FromStr;
        assert_eq!(BackendKind::Webhook.to_string(), "webhook");
        assert_eq!(
            BackendKind::from_str("sheets").unwrap(),
            BackendKind::Sheets
        );
    }
}
