//! The local cache: last-known transaction sets, one JSON file per account.
//!
//! The cache is read once at account-activation time so the user is not
//! looking at an empty ledger while the first fetch is in flight, and is
//! written through synchronously on every mutation and successful pull.
//! Writes are atomic (write-to-tmp then rename).

use crate::model::Transaction;
use crate::Result;
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the pre-multi-account, single-key cache.
const LEGACY_FILE: &str = "transactions.json";

/// Per-account cache of transaction lists under a single directory.
#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    /// Opens (creating if needed) a cache rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Unable to create cache directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Returns the cached list for `account_id`, or `None` if there is no
    /// entry for that account.
    pub fn read(&self, account_id: &str) -> Result<Option<Vec<Transaction>>> {
        read_entry(&self.entry_path(account_id))
    }

    /// Replaces the cached list for `account_id`.
    pub fn write(&self, account_id: &str, transactions: &[Transaction]) -> Result<()> {
        let path = self.entry_path(account_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string(transactions).context("Unable to serialize cache entry")?;
        fs::write(&tmp, json)
            .with_context(|| format!("Unable to write cache file {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Unable to replace cache file {}", path.display()))?;
        Ok(())
    }

    /// Reads the entry for `account_id`, lazily migrating from the legacy
    /// single-key cache the first time an account without a per-account
    /// entry is activated. The migration is a copy; the legacy file is
    /// kept in place.
    pub fn read_or_migrate(&self, account_id: &str) -> Result<Option<Vec<Transaction>>> {
        if let Some(found) = self.read(account_id)? {
            return Ok(Some(found));
        }
        let legacy = self.dir.join(LEGACY_FILE);
        match read_entry(&legacy)? {
            Some(transactions) => {
                debug!(account_id, "migrating legacy cache entry");
                self.write(account_id, &transactions)?;
                Ok(Some(transactions))
            }
            None => Ok(None),
        }
    }

    /// Removes the entry for `account_id`, if any.
    pub fn remove(&self, account_id: &str) -> Result<()> {
        let path = self.entry_path(account_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Unable to remove cache file {}", path.display()))
            }
        }
    }

    fn entry_path(&self, account_id: &str) -> PathBuf {
        // Account ids are spreadsheet ids or uuids; strip anything that is
        // not filename-safe just in case.
        let safe: String = account_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        self.dir.join(format!("transactions-{safe}.json"))
    }
}

fn read_entry(path: &Path) -> Result<Option<Vec<Transaction>>> {
    match fs::read_to_string(path) {
        Ok(contents) => {
            let transactions: Vec<Transaction> = serde_json::from_str(&contents)
                .with_context(|| format!("Corrupt cache file {}", path.display()))?;
            Ok(Some(transactions))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Unable to read cache file {}", path.display())),
    }
}
