//! Remote store backends.
//!
//! Both backend styles are unified behind the [`RemoteStore`] trait. The
//! controller never special-cases the backend kind beyond asking
//! [`RemoteStore::supports_row_ops`]: bulk backends get the whole list
//! re-sent through `replace_all`, per-row backends get one targeted call
//! per mutation.

mod memory;
mod record;
mod sheets;
mod webhook;

use crate::error::StoreError;
use crate::model::{Account, Transaction};

pub use memory::{CallKind, MemoryStore, RecordedCall};
pub use sheets::SheetsStore;
pub use webhook::WebhookStore;

/// The contract every backend presents to the synchronization controller.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Whether this backend supports targeted append/update/delete. When
    /// `false`, only `fetch_all`/`replace_all` are available and mutations
    /// are coalesced behind a debounce.
    fn supports_row_ops(&self) -> bool;

    /// Fetches the full transaction set for `account`.
    async fn fetch_all(&self, account: &Account) -> Result<Vec<Transaction>, StoreError>;

    /// Replaces the full remote set with `transactions` (bulk mode).
    async fn replace_all(
        &self,
        account: &Account,
        transactions: &[Transaction],
    ) -> Result<(), StoreError>;

    /// Adds one row (per-row mode).
    async fn append(&self, account: &Account, transaction: &Transaction)
        -> Result<(), StoreError>;

    /// Rewrites the row whose id matches `transaction.id` (per-row mode).
    async fn update(&self, account: &Account, transaction: &Transaction)
        -> Result<(), StoreError>;

    /// Structurally deletes the row with the given id (per-row mode).
    async fn remove(&self, account: &Account, id: &str) -> Result<(), StoreError>;

    /// Discovers existing backing resources (per-row mode).
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError>;

    /// Provisions a backing resource, idempotent by name (per-row mode).
    async fn create_account(&self, name: &str) -> Result<Account, StoreError>;
}

/// Whether the process talks to real remote services or to the in-memory
/// store. Lets the whole CLI run in tests without a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Live,
    Test,
}

impl Mode {
    /// `Test` when `POCKETSHEET_IN_TEST_MODE` is set and non-empty.
    pub fn from_env() -> Self {
        match std::env::var("POCKETSHEET_IN_TEST_MODE") {
            Ok(v) if !v.is_empty() => Mode::Test,
            _ => Mode::Live,
        }
    }
}

/// An opaque "get me a bearer token" capability. How the token is obtained
/// (OAuth consent, service account, pre-provisioned) is outside this crate.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync + 'static {
    async fn access_token(&self) -> Result<String, StoreError>;
}

/// A token provider holding a fixed token for the process lifetime.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Reads the token from the given environment variable.
    pub fn from_env(var: &str) -> Result<Self, StoreError> {
        std::env::var(var).map(Self).map_err(|_| {
            StoreError::Network(format!("no access token: environment variable {var} is not set"))
        })
    }
}

#[async_trait::async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, StoreError> {
        Ok(self.0.clone())
    }
}
