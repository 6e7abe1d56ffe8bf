//! An in-memory [`RemoteStore`] for tests.
//!
//! Compiled in the production build on purpose so downstream consumers can
//! drive the controller without a network. Records every call it receives
//! and supports injected latency and failures per account.

use crate::error::StoreError;
use crate::model::{Account, Transaction};
use crate::store::RemoteStore;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    FetchAll,
    ReplaceAll,
    Append,
    Update,
    Remove,
    ListAccounts,
    CreateAccount,
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub account_id: String,
    pub kind: CallKind,
    pub at: tokio::time::Instant,
}

#[derive(Default)]
struct Inner {
    data: HashMap<String, Vec<Transaction>>,
    accounts: Vec<Account>,
    calls: Vec<RecordedCall>,
    fetch_delay: HashMap<String, Duration>,
    fail_fetch: HashSet<String>,
    fail_mutations: bool,
}

pub struct MemoryStore {
    row_ops: bool,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new(row_ops: bool) -> Self {
        Self {
            row_ops,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Seeds the remote data set for an account.
    pub fn seed(&self, account_id: &str, transactions: Vec<Transaction>) {
        self.lock().data.insert(account_id.to_string(), transactions);
    }

    pub fn seed_account(&self, account: Account) {
        let mut inner = self.lock();
        inner.data.entry(account.id.clone()).or_default();
        inner.accounts.push(account);
    }

    /// Makes `fetch_all` for this account take `delay` of (virtual) time.
    pub fn set_fetch_delay(&self, account_id: &str, delay: Duration) {
        self.lock()
            .fetch_delay
            .insert(account_id.to_string(), delay);
    }

    /// Makes every `fetch_all` for this account fail.
    pub fn fail_fetches(&self, account_id: &str) {
        self.lock().fail_fetch.insert(account_id.to_string());
    }

    pub fn clear_fetch_failure(&self, account_id: &str) {
        self.lock().fail_fetch.remove(account_id);
    }

    /// Makes every write call fail.
    pub fn fail_mutations(&self, fail: bool) {
        self.lock().fail_mutations = fail;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, kind: CallKind) -> usize {
        self.lock().calls.iter().filter(|c| c.kind == kind).count()
    }

    /// The current remote data set for an account.
    pub fn data(&self, account_id: &str) -> Vec<Transaction> {
        self.lock().data.get(account_id).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, account_id: &str, kind: CallKind) {
        self.lock().calls.push(RecordedCall {
            account_id: account_id.to_string(),
            kind,
            at: tokio::time::Instant::now(),
        });
    }

    fn check_mutation(&self) -> Result<(), StoreError> {
        if self.lock().fail_mutations {
            Err(StoreError::Network("injected write failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl RemoteStore for MemoryStore {
    fn supports_row_ops(&self) -> bool {
        self.row_ops
    }

    async fn fetch_all(&self, account: &Account) -> Result<Vec<Transaction>, StoreError> {
        self.record(&account.id, CallKind::FetchAll);
        let delay = self.lock().fetch_delay.get(&account.id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let inner = self.lock();
        if inner.fail_fetch.contains(&account.id) {
            return Err(StoreError::Network("injected fetch failure".to_string()));
        }
        Ok(inner.data.get(&account.id).cloned().unwrap_or_default())
    }

    async fn replace_all(
        &self,
        account: &Account,
        transactions: &[Transaction],
    ) -> Result<(), StoreError> {
        self.record(&account.id, CallKind::ReplaceAll);
        self.check_mutation()?;
        self.lock()
            .data
            .insert(account.id.clone(), transactions.to_vec());
        Ok(())
    }

    async fn append(
        &self,
        account: &Account,
        transaction: &Transaction,
    ) -> Result<(), StoreError> {
        self.record(&account.id, CallKind::Append);
        self.check_mutation()?;
        self.lock()
            .data
            .entry(account.id.clone())
            .or_default()
            .push(transaction.clone());
        Ok(())
    }

    async fn update(
        &self,
        account: &Account,
        transaction: &Transaction,
    ) -> Result<(), StoreError> {
        self.record(&account.id, CallKind::Update);
        self.check_mutation()?;
        let mut inner = self.lock();
        let rows = inner.data.entry(account.id.clone()).or_default();
        match rows.iter_mut().find(|t| t.id == transaction.id) {
            Some(slot) => {
                *slot = transaction.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(transaction.id.clone())),
        }
    }

    async fn remove(&self, account: &Account, id: &str) -> Result<(), StoreError> {
        self.record(&account.id, CallKind::Remove);
        self.check_mutation()?;
        let mut inner = self.lock();
        let rows = inner.data.entry(account.id.clone()).or_default();
        let before = rows.len();
        rows.retain(|t| t.id != id);
        if rows.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        self.record("", CallKind::ListAccounts);
        Ok(self.lock().accounts.clone())
    }

    async fn create_account(&self, name: &str) -> Result<Account, StoreError> {
        self.record("", CallKind::CreateAccount);
        let mut inner = self.lock();
        if let Some(existing) = inner.accounts.iter().find(|a| a.name == name) {
            return Ok(existing.clone());
        }
        let account = Account::new(uuid::Uuid::new_v4().to_string(), name);
        inner.data.insert(account.id.clone(), Vec::new());
        inner.accounts.push(account.clone());
        Ok(account)
    }
}
