//! The synchronization controller.
//!
//! Owns the in-memory transaction list for the active account and keeps it
//! converged with the remote store and the local cache. Mutations apply
//! optimistically: the list and the cache are updated first, then the
//! remote write happens (immediately for per-row backends, behind a
//! debounce window for bulk backends).
//!
//! Two counters keep concurrent work honest. `epoch` increments on every
//! account activation; any transfer completion carrying an older epoch is
//! discarded without touching state. `push_generation` increments on every
//! scheduled push; a debounce task that wakes to find a newer generation
//! knows it has been superseded and exits.

use crate::cache::LocalCache;
use crate::error::{StoreError, SyncError};
use crate::model::{sort_by_date_desc, today, Account, Transaction, TransactionStatus};
use crate::store::RemoteStore;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

/// Where the controller is in the load lifecycle of the active account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// No account activated yet.
    Uninitialized,
    /// Activation started; the list may hold cached data while the first
    /// pull is in flight.
    Loading,
    /// The first pull finished (successfully or not).
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    Idle,
    PullInFlight,
    PushInFlight,
}

/// A local edit to the active account's list.
#[derive(Debug, Clone)]
pub enum Mutation {
    Add(Transaction),
    Update(Transaction),
    Delete(String),
    SetStatus(String, TransactionStatus),
}

/// What happened on the remote side of a mutation. The local side has
/// already been applied in every case.
#[derive(Debug)]
pub enum RemoteOutcome {
    /// The remote row was written.
    Synced,
    /// A bulk push was scheduled behind the debounce window.
    Deferred,
    /// The remote write failed; the local state keeps the change.
    Failed(StoreError),
}

enum RowOp {
    Append(Transaction),
    Update(Transaction),
    Remove(String),
}

struct Inner {
    account: Option<Account>,
    transactions: Vec<Transaction>,
    load: LoadState,
    transfer: Transfer,
    epoch: u64,
    push_generation: u64,
    scheduled_push: bool,
}

#[derive(Clone)]
pub struct SyncController {
    store: Arc<dyn RemoteStore>,
    cache: LocalCache,
    debounce: Duration,
    inner: Arc<Mutex<Inner>>,
}

impl SyncController {
    pub fn new(store: Arc<dyn RemoteStore>, cache: LocalCache, debounce: Duration) -> Self {
        Self {
            store,
            cache,
            debounce,
            inner: Arc::new(Mutex::new(Inner {
                account: None,
                transactions: Vec::new(),
                load: LoadState::Uninitialized,
                transfer: Transfer::Idle,
                epoch: 0,
                push_generation: 0,
                scheduled_push: false,
            })),
        }
    }

    /// Makes `account` the active account: hydrates from the cache so the
    /// list is populated immediately, then pulls from the remote store.
    ///
    /// Any in-flight transfer for the previous account is orphaned; its
    /// completion will carry a stale epoch and be discarded.
    pub async fn activate(&self, account: Account) -> Result<(), SyncError> {
        let epoch = {
            let mut inner = self.lock();
            inner.epoch += 1;
            inner.push_generation += 1;
            inner.scheduled_push = false;
            inner.transfer = Transfer::Idle;
            inner.account = Some(account.clone());
            inner.load = LoadState::Loading;
            inner.transactions.clear();
            inner.epoch
        };

        match self.cache.read_or_migrate(&account.id) {
            Ok(Some(mut cached)) => {
                sort_by_date_desc(&mut cached);
                debug!(account = %account.id, count = cached.len(), "hydrated from cache");
                let mut inner = self.lock();
                if inner.epoch == epoch {
                    inner.transactions = cached;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("cache hydration failed: {e:#}"),
        }

        self.pull(epoch).await
    }

    /// Clears the active account and all local state.
    pub fn deactivate(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.push_generation += 1;
        inner.scheduled_push = false;
        inner.transfer = Transfer::Idle;
        inner.account = None;
        inner.transactions.clear();
        inner.load = LoadState::Uninitialized;
    }

    /// Re-pulls the active account. Skipped silently when a transfer is
    /// already in flight.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let epoch = self.lock().epoch;
        self.pull(epoch).await
    }

    async fn pull(&self, epoch: u64) -> Result<(), SyncError> {
        let account = {
            let mut inner = self.lock();
            if inner.epoch != epoch {
                return Ok(());
            }
            if inner.transfer != Transfer::Idle {
                debug!("pull skipped, transfer already in flight");
                return Ok(());
            }
            let account = inner.account.clone().ok_or(SyncError::NoActiveAccount)?;
            inner.transfer = Transfer::PullInFlight;
            account
        };

        let result = self.store.fetch_all(&account).await;

        let mut inner = self.lock();
        if inner.epoch != epoch {
            debug!(account = %account.id, "discarding stale pull response");
            return Ok(());
        }
        inner.transfer = Transfer::Idle;
        inner.load = LoadState::Ready;
        match result {
            Ok(mut fetched) => {
                sort_by_date_desc(&mut fetched);
                inner.transactions = fetched;
                let snapshot = inner.transactions.clone();
                drop(inner);
                if let Err(e) = self.cache.write(&account.id, &snapshot) {
                    warn!("cache write failed: {e:#}");
                }
                Ok(())
            }
            // Degraded: keep serving whatever the cache hydrated.
            Err(e) => Err(SyncError::Store(e)),
        }
    }

    /// Applies a mutation optimistically and arranges the remote write.
    pub async fn mutate(&self, mutation: Mutation) -> Result<RemoteOutcome, SyncError> {
        let (account, op, snapshot) = {
            let mut inner = self.lock();
            let account = inner.account.clone().ok_or(SyncError::NoActiveAccount)?;
            let op = apply(&mut inner.transactions, mutation)?;
            sort_by_date_desc(&mut inner.transactions);
            (account, op, inner.transactions.clone())
        };

        // Write-through before the network call so the edit survives a
        // crash or an offline session.
        if let Err(e) = self.cache.write(&account.id, &snapshot) {
            warn!("cache write failed: {e:#}");
        }

        if !self.store.supports_row_ops() {
            self.schedule_push();
            return Ok(RemoteOutcome::Deferred);
        }

        let result = match &op {
            RowOp::Append(tx) => self.store.append(&account, tx).await,
            RowOp::Update(tx) => self.store.update(&account, tx).await,
            RowOp::Remove(id) => self.store.remove(&account, id).await,
        };
        match result {
            Ok(()) => Ok(RemoteOutcome::Synced),
            Err(e) => {
                warn!(account = %account.id, "remote write failed, keeping local change: {e}");
                Ok(RemoteOutcome::Failed(e))
            }
        }
    }

    /// Pushes any pending bulk state immediately, cancelling the debounce
    /// window. For per-row backends this is a no-op since every mutation
    /// was written as it happened.
    pub async fn flush(&self) -> Result<RemoteOutcome, SyncError> {
        if self.store.supports_row_ops() {
            return Ok(RemoteOutcome::Synced);
        }
        let (account, snapshot, epoch) = {
            let mut inner = self.lock();
            if !inner.scheduled_push {
                return Ok(RemoteOutcome::Synced);
            }
            if inner.transfer != Transfer::Idle {
                return Ok(RemoteOutcome::Deferred);
            }
            let account = inner.account.clone().ok_or(SyncError::NoActiveAccount)?;
            inner.push_generation += 1;
            inner.scheduled_push = false;
            inner.transfer = Transfer::PushInFlight;
            (account, inner.transactions.clone(), inner.epoch)
        };

        let result = self.store.replace_all(&account, &snapshot).await;

        let mut inner = self.lock();
        if inner.epoch == epoch && inner.transfer == Transfer::PushInFlight {
            inner.transfer = Transfer::Idle;
        }
        match result {
            Ok(()) => Ok(RemoteOutcome::Synced),
            Err(e) => {
                if inner.epoch == epoch {
                    inner.scheduled_push = true;
                }
                Err(SyncError::Store(e))
            }
        }
    }

    /// Arms (or re-arms) the debounced bulk push. Every call supersedes
    /// any previously armed window, so the push fires a full debounce
    /// interval after the last mutation.
    fn schedule_push(&self) {
        let generation = {
            let mut inner = self.lock();
            inner.push_generation += 1;
            inner.scheduled_push = true;
            inner.push_generation
        };
        let controller = self.clone();
        tokio::spawn(async move { controller.debounced_push(generation).await });
    }

    async fn debounced_push(&self, generation: u64) {
        loop {
            tokio::time::sleep(self.debounce).await;
            let (account, snapshot, epoch) = {
                let mut inner = self.lock();
                if inner.push_generation != generation {
                    // A newer mutation or an account switch owns the push now.
                    return;
                }
                if inner.transfer != Transfer::Idle || inner.load != LoadState::Ready {
                    // A transfer or the initial load is in progress; wait
                    // another full window rather than interleave.
                    continue;
                }
                let account = match inner.account.clone() {
                    Some(a) => a,
                    None => return,
                };
                inner.scheduled_push = false;
                inner.transfer = Transfer::PushInFlight;
                (account, inner.transactions.clone(), inner.epoch)
            };

            let result = self.store.replace_all(&account, &snapshot).await;

            let mut inner = self.lock();
            if inner.epoch == epoch && inner.transfer == Transfer::PushInFlight {
                inner.transfer = Transfer::Idle;
            }
            if let Err(e) = result {
                warn!(account = %account.id, "push failed, keeping state dirty: {e}");
                if inner.epoch == epoch {
                    inner.scheduled_push = true;
                }
            } else {
                debug!(account = %account.id, count = snapshot.len(), "pushed full set");
            }
            return;
        }
    }

    /// A snapshot of the active account's list, newest first.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.lock().transactions.clone()
    }

    pub fn account(&self) -> Option<Account> {
        self.lock().account.clone()
    }

    pub fn load_state(&self) -> LoadState {
        self.lock().load
    }

    /// Whether local state has changes not yet pushed to the remote.
    pub fn is_dirty(&self) -> bool {
        self.lock().scheduled_push
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn apply(transactions: &mut Vec<Transaction>, mutation: Mutation) -> Result<RowOp, SyncError> {
    match mutation {
        Mutation::Add(tx) => {
            transactions.push(tx.clone());
            Ok(RowOp::Append(tx))
        }
        Mutation::Update(tx) => {
            let slot = transactions
                .iter_mut()
                .find(|t| t.id == tx.id)
                .ok_or_else(|| SyncError::UnknownTransaction(tx.id.clone()))?;
            *slot = tx.clone();
            Ok(RowOp::Update(tx))
        }
        Mutation::Delete(id) => {
            let before = transactions.len();
            transactions.retain(|t| t.id != id);
            if transactions.len() == before {
                return Err(SyncError::UnknownTransaction(id));
            }
            Ok(RowOp::Remove(id))
        }
        Mutation::SetStatus(id, status) => {
            let tx = transactions
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| SyncError::UnknownTransaction(id))?;
            tx.status = status;
            if status == TransactionStatus::Paid {
                // Settling a pending transaction books it on the day it
                // actually cleared, not the day it was planned for.
                tx.date = today();
            }
            Ok(RowOp::Update(tx.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Amount, TransactionKind};
    use crate::store::{CallKind, MemoryStore};
    use chrono::NaiveDate;
    use std::str::FromStr;
    use tempfile::TempDir;

    const DEBOUNCE: Duration = Duration::from_millis(2000);

    fn setup(row_ops: bool) -> (SyncController, Arc<MemoryStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new(row_ops));
        let cache = LocalCache::open(dir.path()).unwrap();
        let controller = SyncController::new(store.clone(), cache, DEBOUNCE);
        (controller, store, dir)
    }

    fn tx(id: &str, date: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            kind: TransactionKind::Expense,
            category: "Food".to_string(),
            amount: Amount::from_str("10").unwrap(),
            date: NaiveDate::from_str(date).unwrap(),
            description: "test".to_string(),
            status: TransactionStatus::Paid,
        }
    }

    fn account() -> Account {
        Account::new("a1", "Personal")
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_activate_pulls_sorts_and_caches() {
        let (controller, store, dir) = setup(false);
        store.seed("a1", vec![tx("old", "2024-01-01"), tx("new", "2024-06-01")]);

        controller.activate(account()).await.unwrap();

        let list = controller.transactions();
        assert_eq!(list[0].id, "new");
        assert_eq!(list[1].id, "old");
        assert_eq!(controller.load_state(), LoadState::Ready);

        let cache = LocalCache::open(dir.path()).unwrap();
        assert_eq!(cache.read("a1").unwrap().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_coalesce_into_one_push() {
        let (controller, store, _dir) = setup(false);
        controller.activate(account()).await.unwrap();

        controller
            .mutate(Mutation::Add(tx("t1", "2024-03-01")))
            .await
            .unwrap();
        settle().await;
        tokio::time::advance(Duration::from_millis(500)).await;
        controller
            .mutate(Mutation::Add(tx("t2", "2024-03-02")))
            .await
            .unwrap();
        settle().await;
        tokio::time::advance(Duration::from_millis(500)).await;
        controller
            .mutate(Mutation::Add(tx("t3", "2024-03-03")))
            .await
            .unwrap();
        settle().await;

        // One millisecond short of the window after the last mutation.
        tokio::time::advance(Duration::from_millis(1999)).await;
        settle().await;
        assert_eq!(store.call_count(CallKind::ReplaceAll), 0);
        assert!(controller.is_dirty());

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(store.call_count(CallKind::ReplaceAll), 1);
        assert_eq!(store.data("a1").len(), 3);
        assert!(!controller.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_rearms_while_pull_in_flight() {
        let (controller, store, _dir) = setup(false);
        store.seed("a1", vec![tx("remote", "2024-05-01")]);
        store.set_fetch_delay("a1", Duration::from_millis(5000));

        let background = controller.clone();
        let handle = tokio::spawn(async move { background.activate(account()).await });
        settle().await;

        // The pull is in flight; a mutation arms the debounce anyway.
        controller
            .mutate(Mutation::Add(tx("local", "2024-03-01")))
            .await
            .unwrap();
        settle().await;

        // The window expires at 2000 and again at 4000 with the pull
        // still in flight; the task re-arms instead of pushing.
        tokio::time::advance(Duration::from_millis(4000)).await;
        settle().await;
        assert_eq!(store.call_count(CallKind::ReplaceAll), 0);

        // Pull lands at 5000; the re-armed window fires at 6000.
        tokio::time::advance(Duration::from_millis(1000)).await;
        settle().await;
        handle.await.unwrap().unwrap();
        assert_eq!(controller.load_state(), LoadState::Ready);

        tokio::time::advance(Duration::from_millis(1000)).await;
        settle().await;
        assert_eq!(store.call_count(CallKind::ReplaceAll), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_pull_is_discarded_after_account_switch() {
        let (controller, store, _dir) = setup(false);
        store.seed("a1", vec![tx("from-a1", "2024-01-01")]);
        store.seed("a2", vec![tx("from-a2", "2024-02-01")]);
        store.set_fetch_delay("a1", Duration::from_millis(5000));

        let background = controller.clone();
        let slow = tokio::spawn(async move { background.activate(account()).await });
        settle().await;

        // Switch away before the slow pull returns.
        controller
            .activate(Account::new("a2", "Household"))
            .await
            .unwrap();
        assert_eq!(controller.transactions()[0].id, "from-a2");

        tokio::time::advance(Duration::from_millis(5000)).await;
        settle().await;
        slow.await.unwrap().unwrap();

        // The slow response for a1 must not clobber a2's state.
        let list = controller.transactions();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "from-a2");
        assert_eq!(controller.account().unwrap().id, "a2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_row_ops_write_immediately_and_never_bulk_push() {
        let (controller, store, _dir) = setup(true);
        controller.activate(account()).await.unwrap();

        let outcome = controller
            .mutate(Mutation::Add(tx("t1", "2024-03-01")))
            .await
            .unwrap();
        assert!(matches!(outcome, RemoteOutcome::Synced));
        assert_eq!(store.call_count(CallKind::Append), 1);

        controller
            .mutate(Mutation::SetStatus("t1".to_string(), TransactionStatus::Pending))
            .await
            .unwrap();
        assert_eq!(store.call_count(CallKind::Update), 1);

        controller
            .mutate(Mutation::Delete("t1".to_string()))
            .await
            .unwrap();
        assert_eq!(store.call_count(CallKind::Remove), 1);

        tokio::time::advance(Duration::from_millis(3000)).await;
        settle().await;
        assert_eq!(store.call_count(CallKind::ReplaceAll), 0);
    }

    #[tokio::test]
    async fn test_settling_pending_stamps_today() {
        let (controller, store, _dir) = setup(false);
        let mut pending = tx("t1", "2024-01-15");
        pending.status = TransactionStatus::Pending;
        store.seed("a1", vec![pending]);
        controller.activate(account()).await.unwrap();

        controller
            .mutate(Mutation::SetStatus("t1".to_string(), TransactionStatus::Paid))
            .await
            .unwrap();

        let list = controller.transactions();
        assert_eq!(list[0].status, TransactionStatus::Paid);
        assert_eq!(list[0].date, today());
    }

    #[tokio::test]
    async fn test_fetch_failure_degrades_to_cached_data() {
        let (controller, store, dir) = setup(false);
        let cache = LocalCache::open(dir.path()).unwrap();
        cache.write("a1", &[tx("cached", "2024-02-01")]).unwrap();
        store.fail_fetches("a1");

        let result = controller.activate(account()).await;
        assert!(matches!(result, Err(SyncError::Store(_))));

        // The ledger still shows the cached data.
        assert_eq!(controller.transactions()[0].id, "cached");
        assert_eq!(controller.load_state(), LoadState::Ready);
    }

    #[tokio::test]
    async fn test_optimistic_change_survives_remote_failure() {
        let (controller, store, dir) = setup(true);
        controller.activate(account()).await.unwrap();
        store.fail_mutations(true);

        let outcome = controller
            .mutate(Mutation::Add(tx("t1", "2024-03-01")))
            .await
            .unwrap();
        assert!(matches!(outcome, RemoteOutcome::Failed(_)));

        assert_eq!(controller.transactions().len(), 1);
        let cache = LocalCache::open(dir.path()).unwrap();
        assert_eq!(cache.read("a1").unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mutating_unknown_id_is_an_error() {
        let (controller, _store, _dir) = setup(false);
        controller.activate(account()).await.unwrap();

        let err = controller
            .mutate(Mutation::Delete("ghost".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnknownTransaction(id) if id == "ghost"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_pushes_now_and_cancels_window() {
        let (controller, store, _dir) = setup(false);
        controller.activate(account()).await.unwrap();

        controller
            .mutate(Mutation::Add(tx("t1", "2024-03-01")))
            .await
            .unwrap();
        settle().await;

        let outcome = controller.flush().await.unwrap();
        assert!(matches!(outcome, RemoteOutcome::Synced));
        assert_eq!(store.call_count(CallKind::ReplaceAll), 1);

        // The armed debounce task was superseded; nothing fires later.
        tokio::time::advance(Duration::from_millis(5000)).await;
        settle().await;
        assert_eq!(store.call_count(CallKind::ReplaceAll), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_skipped_while_pull_in_flight() {
        let (controller, store, _dir) = setup(false);
        store.set_fetch_delay("a1", Duration::from_millis(3000));

        let background = controller.clone();
        let handle = tokio::spawn(async move { background.activate(account()).await });
        settle().await;

        controller.refresh().await.unwrap();
        tokio::time::advance(Duration::from_millis(3000)).await;
        settle().await;
        handle.await.unwrap().unwrap();

        assert_eq!(store.call_count(CallKind::FetchAll), 1);
    }

    // A cached expense, a new pending income, and a debounce window later
    // the remote holds both, newest first.
    #[tokio::test(start_paused = true)]
    async fn test_cached_account_plus_new_income_pushes_both() {
        let (controller, store, dir) = setup(false);
        let mut cached = tx("id1", "2024-03-01");
        cached.amount = Amount::from_str("50").unwrap();
        let cache = LocalCache::open(dir.path()).unwrap();
        cache.write("a1", &[cached.clone()]).unwrap();
        store.seed("a1", vec![cached]);

        controller.activate(account()).await.unwrap();

        let mut income = tx("id2", "2024-03-02");
        income.kind = TransactionKind::Income;
        income.amount = Amount::from_str("30000").unwrap();
        income.status = TransactionStatus::Pending;
        controller.mutate(Mutation::Add(income)).await.unwrap();
        settle().await;

        let list = controller.transactions();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, "id2");
        assert_eq!(list[1].id, "id1");

        tokio::time::advance(DEBOUNCE).await;
        settle().await;
        assert_eq!(store.call_count(CallKind::ReplaceAll), 1);

        let pushed = store.data("a1");
        assert_eq!(pushed.len(), 2);
        assert_eq!(pushed[0].kind, TransactionKind::Income);
        assert_eq!(pushed[0].amount, Amount::from_str("30000").unwrap());
        assert_eq!(pushed[0].status, TransactionStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deactivate_cancels_pending_push() {
        let (controller, store, _dir) = setup(false);
        controller.activate(account()).await.unwrap();
        controller
            .mutate(Mutation::Add(tx("t1", "2024-03-01")))
            .await
            .unwrap();
        settle().await;

        controller.deactivate();
        assert_eq!(controller.load_state(), LoadState::Uninitialized);
        assert!(controller.transactions().is_empty());

        tokio::time::advance(Duration::from_millis(5000)).await;
        settle().await;
        assert_eq!(store.call_count(CallKind::ReplaceAll), 0);
    }
}
