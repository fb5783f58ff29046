//! Reactive expense and budget store
//!
//! The store owns two collections kept as JSON arrays under fixed keys of a
//! `StorageBackend`. Observers `subscribe` to a collection and get the full
//! snapshot immediately and again after every change, whether the change was
//! made through this store or by another process sharing the storage
//! (surfaced by `sync_external`).
//!
//! # Consistency
//!
//! Mutations are read-modify-write on the whole collection. Within one
//! process they are serialized by the caller. Between processes they are not
//! coordinated: two writers racing on the same collection means the last
//! write wins and the other change is lost. There is no per-record
//! versioning.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::models::{validate_amount, Budget, Category, Collection, Expense};
use crate::storage::StorageBackend;
use crate::sync::{ChangeChannel, ChangeEvent, Mutation};

/// Full contents of one collection, as handed to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Expenses(Vec<Expense>),
    Budgets(Vec<Budget>),
}

impl Snapshot {
    pub fn collection(&self) -> Collection {
        match self {
            Self::Expenses(_) => Collection::Expenses,
            Self::Budgets(_) => Collection::Budgets,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Expenses(list) => list.len(),
            Self::Budgets(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Callback = Arc<dyn Fn(&Snapshot) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: HashMap<Collection, BTreeMap<u64, Callback>>,
}

fn lock_registry(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // Callbacks never run under this lock, so a poisoned registry is still consistent
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle returned by `Store::subscribe`
///
/// Dropping the handle unsubscribes, so keep it alive as long as updates
/// are wanted.
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    collection: Collection,
    id: u64,
}

impl Subscription {
    /// Stop receiving snapshots. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = lock_registry(&registry);
            if let Some(subs) = registry.subscribers.get_mut(&self.collection) {
                subs.remove(&self.id);
            }
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Expense and budget repository with change notification
pub struct Store {
    backend: Arc<dyn StorageBackend>,
    registry: Arc<Mutex<Registry>>,
    channel: ChangeChannel,
}

impl Store {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            registry: Arc::new(Mutex::new(Registry::default())),
            channel: ChangeChannel::new(),
        }
    }

    /// Channel carrying every change event this store delivers
    pub fn channel(&self) -> &ChangeChannel {
        &self.channel
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    // ========== Subscriptions ==========

    /// Register `callback` for `collection`
    ///
    /// The callback runs once right away with the current snapshot, then after
    /// every change until the returned handle is unsubscribed or dropped.
    pub fn subscribe<F>(&self, collection: Collection, callback: F) -> Subscription
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        let id = {
            let mut registry = lock_registry(&self.registry);
            let id = registry.next_id;
            registry.next_id += 1;
            registry
                .subscribers
                .entry(collection)
                .or_default()
                .insert(id, callback.clone());
            id
        };
        debug!(%collection, id, "Subscribed");

        callback(&self.snapshot(collection));

        Subscription {
            registry: Arc::downgrade(&self.registry),
            collection,
            id,
        }
    }

    /// Subscribe to expense snapshots (date descending)
    pub fn subscribe_expenses<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[Expense]) + Send + Sync + 'static,
    {
        self.subscribe(Collection::Expenses, move |snapshot| {
            if let Snapshot::Expenses(list) = snapshot {
                callback(list);
            }
        })
    }

    /// Subscribe to reconciled budget snapshots
    pub fn subscribe_budgets<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[Budget]) + Send + Sync + 'static,
    {
        self.subscribe(Collection::Budgets, move |snapshot| {
            if let Snapshot::Budgets(list) = snapshot {
                callback(list);
            }
        })
    }

    /// Number of live subscribers for a collection
    pub fn subscriber_count(&self, collection: Collection) -> usize {
        lock_registry(&self.registry)
            .subscribers
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }

    /// Publish `event` and hand fresh snapshots to the collection's subscribers
    fn notify(&self, event: ChangeEvent) {
        self.channel.publish(event);

        let callbacks: Vec<Callback> = lock_registry(&self.registry)
            .subscribers
            .get(&event.collection)
            .map(|subs| subs.values().cloned().collect())
            .unwrap_or_default();
        if callbacks.is_empty() {
            return;
        }

        let snapshot = self.snapshot(event.collection);
        for callback in callbacks {
            callback(&snapshot);
        }
    }

    /// Current snapshot for delivery; read failures degrade to an empty view
    fn snapshot(&self, collection: Collection) -> Snapshot {
        match collection {
            Collection::Expenses => Snapshot::Expenses(self.load_expenses().unwrap_or_else(|e| {
                error!(error = %e, "Failed to load expenses");
                Vec::new()
            })),
            Collection::Budgets => Snapshot::Budgets(self.load_budgets().unwrap_or_else(|e| {
                error!(error = %e, "Failed to load budgets");
                reconcile_budgets(Vec::new()).0
            })),
        }
    }

    // ========== Expenses ==========

    /// All expenses, most recent date first
    ///
    /// Expenses sharing a date keep the order they were added in.
    pub fn load_expenses(&self) -> Result<Vec<Expense>> {
        let mut expenses: Vec<Expense> = self.read(Collection::Expenses)?;
        expenses.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(expenses)
    }

    /// Append an expense and notify subscribers
    ///
    /// If the write fails the stored collection is untouched and no
    /// subscriber is notified.
    pub fn add_expense(&self, expense: Expense) -> Result<()> {
        validate_amount("amount", expense.amount)?;

        let mut expenses: Vec<Expense> = self.read(Collection::Expenses)?;
        if expenses.iter().any(|e| e.id == expense.id) {
            return Err(Error::InvalidData(format!(
                "Expense {} already exists",
                expense.id
            )));
        }

        let id = expense.id.clone();
        expenses.push(expense);
        self.write(Collection::Expenses, &expenses)?;

        debug!(id = %id, count = expenses.len(), "Added expense");
        self.notify(ChangeEvent::local(Collection::Expenses, Mutation::ExpenseAdded));
        Ok(())
    }

    /// Replace the expense with the same id
    pub fn replace_expense(&self, expense: Expense) -> Result<()> {
        validate_amount("amount", expense.amount)?;

        let mut expenses: Vec<Expense> = self.read(Collection::Expenses)?;
        let slot = expenses
            .iter_mut()
            .find(|e| e.id == expense.id)
            .ok_or_else(|| Error::NotFound(format!("Expense {}", expense.id)))?;
        *slot = expense;
        self.write(Collection::Expenses, &expenses)?;

        self.notify(ChangeEvent::local(
            Collection::Expenses,
            Mutation::ExpenseReplaced,
        ));
        Ok(())
    }

    /// Delete an expense by id, returning whether it existed
    ///
    /// An unknown id leaves storage untouched but still notifies, so
    /// subscribers see a no-change update.
    pub fn delete_expense(&self, id: &str) -> Result<bool> {
        let mut expenses: Vec<Expense> = self.read(Collection::Expenses)?;
        let before = expenses.len();
        expenses.retain(|e| e.id != id);
        let removed = expenses.len() != before;

        if removed {
            self.write(Collection::Expenses, &expenses)?;
            debug!(id, "Deleted expense");
        } else {
            debug!(id, "Delete of unknown expense ignored");
        }

        self.notify(ChangeEvent::local(
            Collection::Expenses,
            Mutation::ExpenseDeleted,
        ));
        Ok(removed)
    }

    // ========== Budgets ==========

    /// Budgets with exactly one entry per category
    ///
    /// A missing or empty collection is seeded with the default limits.
    /// Categories missing from a non-empty collection are added with a zero
    /// limit and duplicates are dropped (first entry wins). Any such repair
    /// is written back.
    pub fn load_budgets(&self) -> Result<Vec<Budget>> {
        let stored: Vec<Budget> = self.read(Collection::Budgets)?;
        let (budgets, changed) = reconcile_budgets(stored);

        if changed {
            match self.write(Collection::Budgets, &budgets) {
                Ok(()) => {
                    info!(count = budgets.len(), "Reconciled budget collection");
                    // Snapshot subscribers already get the reconciled list; listeners
                    // on the channel learn that storage changed
                    self.channel.publish(ChangeEvent::local(
                        Collection::Budgets,
                        Mutation::BudgetsReconciled,
                    ));
                }
                Err(e) => warn!(error = %e, "Failed to write back reconciled budgets"),
            }
        }

        Ok(budgets)
    }

    /// Set the limit for `category`, adding the entry if it is missing
    pub fn upsert_budget(&self, category: Category, limit: f64) -> Result<()> {
        validate_amount("limit", limit)?;

        let mut budgets: Vec<Budget> = self.read(Collection::Budgets)?;
        match budgets.iter_mut().find(|b| b.category == category) {
            Some(budget) => budget.limit = limit,
            None => budgets.push(Budget { category, limit }),
        }
        self.write(Collection::Budgets, &budgets)?;

        debug!(%category, limit, "Updated budget");
        self.notify(ChangeEvent::local(
            Collection::Budgets,
            Mutation::BudgetUpserted,
        ));
        Ok(())
    }

    // ========== Cross-process sync ==========

    /// Notify subscribers of collections another process has written
    ///
    /// Returns the collections that were refreshed.
    pub fn sync_external(&self) -> Result<Vec<Collection>> {
        let keys = self.backend.poll_external()?;

        let mut collections = Vec::new();
        let mut seen = HashSet::new();
        for key in keys {
            match Collection::from_key(&key) {
                Some(collection) if seen.insert(collection) => collections.push(collection),
                Some(_) => {}
                None => debug!(key = %key, "Ignoring external change to unknown key"),
            }
        }

        for collection in &collections {
            info!(%collection, "Collection changed in another process");
            self.notify(ChangeEvent::external(*collection));
        }
        Ok(collections)
    }

    // ========== Raw access ==========

    fn read<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>> {
        match self.backend.get(collection.key())? {
            None => Ok(Vec::new()),
            Some(raw) if raw.trim().is_empty() => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| Error::persistence(&format!("decoding {}", collection), e)),
        }
    }

    fn write<T: Serialize>(&self, collection: Collection, records: &[T]) -> Result<()> {
        let raw = serde_json::to_string(records)
            .map_err(|e| Error::persistence(&format!("encoding {}", collection), e))?;
        self.backend.set(collection.key(), &raw)
    }
}

/// Poll `store.sync_external()` every `interval` until the handle is aborted
pub fn spawn_sync_task(store: Arc<Store>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = store.sync_external() {
                warn!(error = %e, "External sync failed");
            }
        }
    })
}

/// Ensure exactly one budget per category
///
/// Returns the reconciled list and whether it differs from the input.
pub fn reconcile_budgets(stored: Vec<Budget>) -> (Vec<Budget>, bool) {
    if stored.is_empty() {
        let seeded = Category::ALL
            .into_iter()
            .map(|category| Budget {
                category,
                limit: category.default_limit(),
            })
            .collect();
        return (seeded, true);
    }

    let original_len = stored.len();
    let mut present = HashSet::new();
    let mut budgets: Vec<Budget> = stored
        .into_iter()
        .filter(|b| present.insert(b.category))
        .collect();
    let deduplicated = budgets.len() != original_len;

    let missing: Vec<Budget> = Category::ALL
        .into_iter()
        .filter(|c| !present.contains(c))
        .map(|category| Budget {
            category,
            limit: 0.0,
        })
        .collect();
    let synthesized = !missing.is_empty();
    budgets.extend(missing);

    (budgets, deduplicated || synthesized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewExpense;
    use crate::storage::MemoryStorage;
    use crate::sync::ChangeReason;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn expense(amount: f64, category: Category, on: &str) -> Expense {
        Expense::new(NewExpense {
            amount,
            category,
            description: format!("{} on {}", category, on),
            date: date(on),
        })
        .unwrap()
    }

    fn memory_store() -> (Arc<MemoryStorage>, Store) {
        let storage = Arc::new(MemoryStorage::new());
        let store = Store::new(storage.clone());
        (storage, store)
    }

    /// Record every expense snapshot a subscriber receives
    fn record_expenses(store: &Store) -> (Arc<Mutex<Vec<Vec<Expense>>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = store.subscribe_expenses(move |list| sink.lock().unwrap().push(list.to_vec()));
        (seen, sub)
    }

    fn assert_one_per_category(budgets: &[Budget]) {
        assert_eq!(budgets.len(), Category::ALL.len());
        for category in Category::ALL {
            assert_eq!(
                budgets.iter().filter(|b| b.category == category).count(),
                1,
                "expected exactly one budget for {}",
                category
            );
        }
    }

    // ========== Subscribe ==========

    #[test]
    fn test_subscribe_delivers_current_snapshot_immediately() {
        let (_storage, store) = memory_store();
        let (seen, _sub) = record_expenses(&store);
        assert_eq!(seen.lock().unwrap().as_slice(), &[Vec::<Expense>::new()]);
    }

    #[test]
    fn test_add_then_subscribe_contains_expense_once_in_date_order() {
        let (_storage, store) = memory_store();
        let older = expense(100.0, Category::Transport, "2024-01-01");
        let newest = expense(40.0, Category::Health, "2024-03-01");
        let middle = expense(250.0, Category::Food, "2024-01-02");

        store.add_expense(older.clone()).unwrap();
        store.add_expense(newest.clone()).unwrap();
        store.add_expense(middle.clone()).unwrap();

        let (seen, _sub) = record_expenses(&store);
        let snapshot = seen.lock().unwrap()[0].clone();
        assert_eq!(snapshot, vec![newest, middle.clone(), older]);
        assert_eq!(snapshot.iter().filter(|e| e.id == middle.id).count(), 1);
    }

    #[test]
    fn test_same_date_keeps_insertion_order() {
        let (_storage, store) = memory_store();
        let first = expense(1.0, Category::Food, "2024-02-02");
        let second = expense(2.0, Category::Food, "2024-02-02");
        let earlier = expense(3.0, Category::Food, "2024-02-01");
        let third = expense(4.0, Category::Food, "2024-02-02");
        for e in [&first, &second, &earlier, &third] {
            store.add_expense(e.clone()).unwrap();
        }

        let ids: Vec<String> = store
            .load_expenses()
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id, third.id, earlier.id]);
    }

    #[test]
    fn test_subscribers_notified_on_add() {
        let (_storage, store) = memory_store();
        let (seen, _sub) = record_expenses(&store);

        let e = expense(250.0, Category::Food, "2024-01-02");
        store.add_expense(e.clone()).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], vec![e]);
    }

    #[test]
    fn test_add_duplicate_id_rejected() {
        let (_storage, store) = memory_store();
        let e = expense(10.0, Category::Other, "2024-01-01");
        store.add_expense(e.clone()).unwrap();
        assert!(matches!(store.add_expense(e), Err(Error::InvalidData(_))));
        assert_eq!(store.load_expenses().unwrap().len(), 1);
    }

    #[test]
    fn test_add_rejects_negative_amount() {
        let (_storage, store) = memory_store();
        let mut e = expense(10.0, Category::Other, "2024-01-01");
        e.amount = -5.0;
        assert!(matches!(store.add_expense(e), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_add_failure_leaves_collection_and_subscribers_unchanged() {
        let storage = Arc::new(MemoryStorage::with_quota(400));
        let store = Store::new(storage.clone());

        store
            .add_expense(expense(1.0, Category::Food, "2024-01-01"))
            .unwrap();
        let before = storage.get("expenses").unwrap();
        let (seen, _sub) = record_expenses(&store);

        let mut big = expense(2.0, Category::Food, "2024-01-02");
        big.description = "x".repeat(1000);
        let err = store.add_expense(big).unwrap_err();

        assert!(err.is_persistence());
        assert_eq!(storage.get("expenses").unwrap(), before);
        // Only the initial delivery, no partial write observed
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(store.load_expenses().unwrap().len(), 1);
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let (_storage, store) = memory_store();
        let written: Vec<Expense> = (0..10)
            .map(|i| {
                let mut e = expense(
                    10.5 * i as f64,
                    Category::ALL[i % Category::ALL.len()],
                    &format!("2024-01-{:02}", i + 1),
                );
                e.description = format!("item #{} \"quoted\" ₹", i);
                e
            })
            .collect();
        for e in &written {
            store.add_expense(e.clone()).unwrap();
        }

        let mut read = store.load_expenses().unwrap();
        read.sort_by(|a, b| a.id.cmp(&b.id));
        let mut expected = written.clone();
        expected.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(read, expected);
    }

    // ========== Delete / replace ==========

    #[test]
    fn test_delete_existing_expense() {
        let (_storage, store) = memory_store();
        let keep = expense(1.0, Category::Food, "2024-01-01");
        let gone = expense(2.0, Category::Food, "2024-01-02");
        store.add_expense(keep.clone()).unwrap();
        store.add_expense(gone.clone()).unwrap();

        assert!(store.delete_expense(&gone.id).unwrap());
        assert_eq!(store.load_expenses().unwrap(), vec![keep]);
    }

    #[test]
    fn test_delete_unknown_id_is_noop_but_notifies() {
        let (storage, store) = memory_store();
        store
            .add_expense(expense(1.0, Category::Food, "2024-01-01"))
            .unwrap();
        let before = storage.get("expenses").unwrap();
        let (seen, _sub) = record_expenses(&store);

        assert!(!store.delete_expense("does-not-exist").unwrap());

        assert_eq!(storage.get("expenses").unwrap(), before);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], seen[1]);
    }

    #[test]
    fn test_delete_on_empty_store_writes_nothing() {
        let (storage, store) = memory_store();
        assert!(!store.delete_expense("nope").unwrap());
        assert_eq!(storage.get("expenses").unwrap(), None);
    }

    #[test]
    fn test_replace_expense() {
        let (_storage, store) = memory_store();
        let mut e = expense(1.0, Category::Food, "2024-01-01");
        store.add_expense(e.clone()).unwrap();

        e.amount = 99.0;
        e.category = Category::Shopping;
        store.replace_expense(e.clone()).unwrap();
        assert_eq!(store.load_expenses().unwrap(), vec![e]);

        let stranger = expense(5.0, Category::Other, "2024-01-01");
        assert!(matches!(
            store.replace_expense(stranger),
            Err(Error::NotFound(_))
        ));
    }

    // ========== Budgets ==========

    #[test]
    fn test_first_load_seeds_defaults_and_writes_back() {
        let (storage, store) = memory_store();
        let budgets = store.load_budgets().unwrap();

        assert_one_per_category(&budgets);
        let limit = |c: Category| budgets.iter().find(|b| b.category == c).unwrap().limit;
        assert_eq!(limit(Category::Food), 5000.0);
        assert_eq!(limit(Category::Entertainment), 1500.0);
        assert_eq!(limit(Category::Housing), 0.0);

        let stored: Vec<Budget> =
            serde_json::from_str(&storage.get("budgets").unwrap().unwrap()).unwrap();
        assert_eq!(stored, budgets);
    }

    #[test]
    fn test_load_appends_missing_categories_with_zero() {
        let (storage, store) = memory_store();
        storage
            .set("budgets", r#"[{"category":"Health","limit":300}]"#)
            .unwrap();

        let budgets = store.load_budgets().unwrap();
        assert_one_per_category(&budgets);
        assert_eq!(budgets[0], Budget { category: Category::Health, limit: 300.0 });
        // Not seeded with defaults since the collection was not empty
        let food = budgets.iter().find(|b| b.category == Category::Food).unwrap();
        assert_eq!(food.limit, 0.0);
    }

    #[test]
    fn test_load_drops_duplicates_and_unknown_labels_collapse_into_other() {
        let (storage, store) = memory_store();
        storage
            .set(
                "budgets",
                r#"[{"category":"Other","limit":10},
                    {"category":"Groceries","limit":20},
                    {"category":"Food & Drink","limit":30},
                    {"category":"Food & Drink","limit":40}]"#,
            )
            .unwrap();

        let budgets = store.load_budgets().unwrap();
        assert_one_per_category(&budgets);
        let limit = |c: Category| budgets.iter().find(|b| b.category == c).unwrap().limit;
        assert_eq!(limit(Category::Other), 10.0);
        assert_eq!(limit(Category::Food), 30.0);
    }

    #[test]
    fn test_reconcile_always_yields_one_per_category() {
        let inputs: Vec<Vec<Budget>> = vec![
            vec![],
            Category::ALL
                .iter()
                .map(|&category| Budget { category, limit: 1.0 })
                .collect(),
            vec![Budget { category: Category::Shopping, limit: 5.0 }; 3],
            Category::ALL
                .iter()
                .rev()
                .chain(Category::ALL.iter())
                .map(|&category| Budget { category, limit: 2.0 })
                .collect(),
        ];
        for input in inputs {
            let (budgets, _) = reconcile_budgets(input);
            assert_one_per_category(&budgets);
        }
    }

    #[test]
    fn test_reconcile_reports_unchanged_complete_collection() {
        let complete: Vec<Budget> = Category::ALL
            .iter()
            .map(|&category| Budget { category, limit: 1.0 })
            .collect();
        let (budgets, changed) = reconcile_budgets(complete.clone());
        assert!(!changed);
        assert_eq!(budgets, complete);
    }

    #[test]
    fn test_upsert_budget_replaces_and_notifies() {
        let (_storage, store) = memory_store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = store.subscribe_budgets(move |list| sink.lock().unwrap().push(list.to_vec()));

        store.upsert_budget(Category::Food, 6000.0).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_one_per_category(&seen[1]);
        let food = seen[1].iter().find(|b| b.category == Category::Food).unwrap();
        assert_eq!(food.limit, 6000.0);
    }

    #[test]
    fn test_upsert_budget_appends_when_absent() {
        let (storage, store) = memory_store();
        store.upsert_budget(Category::Health, 250.0).unwrap();

        let stored: Vec<Budget> =
            serde_json::from_str(&storage.get("budgets").unwrap().unwrap()).unwrap();
        assert_eq!(stored, vec![Budget { category: Category::Health, limit: 250.0 }]);
    }

    #[test]
    fn test_upsert_budget_rejects_negative_limit() {
        let (_storage, store) = memory_store();
        assert!(matches!(
            store.upsert_budget(Category::Food, -1.0),
            Err(Error::InvalidData(_))
        ));
    }

    // ========== Unsubscribe ==========

    #[test]
    fn test_unsubscribe_is_idempotent_and_isolated() {
        let (_storage, store) = memory_store();
        let (first_seen, first) = record_expenses(&store);
        let (second_seen, _second) = record_expenses(&store);
        assert_eq!(store.subscriber_count(Collection::Expenses), 2);

        first.unsubscribe();
        first.unsubscribe();
        assert_eq!(store.subscriber_count(Collection::Expenses), 1);

        store
            .add_expense(expense(1.0, Category::Food, "2024-01-01"))
            .unwrap();

        assert_eq!(first_seen.lock().unwrap().len(), 1);
        assert_eq!(second_seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let (_storage, store) = memory_store();
        {
            let (_seen, _sub) = record_expenses(&store);
            assert_eq!(store.subscriber_count(Collection::Expenses), 1);
        }
        assert_eq!(store.subscriber_count(Collection::Expenses), 0);
    }

    #[test]
    fn test_callback_may_unsubscribe_itself() {
        let (_storage, store) = memory_store();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(Mutex::new(0));

        let (slot_cb, calls_cb) = (slot.clone(), calls.clone());
        let sub = store.subscribe_expenses(move |_| {
            *calls_cb.lock().unwrap() += 1;
            if let Some(sub) = slot_cb.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);

        store
            .add_expense(expense(1.0, Category::Food, "2024-01-01"))
            .unwrap();
        store
            .add_expense(expense(2.0, Category::Food, "2024-01-02"))
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_subscriptions_are_per_collection() {
        let (_storage, store) = memory_store();
        let budget_calls = Arc::new(Mutex::new(0));
        let counter = budget_calls.clone();
        let _sub = store.subscribe_budgets(move |_| *counter.lock().unwrap() += 1);

        store
            .add_expense(expense(1.0, Category::Food, "2024-01-01"))
            .unwrap();
        assert_eq!(*budget_calls.lock().unwrap(), 1);
    }

    // ========== Failure handling ==========

    #[test]
    fn test_corrupt_expenses_deliver_empty_snapshot_and_block_writes() {
        let (storage, store) = memory_store();
        storage.set("expenses", "{not json").unwrap();

        let (seen, _sub) = record_expenses(&store);
        assert_eq!(seen.lock().unwrap()[0], Vec::<Expense>::new());

        let err = store
            .add_expense(expense(1.0, Category::Food, "2024-01-01"))
            .unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(storage.get("expenses").unwrap().as_deref(), Some("{not json"));
    }

    #[test]
    fn test_corrupt_budgets_deliver_defaults_without_overwriting() {
        let (storage, store) = memory_store();
        storage.set("budgets", "oops").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = store.subscribe_budgets(move |list| sink.lock().unwrap().push(list.to_vec()));

        assert_one_per_category(&seen.lock().unwrap()[0]);
        assert_eq!(storage.get("budgets").unwrap().as_deref(), Some("oops"));
    }

    // ========== Change channel / external sync ==========

    #[test]
    fn test_mutations_are_published_on_channel() {
        let (_storage, store) = memory_store();
        let mut rx = store.channel().listen();

        let e = expense(1.0, Category::Food, "2024-01-01");
        store.add_expense(e.clone()).unwrap();
        store.delete_expense(&e.id).unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            ChangeEvent::local(Collection::Expenses, Mutation::ExpenseAdded)
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            ChangeEvent::local(Collection::Expenses, Mutation::ExpenseDeleted)
        );
    }

    #[test]
    fn test_reconciliation_is_published() {
        let (_storage, store) = memory_store();
        let mut rx = store.channel().listen();
        store.load_budgets().unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            ChangeEvent::local(Collection::Budgets, Mutation::BudgetsReconciled)
        );
        // Second read finds nothing to repair
        store.load_budgets().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_sync_external_refreshes_subscribers() {
        let (storage, store) = memory_store();
        let (seen, _sub) = record_expenses(&store);
        let mut rx = store.channel().listen();

        let other = expense(75.0, Category::Shopping, "2024-05-05");
        storage
            .external_set("expenses", &serde_json::to_string(&vec![other.clone()]).unwrap())
            .unwrap();
        storage.external_set("unrelated", "1").unwrap();

        assert_eq!(store.sync_external().unwrap(), vec![Collection::Expenses]);
        assert_eq!(seen.lock().unwrap().last().unwrap(), &vec![other]);
        assert_eq!(rx.try_recv().unwrap().reason, ChangeReason::External);

        // Nothing new the second time
        assert!(store.sync_external().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_task_picks_up_external_writes() {
        let storage = Arc::new(MemoryStorage::new());
        let store = Arc::new(Store::new(storage.clone()));
        let mut rx = store.channel().listen();

        let handle = spawn_sync_task(store.clone(), Duration::from_millis(10));
        storage.external_set("budgets", "[]").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("sync task should publish")
            .unwrap();
        assert_eq!(event, ChangeEvent::external(Collection::Budgets));
        handle.abort();
    }
}
