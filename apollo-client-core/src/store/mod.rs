//! The normalized, content-addressed response cache.

pub mod subscriber;

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::cache_key::CacheKey;
use crate::data_dict::{Record, RecordSet};
use crate::error::ChainError;
use crate::operation::ExecutableSelectionSet;
use serde_json::Value as Json;
use subscriber::{StoreSubscriber, SubscriberRegistry, SubscriptionToken};

/// Owns a [`RecordSet`] and a weak list of subscribers; publishes are
/// serialized through an internal [`tokio::sync::Mutex`] so readers always
/// see a point-in-time-consistent snapshot for the duration of a single load
/// or transaction.
#[derive(Default)]
pub struct ApolloStore {
    records: AsyncMutex<RecordSet>,
    subscribers: SubscriberRegistry,
}

impl ApolloStore {
    /// Builds an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the subset of `keys` present in the store; missing keys are
    /// simply omitted from the result.
    pub async fn load_record(&self, keys: &[CacheKey]) -> RecordSet {
        let records = self.records.lock().await;
        let mut out = RecordSet::new();
        for key in keys {
            if let Some(record) = records.get(key) {
                out.insert(key.clone(), record.clone());
            }
        }
        out
    }

    /// Reads the full record set as it stands right now. Intended for
    /// selection-set execution, which needs to follow references
    /// transitively without knowing the full key set up front.
    pub async fn snapshot(&self) -> RecordSet {
        self.records.lock().await.clone()
    }

    /// Merges each field of each incoming record into the existing store
    /// (last-write-wins at field granularity), then notifies every live
    /// subscriber, in publish order, with the set of [`CacheKey`]s whose
    /// serialized content changed.
    ///
    /// Publishes are serialized by the internal lock; notification happens
    /// after the lock is released so a slow subscriber cannot block a
    /// concurrent publish.
    pub async fn publish(
        &self,
        incoming: RecordSet,
        context_identifier: Option<Uuid>,
    ) -> BTreeSet<CacheKey> {
        let changed = {
            let mut records = self.records.lock().await;
            merge_records(&mut records, incoming)
        };
        self.notify(&changed, context_identifier).await;
        changed
    }

    /// Removes every record, then notifies subscribers as if every
    /// previously-present key changed — `clear` is itself a `publish`
    /// with an empty new record set.
    pub async fn clear(&self) {
        let previously_present = {
            let mut records = self.records.lock().await;
            let keys: BTreeSet<CacheKey> = records.keys().cloned().collect();
            records.clear();
            keys
        };
        self.notify(&previously_present, None).await;
    }

    /// Grants transactional, mutable access to the full record set; every
    /// write made inside `body` publishes atomically once `body` returns.
    pub async fn within_read_write_transaction<T>(
        &self,
        body: impl FnOnce(&mut RecordSet) -> T,
    ) -> T {
        let (result, changed) = {
            let mut records = self.records.lock().await;
            let before = records.clone();
            let result = body(&mut records);
            let changed = diff_record_sets(&before, &records);
            (result, changed)
        };
        self.notify(&changed, None).await;
        result
    }

    /// Registers a weak subscription; the subscriber is dropped from the
    /// registry automatically once its last strong reference goes away.
    pub fn subscribe(&self, subscriber: &Arc<dyn StoreSubscriber>) -> SubscriptionToken {
        self.subscribers.subscribe(subscriber)
    }

    /// Removes a previously-registered subscription.
    pub fn unsubscribe(&self, token: SubscriptionToken) {
        self.subscribers.unsubscribe(token);
    }

    /// Executes `selection_set` rooted at `root_key` against a point-in-time
    /// snapshot of this store, returning the denormalized payload and the
    /// dependent keys touched, or `cacheMiss(path)` if a required field is
    /// absent.
    pub async fn execute(
        &self,
        root_key: &CacheKey,
        selection_set: &dyn ExecutableSelectionSet,
    ) -> Result<(Json, BTreeSet<CacheKey>), ChainError> {
        let snapshot = self.snapshot().await;
        selection_set.execute(root_key, &snapshot)
    }

    async fn notify(&self, changed: &BTreeSet<CacheKey>, context_identifier: Option<Uuid>) {
        if changed.is_empty() {
            return;
        }
        for subscriber in self.subscribers.live_subscribers() {
            subscriber
                .store_did_change(self, changed, context_identifier)
                .await;
        }
    }
}

/// Merges `incoming` into `records` field-by-field (last write wins),
/// returning the set of keys whose serialized content changed.
fn merge_records(records: &mut RecordSet, incoming: RecordSet) -> BTreeSet<CacheKey> {
    let mut changed = BTreeSet::new();
    for (key, incoming_record) in incoming {
        let existing = records.entry(key.clone()).or_default();
        let before = existing.clone();
        merge_record(existing, incoming_record);
        if *existing != before {
            changed.insert(key);
        }
    }
    changed
}

fn merge_record(existing: &mut Record, incoming: Record) {
    for (field, value) in incoming {
        existing.insert(field, value);
    }
}

fn diff_record_sets(before: &RecordSet, after: &RecordSet) -> BTreeSet<CacheKey> {
    let mut changed = BTreeSet::new();
    for (key, after_record) in after {
        match before.get(key) {
            Some(before_record) if before_record == after_record => {}
            _ => {
                changed.insert(key.clone());
            }
        }
    }
    for key in before.keys() {
        if !after.contains_key(key) {
            changed.insert(key.clone());
        }
    }
    changed
}
