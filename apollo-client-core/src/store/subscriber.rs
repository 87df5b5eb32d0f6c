//! Weakly-held store subscriber registry.
//!
//! Subscribers are held as [`Weak`] references: a subscriber's lifetime is
//! never entangled with the store's, and a dropped subscriber is compacted
//! out on the next publish rather than kept alive artificially.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use uuid::Uuid;

use crate::cache_key::CacheKey;
use crate::store::ApolloStore;

/// Receives notification whenever [`ApolloStore::publish`] changes at least
/// one [`CacheKey`].
#[async_trait]
pub trait StoreSubscriber: Send + Sync {
    /// Called once per publish, in publish order, for every subscriber alive
    /// at publish time.
    async fn store_did_change(
        &self,
        store: &ApolloStore,
        changed_keys: &BTreeSet<CacheKey>,
        context_identifier: Option<Uuid>,
    );
}

/// Opaque handle returned by [`SubscriberRegistry::subscribe`], used to
/// [`SubscriberRegistry::unsubscribe`] later: a monotonically assigned id
/// rather than pointer identity, in place of a type-erased object identity
/// comparison.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SubscriptionToken(u64);

#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    next_token: AtomicU64,
    entries: std::sync::Mutex<Vec<(SubscriptionToken, Weak<dyn StoreSubscriber>)>>,
}

impl SubscriberRegistry {
    pub(crate) fn subscribe(&self, subscriber: &Arc<dyn StoreSubscriber>) -> SubscriptionToken {
        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.entries
            .lock()
            .expect("subscriber registry mutex poisoned")
            .push((token, Arc::downgrade(subscriber)));
        token
    }

    pub(crate) fn unsubscribe(&self, token: SubscriptionToken) {
        self.entries
            .lock()
            .expect("subscriber registry mutex poisoned")
            .retain(|(t, _)| *t != token);
    }

    /// Returns the subscribers alive *right now*, compacting out any that
    /// have been dropped. Never promotes a `Weak` to `Arc` except to hand
    /// back a live snapshot for the caller to notify sequentially — the
    /// registry itself never keeps the strong reference around.
    pub(crate) fn live_subscribers(&self) -> Vec<Arc<dyn StoreSubscriber>> {
        let mut entries = self.entries.lock().expect("subscriber registry mutex poisoned");
        let mut live = Vec::with_capacity(entries.len());
        entries.retain(|(_, weak)| match weak.upgrade() {
            Some(strong) => {
                live.push(strong);
                true
            }
            None => false,
        });
        live
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().expect("subscriber registry mutex poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl StoreSubscriber for Noop {
        async fn store_did_change(
            &self,
            _store: &ApolloStore,
            _changed_keys: &BTreeSet<CacheKey>,
            _context_identifier: Option<Uuid>,
        ) {
        }
    }

    #[test]
    fn unsubscribe_removes_entry() {
        let registry = SubscriberRegistry::default();
        let subscriber: Arc<dyn StoreSubscriber> = Arc::new(Noop);
        let token = registry.subscribe(&subscriber);
        assert_eq!(registry.len(), 1);
        registry.unsubscribe(token);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn dropped_subscriber_is_compacted_on_next_read() {
        let registry = SubscriberRegistry::default();
        {
            let subscriber: Arc<dyn StoreSubscriber> = Arc::new(Noop);
            registry.subscribe(&subscriber);
        }
        assert_eq!(registry.live_subscribers().len(), 0);
        assert_eq!(registry.len(), 0);
    }
}
