//! Bridges an operation's result to the [store](crate::store)'s subscription
//! mechanism, re-running the operation whenever a key it depends on changes.

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::cache_key::CacheKey;
use crate::error::ChainError;
use crate::http::{CachePolicy, GraphQLResult};
use crate::interceptor::{Cancellable, ResultStream};
use crate::operation::GraphQLOperation;
use crate::store::subscriber::{StoreSubscriber, SubscriptionToken};
use crate::store::ApolloStore;

/// Resubmits `operation` against whatever client owns it, tagging the new
/// request with `context_identifier` so the watcher can recognize — and
/// ignore — the store notification its own write produces.
///
/// Kept abstract over a concrete [`crate::transport::ApolloClient`] so a
/// watcher can be unit-tested against a fake resubmitter.
pub trait Resubmitter<Op: GraphQLOperation>: Send + Sync {
    /// Resubmits `operation` with `cache_policy`, tagged with
    /// `context_identifier`.
    fn resubmit(
        &self,
        operation: &Op,
        cache_policy: CachePolicy,
        context_identifier: Uuid,
    ) -> (Cancellable, ResultStream);
}

impl<Op, F> Resubmitter<Op> for F
where
    Op: GraphQLOperation,
    F: Fn(&Op, CachePolicy, Uuid) -> (Cancellable, ResultStream) + Send + Sync,
{
    fn resubmit(
        &self,
        operation: &Op,
        cache_policy: CachePolicy,
        context_identifier: Uuid,
    ) -> (Cancellable, ResultStream) {
        self(operation, cache_policy, context_identifier)
    }
}

/// Delivers each result a watched operation produces, initial fetch and every
/// re-fetch alike.
pub trait ResultHandler: Send + Sync {
    /// Called once per delivered result, in delivery order.
    fn handle(&self, result: Result<GraphQLResult, ChainError>);
}

impl<F> ResultHandler for F
where
    F: Fn(Result<GraphQLResult, ChainError>) + Send + Sync,
{
    fn handle(&self, result: Result<GraphQLResult, ChainError>) {
        self(result)
    }
}

struct WatcherState {
    token: Option<SubscriptionToken>,
    last_dependent_keys: BTreeSet<CacheKey>,
    own_context_identifier: Option<Uuid>,
    in_flight: Option<Cancellable>,
    refetch_policy: CachePolicy,
    /// Guards `max_concurrent_refetches = 1`: a second store notification
    /// that arrives while a refetch chain is already in flight is coalesced
    /// into `pending_refetch` rather than starting a second chain.
    refetch_in_flight: bool,
    pending_refetch: bool,
    cancelled: bool,
}

impl Default for WatcherState {
    fn default() -> Self {
        Self {
            token: None,
            last_dependent_keys: BTreeSet::new(),
            own_context_identifier: None,
            in_flight: None,
            refetch_policy: CachePolicy::ReturnCacheDataElseFetch,
            refetch_in_flight: false,
            pending_refetch: false,
            cancelled: false,
        }
    }
}

/// Wraps one [`GraphQLOperation`] and a [`ResultHandler`], resubmitting the
/// operation whenever the store publishes a change to a key the last result
/// depended on.
///
/// A store notification whose `contextIdentifier` matches a
/// write this watcher itself initiated is ignored; otherwise, if the changed
/// keys intersect the last delivered result's dependent keys, the operation
/// is resubmitted with `refetch_policy` (default
/// `ReturnCacheDataElseFetch`) and the new result is delivered to the
/// handler. At most one refetch chain runs at a time per watcher; a store
/// notification that arrives mid-refetch is coalesced into a single trailing
/// refetch rather than firing a second chain.
pub struct QueryWatcher<Op: GraphQLOperation> {
    store: Arc<ApolloStore>,
    operation: Op,
    resubmitter: Arc<dyn Resubmitter<Op>>,
    handler: Arc<dyn ResultHandler>,
    state: AsyncMutex<WatcherState>,
    self_handle: Weak<Self>,
}

impl<Op: GraphQLOperation + 'static> QueryWatcher<Op> {
    /// Builds a watcher over `operation`, delivering results to `handler` by
    /// resubmitting through `resubmitter`. Re-fetches default to
    /// [`CachePolicy::ReturnCacheDataElseFetch`];
    /// override with [`QueryWatcher::set_refetch_policy`].
    pub fn new(
        store: Arc<ApolloStore>,
        operation: Op,
        resubmitter: impl Resubmitter<Op> + 'static,
        handler: impl ResultHandler + 'static,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            store,
            operation,
            resubmitter: Arc::new(resubmitter),
            handler: Arc::new(handler),
            state: AsyncMutex::new(WatcherState::default()),
            self_handle: weak.clone(),
        })
    }

    /// Overrides the cache policy used for re-fetches triggered by a store
    /// change. Has no effect on an already-in-flight fetch.
    pub async fn set_refetch_policy(&self, refetch_policy: CachePolicy) {
        self.state.lock().await.refetch_policy = refetch_policy;
    }

    /// Performs the initial fetch with `initial_policy` and subscribes to the
    /// store so subsequent changes trigger re-fetches.
    pub async fn start(self: &Arc<Self>, initial_policy: CachePolicy) {
        let subscriber: Arc<dyn StoreSubscriber> = self.clone();
        let token = self.store.subscribe(&subscriber);
        {
            let mut state = self.state.lock().await;
            state.token = Some(token);
        }
        self.fetch(initial_policy).await;
    }

    /// Detaches the store subscription, cancels any in-flight chain, and
    /// releases the handler so the watcher can be dropped.
    pub async fn cancel(self: &Arc<Self>) {
        let (token, in_flight) = {
            let mut state = self.state.lock().await;
            state.cancelled = true;
            (state.token.take(), state.in_flight.take())
        };
        if let Some(token) = token {
            self.store.unsubscribe(token);
        }
        if let Some(chain) = in_flight {
            chain.cancel();
        }
    }

    async fn fetch(self: &Arc<Self>, cache_policy: CachePolicy) {
        let context_identifier = Uuid::new_v4();
        {
            let mut state = self.state.lock().await;
            if state.cancelled {
                return;
            }
            state.own_context_identifier = Some(context_identifier);
        }
        let (handle, mut results) =
            self.resubmitter
                .resubmit(&self.operation, cache_policy, context_identifier);
        {
            let mut state = self.state.lock().await;
            state.in_flight = Some(handle);
        }
        // A watched operation is a query or mutation: exactly one result per
        // (re)fetch. The handle is dropped as soon as that result lands so
        // the chain's resources collapse rather than being retained for the
        // watcher's lifetime.
        if let Some(result) = results.next().await {
            {
                let mut state = self.state.lock().await;
                if state.cancelled {
                    return;
                }
                if let Ok(ref graphql_result) = result {
                    state.last_dependent_keys = graphql_result.dependent_keys.clone();
                }
                state.in_flight = None;
            }
            self.handler.handle(result);
        }
        let should_refetch = {
            let mut state = self.state.lock().await;
            if state.pending_refetch {
                state.pending_refetch = false;
                true
            } else {
                state.refetch_in_flight = false;
                false
            }
        };
        if should_refetch {
            let policy = self.state.lock().await.refetch_policy;
            self.fetch(policy).await;
        }
    }

    /// Runs on the store's own dispatch after a matching change; kicks off a
    /// refetch, or — if one is already running — marks a trailing refetch as
    /// pending so overlapping triggers coalesce into one extra fetch.
    async fn trigger_refetch(self: &Arc<Self>) {
        let (should_fetch, policy) = {
            let mut state = self.state.lock().await;
            if state.cancelled {
                return;
            }
            if state.refetch_in_flight {
                state.pending_refetch = true;
                (false, state.refetch_policy)
            } else {
                state.refetch_in_flight = true;
                (true, state.refetch_policy)
            }
        };
        if should_fetch {
            self.fetch(policy).await;
        }
    }
}

#[async_trait]
impl<Op: GraphQLOperation + 'static> StoreSubscriber for QueryWatcher<Op> {
    async fn store_did_change(
        &self,
        _store: &ApolloStore,
        changed_keys: &BTreeSet<CacheKey>,
        context_identifier: Option<Uuid>,
    ) {
        let Some(this) = self.self_handle.upgrade() else {
            return;
        };
        let (is_self_write, overlaps) = {
            let state = self.state.lock().await;
            if state.cancelled {
                return;
            }
            let is_self_write = context_identifier.is_some()
                && context_identifier == state.own_context_identifier;
            let overlaps = changed_keys
                .iter()
                .any(|key| state.last_dependent_keys.contains(key));
            (is_self_write, overlaps)
        };
        if is_self_write || !overlaps {
            return;
        }
        // The store already dispatches to each subscriber on its own task,
        // sequentially in publish order; running the refetch directly here
        // (rather than spawning another task) keeps that ordering intact
        // without blocking other subscribers, since `notify` already awaits
        // each `store_did_change` independently of the publishing caller.
        this.trigger_refetch().await;
    }
}
