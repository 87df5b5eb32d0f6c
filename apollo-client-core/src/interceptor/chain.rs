//! The request chain engine: drives an ordered pipeline of
//! [`Interceptor`]s to completion, one [`HttpRequest`]/[`HttpResponse`] pair
//! at a time, honoring forward/complete/fail/retry and cooperative
//! cancellation.

use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::{ErrorInterceptor, Interceptor};
use crate::error::ChainError;
use crate::http::{GraphQLResult, HttpRequest, HttpResponse};

/// The lifecycle of a [`RequestChain`]. Once `Completed` or `Cancelled`, a
/// chain never delivers another result and every further `proceed`/
/// `complete`/`fail`/`retry` call is a silent no-op.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChainState {
    /// `kickoff` has not yet been called.
    NotStarted,
    /// At least one interceptor is running or awaiting a downstream result.
    InProgress,
    /// The chain ran to its natural end (the last interceptor forwarded past
    /// the end of the pipeline, or something called `complete`/`fail`
    /// without a further retry).
    Completed,
    /// [`Cancellable::cancel`] was called.
    Cancelled,
}

/// Drains the results a [`RequestChain`] delivers. A query or mutation
/// delivers exactly one item before the channel closes; a subscription or a
/// multipart response may deliver several.
pub struct ResultStream {
    receiver: UnboundedReceiver<Result<GraphQLResult, ChainError>>,
}

impl ResultStream {
    /// Waits for the next delivered result, or `None` once the chain has
    /// finished delivering and every sender has been dropped.
    pub async fn next(&mut self) -> Option<Result<GraphQLResult, ChainError>> {
        self.receiver.recv().await
    }
}

impl Stream for ResultStream {
    type Item = Result<GraphQLResult, ChainError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// The ordered interceptor pipeline for a single GraphQL operation.
///
/// Construct with [`RequestChain::new`], start it with
/// [`RequestChain::kickoff`], and drain its [`ResultStream`] for results.
pub struct RequestChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
    error_interceptor: Option<Arc<dyn ErrorInterceptor>>,
    state: Mutex<ChainState>,
    retry_count: AtomicU32,
    max_retries: Option<u32>,
    results_tx: UnboundedSender<Result<GraphQLResult, ChainError>>,
}

impl RequestChain {
    /// Builds a chain over `interceptors`, run in declaration order.
    ///
    /// `error_interceptor`, if given, gets first refusal on every error
    /// raised via [`RequestChainHandle::fail`] before it reaches the caller.
    /// `max_retries` caps how many times [`RequestChainHandle::retry`] may
    /// restart the pipeline before the chain fails with
    /// [`ChainError::TooManyRetries`]; `None` means unbounded.
    pub fn new(
        interceptors: Vec<Arc<dyn Interceptor>>,
        error_interceptor: Option<Arc<dyn ErrorInterceptor>>,
        max_retries: Option<u32>,
    ) -> (Arc<Self>, ResultStream) {
        let (results_tx, receiver) = mpsc::unbounded_channel();
        let chain = Arc::new(Self {
            interceptors,
            error_interceptor,
            state: Mutex::new(ChainState::NotStarted),
            retry_count: AtomicU32::new(0),
            max_retries,
            results_tx,
        });
        (chain, ResultStream { receiver })
    }

    /// The chain's current lifecycle state.
    pub fn state(&self) -> ChainState {
        *self.state.lock().expect("chain state mutex poisoned")
    }

    /// Starts the pipeline running with `request`, spawning the drive loop
    /// onto the current tokio runtime so the caller is free to drop its
    /// stack frame; the chain keeps itself alive via the task's own `Arc`
    /// until it finishes, independent of whether the caller keeps the
    /// returned [`Cancellable`] around.
    pub fn kickoff(self: &Arc<Self>, request: HttpRequest) -> Cancellable {
        {
            let mut state = self.state.lock().expect("chain state mutex poisoned");
            *state = ChainState::InProgress;
        }
        let inner = self.clone();
        tokio::spawn(async move {
            if inner.interceptors.is_empty() {
                inner.complete(Err(ChainError::NoInterceptors)).await;
            } else {
                let handle = RequestChainHandle {
                    inner: inner.clone(),
                    entry_index: 0,
                };
                let first = inner.interceptors[0].clone();
                first.intercept(&handle, request, None).await;
            }
            let mut state = inner.state.lock().expect("chain state mutex poisoned");
            if *state == ChainState::InProgress {
                *state = ChainState::Completed;
            }
        });
        Cancellable { inner: self.clone() }
    }

    fn is_terminal(&self) -> bool {
        matches!(
            *self.state.lock().expect("chain state mutex poisoned"),
            ChainState::Completed | ChainState::Cancelled
        )
    }

    async fn advance_and_dispatch(
        self: &Arc<Self>,
        entry_index: usize,
        request: HttpRequest,
        response: Option<HttpResponse>,
    ) {
        if self.is_terminal() {
            return;
        }
        let next_index = entry_index + 1;
        if next_index >= self.interceptors.len() {
            match response.and_then(|response| response.parsed_result) {
                Some(result) => self.complete(Ok(result)).await,
                None => self.complete(Err(ChainError::NoParsedResponse)).await,
            }
            return;
        }
        let interceptor = self.interceptors[next_index].clone();
        let handle = RequestChainHandle {
            inner: self.clone(),
            entry_index: next_index,
        };
        interceptor.intercept(&handle, request, response).await;
    }

    async fn complete(self: &Arc<Self>, result: Result<GraphQLResult, ChainError>) {
        if self.is_terminal() {
            return;
        }
        // The receiver may already be gone (caller dropped its ResultStream);
        // that is not this chain's problem to report.
        let _ = self.results_tx.send(result);
    }

    async fn fail(
        self: &Arc<Self>,
        error: ChainError,
        entry_index: usize,
        request: HttpRequest,
        response: Option<HttpResponse>,
    ) {
        if self.is_terminal() {
            return;
        }
        match &self.error_interceptor {
            Some(error_interceptor) => {
                let handle = RequestChainHandle {
                    inner: self.clone(),
                    entry_index,
                };
                error_interceptor
                    .handle_error(&handle, error, request, response)
                    .await;
            }
            None => self.complete(Err(error)).await,
        }
    }

    async fn retry(self: &Arc<Self>, request: HttpRequest) {
        if self.is_terminal() {
            return;
        }
        let attempt = self.retry_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(max) = self.max_retries {
            if attempt > max {
                self.complete(Err(ChainError::TooManyRetries { max })).await;
                return;
            }
        }
        if self.interceptors.is_empty() {
            self.complete(Err(ChainError::NoInterceptors)).await;
            return;
        }
        let handle = RequestChainHandle {
            inner: self.clone(),
            entry_index: 0,
        };
        let first = self.interceptors[0].clone();
        first.intercept(&handle, request, None).await;
    }
}

/// Passed to [`Interceptor::intercept`], tied to the position its holder
/// occupies in the pipeline, exposing the four moves an interceptor may
/// make: forward, complete, fail, or retry.
pub struct RequestChainHandle {
    inner: Arc<RequestChain>,
    entry_index: usize,
}

impl RequestChainHandle {
    /// Forwards to the next interceptor in the pipeline (or, if this is the
    /// last one, completes the chain from `response.parsed_result`). A
    /// multipart-aware interceptor is the one case allowed to call this
    /// more than once per `intercept` invocation, once per chunk.
    pub async fn proceed(&self, request: HttpRequest, response: Option<HttpResponse>) {
        self.inner
            .advance_and_dispatch(self.entry_index, request, response)
            .await;
    }

    /// Short-circuits the chain with a final result, bypassing every
    /// remaining interceptor. Safe to call more than once on a subscription
    /// or multipart chain; each call delivers one more item to the
    /// [`ResultStream`].
    pub async fn complete(&self, result: Result<GraphQLResult, ChainError>) {
        self.inner.complete(result).await;
    }

    /// Routes `error` to the chain's error interceptor, if one is attached,
    /// otherwise completes the chain with it.
    pub async fn fail(&self, error: ChainError, request: HttpRequest, response: Option<HttpResponse>) {
        self.inner
            .fail(error, self.entry_index, request, response)
            .await;
    }

    /// Restarts the pipeline from the first interceptor with `request`,
    /// counting against the chain's retry budget.
    pub async fn retry(&self, request: HttpRequest) {
        self.inner.retry(request).await;
    }

    /// Whether the chain has already reached a terminal state; an
    /// interceptor mid-flight (e.g. awaiting a slow network call) can use
    /// this to skip unnecessary work once the caller has cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.state() == ChainState::Cancelled
    }
}

/// The caller-held handle to a running [`RequestChain`]. Holding this keeps
/// the chain alive only incidentally — the chain's own drive task keeps
/// itself alive independently — but it is the only way to request
/// cancellation.
#[derive(Clone)]
pub struct Cancellable {
    inner: Arc<RequestChain>,
}

impl Cancellable {
    /// The chain's current lifecycle state.
    pub fn state(&self) -> ChainState {
        self.inner.state()
    }

    /// Requests cancellation. A no-op if the chain has already reached a
    /// terminal state. Notifies every [`super::CancelCapable`] interceptor,
    /// in reverse declaration order, on a spawned task so this method never
    /// blocks the caller (and so it is safe to call from inside an
    /// interceptor's own `intercept`).
    pub fn cancel(&self) {
        let was_running = {
            let mut state = self
                .inner
                .state
                .lock()
                .expect("chain state mutex poisoned");
            if matches!(*state, ChainState::Cancelled | ChainState::Completed) {
                false
            } else {
                *state = ChainState::Cancelled;
                true
            }
        };
        if !was_running {
            return;
        }
        let inner = self.inner.clone();
        tokio::spawn(async move {
            for interceptor in inner.interceptors.iter().rev() {
                if let Some(cancellable) = interceptor.as_cancellable() {
                    cancellable.on_cancel().await;
                }
            }
        });
    }
}
