//! The interceptor contract and the request chain engine that drives every
//! GraphQL operation through an ordered pipeline of interceptors.

mod chain;
pub mod standard;

pub use chain::{Cancellable, ChainState, RequestChain, RequestChainHandle, ResultStream};

use async_trait::async_trait;

use crate::error::ChainError;
use crate::http::{HttpRequest, HttpResponse};

/// A single stage in the request pipeline.
///
/// Implementations do exactly one of: forward (`chain.proceed`), short-circuit
/// with success (`chain.complete(Ok(..))`), fail (`chain.fail(..)`), or retry
/// (`chain.retry(..)`) — see [`RequestChainHandle`] for the primitives.
/// Multipart interceptors are the one exception allowed to call `proceed`
/// more than once per entry, once per received chunk.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Processes `request`/`response` and drives the chain forward via
    /// `chain`.
    async fn intercept(
        &self,
        chain: &RequestChainHandle,
        request: HttpRequest,
        response: Option<HttpResponse>,
    );

    /// A short, stable name used in tracing spans and error messages.
    fn name(&self) -> &'static str;

    /// Returns this interceptor as a [`CancelCapable`], if it implements
    /// that optional capability. Default: does not participate in
    /// cancellation notification.
    fn as_cancellable(&self) -> Option<&dyn CancelCapable> {
        None
    }
}

/// Optional capability an [`Interceptor`] may implement to be notified when
/// the caller cancels the chain.
#[async_trait]
pub trait CancelCapable: Send + Sync {
    /// Called once, in reverse declaration order among cancellable
    /// interceptors, when [`Cancellable::cancel`] is invoked.
    async fn on_cancel(&self);
}

/// An additional interceptor that gets a chance to handle (e.g. retry,
/// downgrade, or rewrite) any error before it reaches the caller, attached
/// to a chain at construction time.
#[async_trait]
pub trait ErrorInterceptor: Send + Sync {
    /// Handles an error that occurred at `request`/`response`, driving the
    /// chain forward (e.g. via `chain.retry`) or terminating it (via
    /// `chain.complete`).
    async fn handle_error(
        &self,
        chain: &RequestChainHandle,
        error: ChainError,
        request: HttpRequest,
        response: Option<HttpResponse>,
    );
}
