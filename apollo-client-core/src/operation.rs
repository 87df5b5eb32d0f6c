//! The operation contract consumed by the request chain and store.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as Json;

use crate::cache_key::CacheKey;
use crate::data_dict::RecordSet;
use crate::error::ChainError;
use crate::http::OperationKind;

/// How the generated operation document should be rendered for transmission.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OperationDocumentFormat {
    /// Send the full GraphQL document text.
    Document,
    /// Send only a persisted-query identifier; no document text is sent.
    OperationId,
}

/// A selection set that can be executed against a [`RecordSet`] to produce a
/// denormalized payload, tracking every [`CacheKey`] it touches.
///
/// This is the execution contract for selection-set execution: given a
/// root key and a record set, resolve each selected field, following
/// [`crate::data_dict::ScalarOrReference::Reference`]s recursively.
pub trait ExecutableSelectionSet: Send + Sync {
    /// Executes this selection set starting at `root_key` against `records`.
    ///
    /// Returns the denormalized JSON payload plus the set of every
    /// [`CacheKey`] that was read while producing it. Fails with
    /// [`ChainError::CacheMiss`] carrying a dotted field path if a required
    /// field (or the root itself) is absent from `records`.
    fn execute(
        &self,
        root_key: &CacheKey,
        records: &RecordSet,
    ) -> Result<(Json, BTreeSet<CacheKey>), ChainError>;
}

/// Turns a server-shaped response payload into normalized [`RecordSet`]
/// entries, assigning each object a [`CacheKey`] per the generating
/// operation's schema policy (typically `{__typename}:{id}`).
///
/// Implemented by generated code alongside [`ExecutableSelectionSet`]; kept
/// as a separate object-safe trait so [`crate::interceptor::standard::CacheWriteInterceptor`]
/// can be constructed without knowing the concrete operation type.
pub trait Normalizer: Send + Sync {
    /// Normalizes `data` (the root-level response payload) into a
    /// [`RecordSet`] rooted at `root_key`.
    fn normalize(&self, root_key: &CacheKey, data: &Json) -> RecordSet;
}

/// A polymorphic GraphQL operation: a query, mutation, or subscription,
/// together with its variables and root selection set.
pub trait GraphQLOperation: Send + Sync {
    /// The serializable shape of this operation's variables.
    type Variables: Serialize + Send + Sync;

    /// The operation's name, as it appears in the document.
    fn operation_name(&self) -> &str;

    /// Whether this is a query, mutation, or subscription.
    fn operation_kind(&self) -> OperationKind;

    /// Renders the operation document in the requested format.
    fn operation_document(&self, format: OperationDocumentFormat) -> Cow<'_, str>;

    /// The operation's variables.
    fn variables(&self) -> &Self::Variables;

    /// The cache key of this operation's root record (e.g.
    /// [`CacheKey::QUERY_ROOT`]).
    fn root_cache_key(&self) -> CacheKey;

    /// The compiled selection set rooted at [`GraphQLOperation::root_cache_key`].
    ///
    /// Returned as an owned `Arc` (rather than borrowed from `&self`) so a
    /// [`crate::interceptor::standard::CacheReadInterceptor`] can outlive the
    /// borrow used to build it.
    fn root_selection_set(&self) -> Arc<dyn ExecutableSelectionSet>;

    /// The normalizer that turns this operation's response payload into
    /// [`RecordSet`] entries for [`crate::interceptor::standard::CacheWriteInterceptor`].
    fn normalizer(&self) -> Arc<dyn Normalizer>;
}

/// Marker trait for operations that advertise multipart acceptance, i.e.
/// subscriptions.
pub trait SubscriptionOperation: GraphQLOperation {}
