//! The typed request/response model that flows through the
//! [interceptor chain](crate::interceptor).

use std::collections::BTreeSet;

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use uuid::Uuid;

use crate::cache_key::CacheKey;

/// The three capability kinds a [`crate::operation::GraphQLOperation`] may
/// advertise.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OperationKind {
    /// A read-only query.
    Query,
    /// A mutating operation.
    Mutation,
    /// A long-lived, potentially multipart, subscription.
    Subscription,
}

/// Controls how a request consults and updates the normalized store.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CachePolicy {
    /// Serve from the cache only; fail with `cacheMiss` if incomplete.
    ReturnCacheDataDontFetch,
    /// Serve from the cache if complete, otherwise fetch from the network.
    ReturnCacheDataElseFetch,
    /// Serve from the cache immediately (if complete) *and* always also
    /// fetch a fresh copy from the network.
    ReturnCacheDataAndFetch,
    /// Always fetch, but still populate the cache afterwards.
    FetchIgnoringCacheData,
    /// Always fetch, and do not even read from the cache to short-circuit.
    FetchIgnoringCacheCompletely,
}

impl CachePolicy {
    /// Whether this policy consults the cache before deciding whether to hit
    /// the network.
    pub fn consults_cache(&self) -> bool {
        matches!(
            self,
            Self::ReturnCacheDataDontFetch
                | Self::ReturnCacheDataElseFetch
                | Self::ReturnCacheDataAndFetch
        )
    }
}

/// A single GraphQL-shaped error entry, as carried in a response envelope's
/// `errors` array.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GraphQLError {
    /// The human-readable error message.
    pub message: String,
    /// The field path the error occurred at, if reported by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Json>>,
    /// Server-defined extension data attached to the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Json>,
}

impl GraphQLError {
    /// Builds a bare error with only a message, as used throughout the test
    /// suite.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            extensions: None,
        }
    }
}

impl PartialEq<&str> for GraphQLError {
    fn eq(&self, other: &&str) -> bool {
        self.message == *other
    }
}

/// Where a [`GraphQLResult`] was produced.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResultSource {
    /// Served entirely from the normalized store.
    Cache,
    /// Produced by parsing a network response.
    Server,
}

/// The outcome of executing one GraphQL operation, whether served from cache
/// or network.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphQLResult {
    /// The (possibly partial) data payload.
    pub data: Option<Json>,
    /// Any GraphQL-level errors carried alongside `data`.
    pub errors: Vec<GraphQLError>,
    /// Server-reported extension data.
    pub extensions: Option<Json>,
    /// Where this result came from.
    pub source: Option<ResultSource>,
    /// The [`CacheKey`]s touched while producing this result, used by
    /// [`crate::watcher::QueryWatcher`] to decide whether a store change is
    /// relevant.
    pub dependent_keys: BTreeSet<CacheKey>,
}

impl GraphQLResult {
    /// Builds a successful cache-sourced result.
    pub fn from_cache(data: Json, dependent_keys: BTreeSet<CacheKey>) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
            extensions: None,
            source: Some(ResultSource::Cache),
            dependent_keys,
        }
    }
}

/// The envelope shape of a single GraphQL response body:
/// `{data?, errors?, extensions?}`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GraphQLResponseEnvelope {
    /// The operation's data, if any was produced.
    #[serde(default)]
    pub data: Option<Json>,
    /// GraphQL-level errors, if any.
    #[serde(default)]
    pub errors: Option<Vec<GraphQLError>>,
    /// Server extension data.
    #[serde(default)]
    pub extensions: Option<Json>,
}

/// A typed operation request with headers, body, endpoint and cache policy.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// The GraphQL endpoint to send this request to.
    pub endpoint_url: reqwest::Url,
    /// Additional headers the caller supplied; `Accept` is always overwritten
    /// by [`crate::interceptor::NetworkFetchInterceptor`] regardless of what
    /// is set here.
    pub headers: HeaderMap,
    /// The already-serialized JSON request body, rebuilt by
    /// [`crate::interceptor::AutomaticPersistedQueryInterceptor`] between
    /// attempts.
    pub body: Json,
    /// The kind of operation this request carries.
    pub operation_kind: OperationKind,
    /// The operation's name, used for client-telemetry headers and logging.
    pub operation_name: Option<String>,
    /// The reported client name, sent as `apollographql-client-name`.
    pub client_name: Option<String>,
    /// The reported client version, sent as `apollographql-client-version`.
    pub client_version: Option<String>,
    /// How this request should consult and update the cache.
    pub cache_policy: CachePolicy,
    /// A correlation id used to suppress self-triggered watcher refetches.
    pub context_identifier: Option<Uuid>,
}

impl HttpRequest {
    /// Builds a request with the documented defaults: no extra headers,
    /// `ReturnCacheDataElseFetch`, and no context identifier (one is
    /// stamped on by [`crate::interceptor::RequestIdInterceptor`] if absent).
    pub fn new(endpoint_url: reqwest::Url, operation_kind: OperationKind, body: Json) -> Self {
        Self {
            endpoint_url,
            headers: HeaderMap::new(),
            body,
            operation_kind,
            operation_name: None,
            client_name: None,
            client_version: None,
            cache_policy: CachePolicy::ReturnCacheDataElseFetch,
            context_identifier: None,
        }
    }

    pub(crate) fn operation_name(&self) -> &str {
        self.operation_name.as_deref().unwrap_or("anonymous")
    }
}

/// The raw result of issuing an [`HttpRequest`] over the network.
#[derive(Clone, Debug, Default)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub status: u16,
    /// The response headers.
    pub headers: HeaderMap,
    /// The raw, un-decoded response body bytes.
    pub raw_body: Vec<u8>,
    /// The decoded [`GraphQLResult`], once a parsing interceptor has run.
    pub parsed_result: Option<GraphQLResult>,
}

impl HttpResponse {
    /// Whether this response's status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
