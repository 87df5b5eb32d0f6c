//! The standard interceptor set, plus two telemetry/correlation stages
//! (`RequestIdInterceptor`, `HeaderAugmentingInterceptor`) supplemented
//! from the wider Apollo client surface.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value as Json;
use uuid::Uuid;

use super::{Interceptor, RequestChainHandle};
use crate::cache_key::CacheKey;
use crate::error::ChainError;
use crate::http::{
    CachePolicy, GraphQLResponseEnvelope, GraphQLResult, HttpRequest, HttpResponse, OperationKind,
    ResultSource,
};
use crate::operation::{ExecutableSelectionSet, Normalizer};
use crate::store::ApolloStore;

/// Stamps a correlation id onto the request if the caller did not already
/// supply one, so [`crate::watcher::QueryWatcher`] can tell its own writes
/// apart from writes made elsewhere.
pub struct RequestIdInterceptor;

#[async_trait]
impl Interceptor for RequestIdInterceptor {
    #[tracing::instrument(skip_all, fields(operation = %request.operation_name()))]
    async fn intercept(
        &self,
        chain: &RequestChainHandle,
        mut request: HttpRequest,
        response: Option<HttpResponse>,
    ) {
        if request.context_identifier.is_none() {
            request.context_identifier = Some(Uuid::new_v4());
        }
        chain.proceed(request, response).await;
    }

    fn name(&self) -> &'static str {
        "request_id"
    }
}

const CLIENT_NAME_HEADER: &str = "apollographql-client-name";
const CLIENT_VERSION_HEADER: &str = "apollographql-client-version";

/// Mirrors the client's reported name/version into telemetry headers ahead
/// of [`NetworkFetchInterceptor`]. Never touches `Accept` — that header is
/// always owned by the network interceptor.
pub struct HeaderAugmentingInterceptor;

#[async_trait]
impl Interceptor for HeaderAugmentingInterceptor {
    #[tracing::instrument(skip_all, fields(operation = %request.operation_name()))]
    async fn intercept(
        &self,
        chain: &RequestChainHandle,
        mut request: HttpRequest,
        response: Option<HttpResponse>,
    ) {
        if let Some(name) = request.client_name.clone() {
            if let Ok(value) = HeaderValue::from_str(&name) {
                request
                    .headers
                    .insert(HeaderName::from_static(CLIENT_NAME_HEADER), value);
            }
        }
        if let Some(version) = request.client_version.clone() {
            if let Ok(value) = HeaderValue::from_str(&version) {
                request
                    .headers
                    .insert(HeaderName::from_static(CLIENT_VERSION_HEADER), value);
            }
        }
        chain.proceed(request, response).await;
    }

    fn name(&self) -> &'static str {
        "header_augmenting"
    }
}

/// Reads the operation's root selection set from the store before hitting
/// the network, per the request's [`CachePolicy`].
pub struct CacheReadInterceptor {
    store: Arc<ApolloStore>,
    root_key: CacheKey,
    selection_set: Arc<dyn ExecutableSelectionSet>,
}

impl CacheReadInterceptor {
    /// Builds a cache-read stage for one operation's root key and compiled
    /// selection set.
    pub fn new(
        store: Arc<ApolloStore>,
        root_key: CacheKey,
        selection_set: Arc<dyn ExecutableSelectionSet>,
    ) -> Self {
        Self {
            store,
            root_key,
            selection_set,
        }
    }
}

#[async_trait]
impl Interceptor for CacheReadInterceptor {
    #[tracing::instrument(skip_all, fields(operation = %request.operation_name()))]
    async fn intercept(
        &self,
        chain: &RequestChainHandle,
        request: HttpRequest,
        response: Option<HttpResponse>,
    ) {
        if !request.cache_policy.consults_cache() {
            chain.proceed(request, response).await;
            return;
        }

        match self
            .store
            .execute(&self.root_key, self.selection_set.as_ref())
            .await
        {
            Ok((data, dependent_keys)) => {
                let result = GraphQLResult {
                    data: Some(data),
                    errors: Vec::new(),
                    extensions: None,
                    source: Some(ResultSource::Cache),
                    dependent_keys,
                };
                if request.cache_policy == CachePolicy::ReturnCacheDataAndFetch {
                    chain.complete(Ok(result)).await;
                    chain.proceed(request, response).await;
                } else {
                    chain.complete(Ok(result)).await;
                }
            }
            Err(ChainError::CacheMiss(path)) => {
                if request.cache_policy == CachePolicy::ReturnCacheDataDontFetch {
                    chain
                        .fail(ChainError::CacheMiss(path), request, response)
                        .await;
                } else {
                    chain.proceed(request, response).await;
                }
            }
            Err(other) => chain.fail(other, request, response).await,
        }
    }

    fn name(&self) -> &'static str {
        "cache_read"
    }
}

/// The bytes-and-status shape a [`Transport`] hands back; distinct from
/// [`HttpResponse`] in that it carries no [`GraphQLResult`] yet.
pub struct RawHttpResponse {
    /// The HTTP status code.
    pub status: u16,
    /// The response headers.
    pub headers: reqwest::header::HeaderMap,
    /// The raw response body.
    pub body: Vec<u8>,
}

/// The external URL-session-shaped collaborator `NetworkFetchInterceptor`
/// issues requests through. The concrete HTTP transport implementation is
/// out of scope here; this is its consumption contract.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues `request` and returns the raw response, or a transport-level
    /// error (DNS failure, connection reset, timeout, ...).
    async fn execute(&self, request: &HttpRequest) -> Result<RawHttpResponse, reqwest::Error>;
}

/// A [`Transport`] backed by a real [`reqwest::Client`].
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wraps an existing [`reqwest::Client`] (so callers can share
    /// connection pools/TLS config across many chains).
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<RawHttpResponse, reqwest::Error> {
        let response = self
            .client
            .post(request.endpoint_url.clone())
            .headers(request.headers.clone())
            .json(&request.body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(RawHttpResponse {
            status,
            headers,
            body,
        })
    }
}

const SUBSCRIPTION_SPEC: &str = "subscriptionSpec=1.0";
const DEFER_SPEC: &str = "deferSpec=20220824";

/// Issues the request over `transport`, always overwriting `Accept` with
/// a deterministic multipart-capable value regardless of what the caller
/// supplied.
pub struct NetworkFetchInterceptor<T: Transport> {
    transport: Arc<T>,
}

impl<T: Transport> NetworkFetchInterceptor<T> {
    /// Builds a network stage over `transport`.
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }
}

fn accept_header_value(operation_kind: OperationKind) -> &'static str {
    match operation_kind {
        OperationKind::Subscription => {
            "multipart/mixed;subscriptionSpec=1.0,application/graphql-response+json,application/json"
        }
        OperationKind::Query | OperationKind::Mutation => {
            "multipart/mixed;deferSpec=20220824,application/graphql-response+json,application/json"
        }
    }
}

#[async_trait]
impl<T: Transport + 'static> Interceptor for NetworkFetchInterceptor<T> {
    #[tracing::instrument(skip_all, fields(operation = %request.operation_name()))]
    async fn intercept(
        &self,
        chain: &RequestChainHandle,
        mut request: HttpRequest,
        response: Option<HttpResponse>,
    ) {
        request
            .headers
            .insert(ACCEPT, HeaderValue::from_static(accept_header_value(request.operation_kind)));

        match self.transport.execute(&request).await {
            Ok(raw) => {
                let response = HttpResponse {
                    status: raw.status,
                    headers: raw.headers,
                    raw_body: raw.body,
                    parsed_result: None,
                };
                chain.proceed(request, Some(response)).await;
            }
            Err(err) => chain.fail(ChainError::Transport(err), request, response).await,
        }
    }

    fn name(&self) -> &'static str {
        "network_fetch"
    }
}

/// Fails the chain if the HTTP status was not 2xx.
pub struct ResponseCodeInterceptor;

#[async_trait]
impl Interceptor for ResponseCodeInterceptor {
    #[tracing::instrument(skip_all, fields(operation = %request.operation_name()))]
    async fn intercept(
        &self,
        chain: &RequestChainHandle,
        request: HttpRequest,
        response: Option<HttpResponse>,
    ) {
        match &response {
            Some(resp) if !resp.is_success() => {
                let status = resp.status;
                let body = String::from_utf8_lossy(&resp.raw_body).into_owned();
                chain
                    .fail(ChainError::InvalidResponseCode { status, body }, request, response)
                    .await;
            }
            _ => chain.proceed(request, response).await,
        }
    }

    fn name(&self) -> &'static str {
        "response_code"
    }
}

enum MultipartPart {
    Chunk(Json),
    End,
}

fn extract_boundary(content_type: &str) -> Option<String> {
    if !content_type.contains("multipart/mixed") {
        return None;
    }
    content_type.split(';').find_map(|segment| {
        segment
            .trim()
            .strip_prefix("boundary=")
            .map(|boundary| boundary.trim_matches('"').to_string())
    })
}

fn parse_multipart_body(body: &str, boundary: &str) -> Result<Vec<MultipartPart>, ChainError> {
    let normalized = body.replace("\r\n", "\n");
    let delimiter = format!("--{boundary}");
    let mut parts = Vec::new();
    for raw_part in normalized.split(delimiter.as_str()).skip(1) {
        let trimmed = raw_part.trim_start_matches('\n');
        if trimmed.trim_start().starts_with("--") {
            parts.push(MultipartPart::End);
            break;
        }
        let Some((_headers, body)) = trimmed.split_once("\n\n") else {
            return Err(ChainError::MalformedMultipart(
                "missing header/body separator".into(),
            ));
        };
        let body = body.trim();
        if body.is_empty() {
            continue;
        }
        let envelope: Json = serde_json::from_str(body)
            .map_err(|err| ChainError::MalformedMultipart(err.to_string()))?;
        let payload = envelope.get("payload").cloned().ok_or_else(|| {
            ChainError::MalformedMultipart("multipart chunk missing `payload` field".into())
        })?;
        parts.push(MultipartPart::Chunk(payload));
    }
    Ok(parts)
}

/// Splits a `multipart/mixed` response body into GraphQL payload chunks,
/// forwarding once per chunk so downstream interceptors (and ultimately the
/// caller) see one [`GraphQLResult`] per part. Non-multipart responses pass
/// through untouched for [`JSONResponseParsingInterceptor`] to handle.
pub struct MultipartResponseParsingInterceptor;

#[async_trait]
impl Interceptor for MultipartResponseParsingInterceptor {
    #[tracing::instrument(skip_all, fields(operation = %request.operation_name()))]
    async fn intercept(
        &self,
        chain: &RequestChainHandle,
        request: HttpRequest,
        response: Option<HttpResponse>,
    ) {
        let Some(response) = response else {
            chain.fail(ChainError::NoParsedResponse, request, None).await;
            return;
        };

        let content_type = response
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();

        let Some(boundary) = extract_boundary(&content_type) else {
            chain.proceed(request, Some(response)).await;
            return;
        };

        let body = String::from_utf8_lossy(&response.raw_body).into_owned();
        let parts = match parse_multipart_body(&body, &boundary) {
            Ok(parts) => parts,
            Err(err) => {
                chain.fail(err, request, Some(response)).await;
                return;
            }
        };

        for part in parts {
            match part {
                MultipartPart::Chunk(payload) => {
                    let envelope: GraphQLResponseEnvelope = match serde_json::from_value(payload) {
                        Ok(envelope) => envelope,
                        Err(err) => {
                            chain
                                .fail(ChainError::Decode(err), request.clone(), Some(response.clone()))
                                .await;
                            continue;
                        }
                    };
                    let mut chunk_response = response.clone();
                    chunk_response.parsed_result = Some(GraphQLResult {
                        data: envelope.data,
                        errors: envelope.errors.unwrap_or_default(),
                        extensions: envelope.extensions,
                        source: Some(ResultSource::Server),
                        dependent_keys: BTreeSet::new(),
                    });
                    chain.proceed(request.clone(), Some(chunk_response)).await;
                }
                MultipartPart::End => break,
            }
        }
    }

    fn name(&self) -> &'static str {
        "multipart_response_parsing"
    }
}

/// Decodes a single-payload JSON response body into a [`GraphQLResult`].
/// A no-op if a prior stage (multipart parsing) already populated
/// `parsed_result`. Accepts any Content-Type — a deliberately preserved
/// laxity — but logs once when the type is unrecognized.
pub struct JSONResponseParsingInterceptor;

#[async_trait]
impl Interceptor for JSONResponseParsingInterceptor {
    #[tracing::instrument(skip_all, fields(operation = %request.operation_name()))]
    async fn intercept(
        &self,
        chain: &RequestChainHandle,
        request: HttpRequest,
        response: Option<HttpResponse>,
    ) {
        let Some(mut response) = response else {
            chain.fail(ChainError::NoParsedResponse, request, None).await;
            return;
        };

        if response.parsed_result.is_some() {
            chain.proceed(request, Some(response)).await;
            return;
        }

        let content_type = response
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        if !content_type.is_empty()
            && !content_type.contains("application/json")
            && !content_type.contains("application/graphql-response+json")
        {
            tracing::warn!(content_type = %content_type, "accepting unrecognized Content-Type in GraphQL response");
        }

        match serde_json::from_slice::<GraphQLResponseEnvelope>(&response.raw_body) {
            Ok(envelope) => {
                let errors = envelope.errors.unwrap_or_default();
                if !errors.is_empty() {
                    use itertools::Itertools as _;
                    tracing::debug!(
                        errors = %errors.iter().map(|e| e.message.as_str()).join(", "),
                        "response carried graphql errors"
                    );
                }
                response.parsed_result = Some(GraphQLResult {
                    data: envelope.data,
                    errors,
                    extensions: envelope.extensions,
                    source: Some(ResultSource::Server),
                    dependent_keys: BTreeSet::new(),
                });
                chain.proceed(request, Some(response)).await;
            }
            Err(err) => chain.fail(ChainError::Decode(err), request, Some(response)).await,
        }
    }

    fn name(&self) -> &'static str {
        "json_response_parsing"
    }
}

/// Hashes a GraphQL document for Automatic Persisted Queries. Swappable so
/// tests can substitute a deterministic fake instead of real SHA-256.
pub trait DocumentHasher: Send + Sync {
    /// Returns the hex-encoded hash of `document`.
    fn hash(&self, document: &str) -> String;
}

/// The production [`DocumentHasher`]: SHA-256, hex-encoded, per the
/// Automatic Persisted Queries protocol.
pub struct Sha256DocumentHasher;

impl DocumentHasher for Sha256DocumentHasher {
    fn hash(&self, document: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(document.as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

/// Sends a persisted-query hash first; on `PersistedQueryNotFound`, retries
/// once with the full document attached.
pub struct AutomaticPersistedQueryInterceptor<H: DocumentHasher> {
    hasher: Arc<H>,
    document: String,
    retried: AtomicBool,
}

impl<H: DocumentHasher> AutomaticPersistedQueryInterceptor<H> {
    /// Builds an APQ stage for `document`, hashed with `hasher`.
    pub fn new(hasher: Arc<H>, document: impl Into<String>) -> Self {
        Self {
            hasher,
            document: document.into(),
            retried: AtomicBool::new(false),
        }
    }

    fn persisted_query_extension(&self) -> Json {
        serde_json::json!({ "persistedQuery": { "version": 1, "sha256Hash": self.hasher.hash(&self.document) } })
    }

    fn with_hash_only(&self, mut request: HttpRequest) -> HttpRequest {
        if let Some(body) = request.body.as_object_mut() {
            body.remove("query");
            body.insert("extensions".to_string(), self.persisted_query_extension());
        }
        request
    }

    fn with_full_document(&self, mut request: HttpRequest) -> HttpRequest {
        if let Some(body) = request.body.as_object_mut() {
            body.insert("query".to_string(), Json::String(self.document.clone()));
            body.insert("extensions".to_string(), self.persisted_query_extension());
        }
        request
    }
}

#[async_trait]
impl<H: DocumentHasher + 'static> Interceptor for AutomaticPersistedQueryInterceptor<H> {
    #[tracing::instrument(skip_all, fields(operation = %request.operation_name()))]
    async fn intercept(
        &self,
        chain: &RequestChainHandle,
        request: HttpRequest,
        response: Option<HttpResponse>,
    ) {
        let Some(response) = response else {
            // Entered twice per attempt: once before the network call (no
            // response yet) and once after parsing. On the retried attempt
            // the body already carries the full document from
            // `with_full_document`; stripping it back to hash-only here
            // would undo the retry.
            let request = if self.retried.load(Ordering::SeqCst) {
                request
            } else {
                self.with_hash_only(request)
            };
            chain.proceed(request, None).await;
            return;
        };

        let not_found = response
            .parsed_result
            .as_ref()
            .map(|result| result.errors.iter().any(|e| *e == "PersistedQueryNotFound"))
            .unwrap_or(false);

        if !not_found {
            chain.proceed(request, Some(response)).await;
            return;
        }

        if self.retried.swap(true, Ordering::SeqCst) {
            chain
                .fail(ChainError::ApqNotFound, request, Some(response))
                .await;
            return;
        }

        chain.retry(self.with_full_document(request)).await;
    }

    fn name(&self) -> &'static str {
        "automatic_persisted_query"
    }
}

/// Caps the number of times this chain's pipeline may be entered overall
/// (a backstop independent of [`crate::interceptor::RequestChain`]'s own
/// retry-budget check, which only guards explicit `chain.retry` calls).
pub struct MaxRetryInterceptor {
    max: u32,
    attempts: AtomicU32,
}

impl MaxRetryInterceptor {
    /// Builds a cap of `max` total entries.
    pub fn new(max: u32) -> Self {
        Self {
            max,
            attempts: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Interceptor for MaxRetryInterceptor {
    #[tracing::instrument(skip_all, fields(operation = %request.operation_name()))]
    async fn intercept(
        &self,
        chain: &RequestChainHandle,
        request: HttpRequest,
        response: Option<HttpResponse>,
    ) {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt > self.max {
            chain
                .fail(ChainError::TooManyRetries { max: self.max }, request, response)
                .await;
            return;
        }
        chain.proceed(request, response).await;
    }

    fn name(&self) -> &'static str {
        "max_retry"
    }
}

/// Normalizes a successful server-sourced result into the store.
pub struct CacheWriteInterceptor {
    store: Arc<ApolloStore>,
    normalizer: Arc<dyn Normalizer>,
    root_key: CacheKey,
}

impl CacheWriteInterceptor {
    /// Builds a cache-write stage for one operation's root key and
    /// normalizer.
    pub fn new(store: Arc<ApolloStore>, normalizer: Arc<dyn Normalizer>, root_key: CacheKey) -> Self {
        Self {
            store,
            normalizer,
            root_key,
        }
    }
}

#[async_trait]
impl Interceptor for CacheWriteInterceptor {
    #[tracing::instrument(skip_all, fields(operation = %request.operation_name()))]
    async fn intercept(
        &self,
        chain: &RequestChainHandle,
        request: HttpRequest,
        response: Option<HttpResponse>,
    ) {
        if let Some(result) = response.as_ref().and_then(|r| r.parsed_result.as_ref()) {
            if result.source == Some(ResultSource::Server) {
                if let Some(data) = &result.data {
                    let records = self.normalizer.normalize(&self.root_key, data);
                    self.store.publish(records, request.context_identifier).await;
                }
            }
        }
        chain.proceed(request, response).await;
    }

    fn name(&self) -> &'static str {
        "cache_write"
    }
}

/// Opt-in stage that elevates a response's GraphQL errors into a chain
/// failure when no `data` came back with them. Standard chains omit this
/// interceptor, in which case errors-without-data still deliver as a
/// success result with `errors` populated (spec.md §7); a caller that wants
/// the stricter behavior adds this interceptor to its pipeline.
pub struct GraphqlErrorElevationInterceptor;

#[async_trait]
impl Interceptor for GraphqlErrorElevationInterceptor {
    #[tracing::instrument(skip_all, fields(operation = %request.operation_name()))]
    async fn intercept(
        &self,
        chain: &RequestChainHandle,
        request: HttpRequest,
        response: Option<HttpResponse>,
    ) {
        let has_data_free_errors = response
            .as_ref()
            .and_then(|r| r.parsed_result.as_ref())
            .is_some_and(|result| result.data.is_none() && !result.errors.is_empty());
        if !has_data_free_errors {
            chain.proceed(request, response).await;
            return;
        }
        let errors = response
            .as_ref()
            .and_then(|r| r.parsed_result.as_ref())
            .map(|result| result.errors.clone())
            .unwrap_or_default();
        chain.fail(ChainError::GraphqlErrors(errors), request, response).await;
    }

    fn name(&self) -> &'static str {
        "graphql_error_elevation"
    }
}
