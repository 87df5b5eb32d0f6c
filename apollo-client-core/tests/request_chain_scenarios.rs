//! End-to-end coverage of the request-chain scenarios a reviewer would reach
//! for first: an empty pipeline, selective cancellation, the subscription
//! Accept-header override, multipart fan-out, errors-without-data, and the
//! cache-miss-then-retry path.

use std::borrow::Cow;
use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value as Json};

use apollo_client_core::cache_key::CacheKey;
use apollo_client_core::data_dict::{Record, RecordSet, ScalarOrReference};
use apollo_client_core::error::ChainError;
use apollo_client_core::http::{CachePolicy, GraphQLResult, HttpRequest, HttpResponse, OperationKind};
use apollo_client_core::interceptor::standard::{
    CacheReadInterceptor, RawHttpResponse, Sha256DocumentHasher, Transport,
};
use apollo_client_core::interceptor::{
    CancelCapable, Interceptor, RequestChain, RequestChainHandle,
};
use apollo_client_core::operation::{
    ExecutableSelectionSet, GraphQLOperation, Normalizer, OperationDocumentFormat,
};
use apollo_client_core::store::ApolloStore;
use apollo_client_core::transport::{ApolloClient, DefaultInterceptorProvider, InterceptorProvider};

/// Selection set for `query Hero { hero { name } }`, resolving `hero` as a
/// reference from the query root and reading its `name` field.
struct HeroSelectionSet;

impl ExecutableSelectionSet for HeroSelectionSet {
    fn execute(
        &self,
        root_key: &CacheKey,
        records: &RecordSet,
    ) -> Result<(Json, BTreeSet<CacheKey>), ChainError> {
        let mut dependent_keys = BTreeSet::new();
        dependent_keys.insert(root_key.clone());
        let root = records
            .get(root_key)
            .ok_or_else(|| ChainError::CacheMiss("hero".into()))?;
        let hero_ref = root
            .get("hero")
            .and_then(ScalarOrReference::as_reference)
            .ok_or_else(|| ChainError::CacheMiss("hero".into()))?;
        dependent_keys.insert(hero_ref.clone());
        let hero_record = records
            .get(hero_ref)
            .ok_or_else(|| ChainError::CacheMiss("hero.name".into()))?;
        let name = hero_record
            .get("name")
            .ok_or_else(|| ChainError::CacheMiss("hero.name".into()))?;
        let name = match name {
            ScalarOrReference::Scalar(value) => value.clone(),
            _ => return Err(ChainError::CacheMiss("hero.name".into())),
        };
        Ok((json!({ "hero": { "name": name } }), dependent_keys))
    }
}

/// Normalizes `{hero: {__typename, id, name}}` into `QUERY_ROOT` + `Hero:<id>`
/// records.
struct HeroNormalizer;

impl Normalizer for HeroNormalizer {
    fn normalize(&self, root_key: &CacheKey, data: &Json) -> RecordSet {
        let mut records = RecordSet::new();
        let Some(hero) = data.get("hero") else {
            return records;
        };
        let id = hero.get("id").and_then(Json::as_str).unwrap_or("1");
        let hero_key = CacheKey::for_object("Hero", id);

        let mut hero_record = Record::new();
        if let Some(name) = hero.get("name") {
            hero_record.insert("name".into(), ScalarOrReference::Scalar(name.clone()));
        }
        records.insert(hero_key.clone(), hero_record);

        let mut root_record = Record::new();
        root_record.insert("hero".into(), ScalarOrReference::Reference(hero_key));
        records.insert(root_key.clone(), root_record);
        records
    }
}

struct HeroQuery;

impl GraphQLOperation for HeroQuery {
    type Variables = ();

    fn operation_name(&self) -> &str {
        "Hero"
    }

    fn operation_kind(&self) -> OperationKind {
        OperationKind::Query
    }

    fn operation_document(&self, _format: OperationDocumentFormat) -> Cow<'_, str> {
        Cow::Borrowed("query Hero { hero { name } }")
    }

    fn variables(&self) -> &Self::Variables {
        &()
    }

    fn root_cache_key(&self) -> CacheKey {
        CacheKey::new(CacheKey::QUERY_ROOT)
    }

    fn root_selection_set(&self) -> Arc<dyn ExecutableSelectionSet> {
        Arc::new(HeroSelectionSet)
    }

    fn normalizer(&self) -> Arc<dyn Normalizer> {
        Arc::new(HeroNormalizer)
    }
}

/// Records the last request it was asked to execute and replays responses
/// from a queue, standing in for the external URL-session collaborator.
#[derive(Default)]
struct MockTransport {
    responses: StdMutex<VecDeque<RawHttpResponse>>,
    last_request: StdMutex<Option<HttpRequest>>,
}

impl MockTransport {
    fn queue(&self, status: u16, headers: HeaderMap, body: impl Into<Vec<u8>>) {
        self.responses.lock().unwrap().push_back(RawHttpResponse {
            status,
            headers,
            body: body.into(),
        });
    }

    fn last_request(&self) -> HttpRequest {
        self.last_request
            .lock()
            .unwrap()
            .clone()
            .expect("transport was never called")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<RawHttpResponse, reqwest::Error> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("no queued response left for the mock transport"))
    }
}

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers
}

fn endpoint() -> reqwest::Url {
    reqwest::Url::parse("https://example.test/graphql").unwrap()
}

/// An `InterceptorProvider` that always hands back an empty pipeline,
/// standing in for `MockQuery` with no configured interceptors.
struct EmptyInterceptorProvider;

impl<Op: GraphQLOperation> InterceptorProvider<Op> for EmptyInterceptorProvider {
    fn interceptors(&self, _operation: &Op, _request: &HttpRequest) -> Vec<Arc<dyn Interceptor>> {
        Vec::new()
    }
}

#[tokio::test]
async fn empty_interceptor_list_fails_with_no_interceptors() {
    let client = ApolloClient::new(endpoint(), EmptyInterceptorProvider);
    let (_handle, mut results) = client.send(&HeroQuery, CachePolicy::FetchIgnoringCacheData);
    let outcome = results.next().await.unwrap();
    assert!(matches!(outcome, Err(ChainError::NoInterceptors)));
}

struct CancellationHandlingInterceptor {
    was_cancelled: Arc<AtomicBool>,
}

#[async_trait]
impl Interceptor for CancellationHandlingInterceptor {
    async fn intercept(
        &self,
        chain: &RequestChainHandle,
        request: HttpRequest,
        response: Option<HttpResponse>,
    ) {
        chain.proceed(request, response).await;
    }

    fn name(&self) -> &'static str {
        "cancellation_handling"
    }

    fn as_cancellable(&self) -> Option<&dyn CancelCapable> {
        Some(self)
    }
}

#[async_trait]
impl CancelCapable for CancellationHandlingInterceptor {
    async fn on_cancel(&self) {
        self.was_cancelled.store(true, Ordering::SeqCst);
    }
}

/// Never completes on its own; stands in for a slow/blind-retry stage that
/// never declares cancellation capability.
struct BlindRetryInterceptor {
    entered: Arc<AtomicBool>,
}

#[async_trait]
impl Interceptor for BlindRetryInterceptor {
    async fn intercept(
        &self,
        _chain: &RequestChainHandle,
        _request: HttpRequest,
        _response: Option<HttpResponse>,
    ) {
        self.entered.store(true, Ordering::SeqCst);
        std::future::pending::<()>().await;
    }

    fn name(&self) -> &'static str {
        "blind_retry"
    }
}

#[tokio::test]
async fn cancellation_notifies_only_the_cancellable_interceptor() {
    let first_cancelled = Arc::new(AtomicBool::new(false));
    let second_entered = Arc::new(AtomicBool::new(false));

    let (chain, mut results) = RequestChain::new(
        vec![
            Arc::new(CancellationHandlingInterceptor {
                was_cancelled: first_cancelled.clone(),
            }),
            Arc::new(BlindRetryInterceptor {
                entered: second_entered.clone(),
            }),
        ],
        None,
        None,
    );
    let handle = chain.kickoff(HttpRequest::new(endpoint(), OperationKind::Query, json!({})));

    // Let the pipeline reach the second interceptor's permanent pending await.
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;
    assert!(second_entered.load(Ordering::SeqCst));

    handle.cancel();
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    assert!(first_cancelled.load(Ordering::SeqCst));
    assert!(
        tokio::time::timeout(std::time::Duration::from_millis(50), results.next())
            .await
            .is_err(),
        "completion must never fire once cancelled"
    );
}

#[tokio::test]
async fn subscription_accept_header_overrides_caller_supplied_value() {
    let transport = Arc::new(MockTransport::default());
    transport.queue(
        200,
        json_headers(),
        serde_json::to_vec(&json!({ "data": { "hero": { "name": "R2-D2" } } })).unwrap(),
    );
    let store = Arc::new(ApolloStore::new());
    let provider = DefaultInterceptorProvider::new(
        store,
        transport.clone(),
        Arc::new(Sha256DocumentHasher),
        8,
        reqwest::Client::new(),
    );
    let client = ApolloClient::new(endpoint(), provider);

    let (_handle, mut results) = client.send(&HeroQuery, CachePolicy::FetchIgnoringCacheCompletely);
    let _ = results.next().await.unwrap();

    let sent = transport.last_request();
    assert_eq!(
        sent.headers.get(reqwest::header::ACCEPT).unwrap(),
        "multipart/mixed;deferSpec=20220824,application/graphql-response+json,application/json"
    );
}

#[tokio::test]
async fn multipart_subscription_delivers_two_results() {
    let body = [
        "--graphql\r\n",
        "content-type: application/json\r\n",
        "\r\n",
        "{\"payload\":{\"data\":{\"hero\":{\"name\":\"R2-D2\"}}}}\r\n",
        "--graphql\r\n",
        "content-type: application/json\r\n",
        "\r\n",
        "{\"payload\":{\"data\":{\"hero\":{\"name\":\"R2-D2\"}}}}\r\n",
        "--graphql--",
    ]
    .concat();

    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::CONTENT_TYPE,
        HeaderValue::from_static("multipart/mixed;boundary=graphql;deferSpec=20220824"),
    );

    let transport = Arc::new(MockTransport::default());
    transport.queue(200, headers, body);
    let store = Arc::new(ApolloStore::new());
    let provider = DefaultInterceptorProvider::new(
        store,
        transport,
        Arc::new(Sha256DocumentHasher),
        8,
        reqwest::Client::new(),
    );
    let client = ApolloClient::new(endpoint(), provider);

    let (_handle, mut results) = client.send(&HeroQuery, CachePolicy::FetchIgnoringCacheCompletely);

    let first = results.next().await.unwrap().unwrap();
    assert_eq!(first.data.unwrap()["hero"]["name"], json!("R2-D2"));
    let second = results.next().await.unwrap().unwrap();
    assert_eq!(second.data.unwrap()["hero"]["name"], json!("R2-D2"));
    assert!(results.next().await.is_none());
}

#[tokio::test]
async fn graphql_errors_without_data_still_deliver_a_success_result() {
    let transport = Arc::new(MockTransport::default());
    transport.queue(
        200,
        json_headers(),
        serde_json::to_vec(&json!({
            "errors": [{ "message": "Bad request, could not start execution!" }]
        }))
        .unwrap(),
    );
    let store = Arc::new(ApolloStore::new());
    let provider = DefaultInterceptorProvider::new(
        store,
        transport,
        Arc::new(Sha256DocumentHasher),
        8,
        reqwest::Client::new(),
    );
    let client = ApolloClient::new(endpoint(), provider);

    let (_handle, mut results) = client.send(&HeroQuery, CachePolicy::FetchIgnoringCacheCompletely);
    let outcome = results.next().await.unwrap();
    let result = outcome.expect("errors without a transport failure deliver as success");
    assert!(result.data.is_none());
    assert_eq!(result.errors, vec!["Bad request, could not start execution!"]);
}

/// Delivers a `cacheMiss` to the caller, then waits for the test to publish
/// the missing record and signal `ready` before retrying from the head of
/// the pipeline — the idiomatic stand-in for "the caller observes the miss,
/// publishes, and triggers a retry" with retry's actual entry point (an
/// error interceptor holding a [`RequestChainHandle`]).
struct RetryOnceAfterSignal {
    ready: Arc<tokio::sync::Notify>,
    retried: AtomicBool,
}

#[async_trait]
impl apollo_client_core::interceptor::ErrorInterceptor for RetryOnceAfterSignal {
    async fn handle_error(
        &self,
        chain: &RequestChainHandle,
        error: ChainError,
        request: HttpRequest,
        response: Option<HttpResponse>,
    ) {
        if matches!(error, ChainError::CacheMiss(_)) && !self.retried.swap(true, Ordering::SeqCst) {
            chain.complete(Err(error)).await;
            self.ready.notified().await;
            chain.retry(request).await;
            return;
        }
        chain.complete(Err(error)).await;
        let _ = response;
    }
}

#[tokio::test]
async fn cache_miss_then_publish_and_retry_delivers_the_record() {
    let store = Arc::new(ApolloStore::new());
    let ready = Arc::new(tokio::sync::Notify::new());
    let (chain, mut results) = RequestChain::new(
        vec![Arc::new(CacheReadInterceptor::new(
            store.clone(),
            HeroQuery.root_cache_key(),
            HeroQuery.root_selection_set(),
        ))],
        Some(Arc::new(RetryOnceAfterSignal {
            ready: ready.clone(),
            retried: AtomicBool::new(false),
        })),
        None,
    );
    let mut request = HttpRequest::new(endpoint(), OperationKind::Query, json!({}));
    request.cache_policy = CachePolicy::ReturnCacheDataDontFetch;
    chain.kickoff(request);

    let miss = results.next().await.unwrap();
    assert!(matches!(miss, Err(ChainError::CacheMiss(_))));

    let mut records = RecordSet::new();
    let mut hero = Record::new();
    hero.insert("name".into(), ScalarOrReference::Scalar(json!("Han Solo")));
    records.insert(CacheKey::for_object("Hero", "1"), hero);
    let mut root = Record::new();
    root.insert(
        "hero".into(),
        ScalarOrReference::Reference(CacheKey::for_object("Hero", "1")),
    );
    records.insert(CacheKey::new(CacheKey::QUERY_ROOT), root);
    store.publish(records, None).await;
    ready.notify_one();

    let retried = results.next().await.unwrap().unwrap();
    assert_eq!(retried.data.unwrap()["hero"]["name"], json!("Han Solo"));
}

#[tokio::test]
async fn cache_write_persists_server_results_for_later_cache_reads() {
    let transport = Arc::new(MockTransport::default());
    transport.queue(
        200,
        json_headers(),
        serde_json::to_vec(&json!({ "data": { "hero": { "name": "Leia" } } })).unwrap(),
    );
    let store = Arc::new(ApolloStore::new());
    let provider = DefaultInterceptorProvider::new(
        store.clone(),
        transport,
        Arc::new(Sha256DocumentHasher),
        8,
        reqwest::Client::new(),
    );
    let client = ApolloClient::new(endpoint(), provider);

    let (_handle, mut results) = client.send(&HeroQuery, CachePolicy::FetchIgnoringCacheData);
    let fetched = results.next().await.unwrap().unwrap();
    assert_eq!(fetched.data.unwrap()["hero"]["name"], json!("Leia"));

    let (read_chain, mut read_results) = RequestChain::new(
        vec![Arc::new(CacheReadInterceptor::new(
            store,
            HeroQuery.root_cache_key(),
            HeroQuery.root_selection_set(),
        ))],
        None,
        None,
    );
    let mut request = HttpRequest::new(endpoint(), OperationKind::Query, json!({}));
    request.cache_policy = CachePolicy::ReturnCacheDataDontFetch;
    read_chain.kickoff(request);

    let from_cache: GraphQLResult = read_results.next().await.unwrap().unwrap();
    assert_eq!(from_cache.data.unwrap()["hero"]["name"], json!("Leia"));
}
