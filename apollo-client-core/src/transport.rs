//! The caller-facing façade: `send`/`upload`, a transport callable contract
//! (`send(operation, completion) -> Cancellable`, `upload(operation, files,
//! context?, completion) -> Cancellable`), adapted to hand back a
//! [`ResultStream`] to `.await` on instead of taking a completion closure.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::http::{CachePolicy, HttpRequest, OperationKind};
use crate::interceptor::standard::{
    CacheReadInterceptor, CacheWriteInterceptor, DocumentHasher, HeaderAugmentingInterceptor,
    MaxRetryInterceptor, RequestIdInterceptor, Transport,
};
use crate::interceptor::{Cancellable, ErrorInterceptor, Interceptor, RequestChain, ResultStream};
use crate::operation::{GraphQLOperation, OperationDocumentFormat};
use crate::store::ApolloStore;

/// One file attached to an upload operation, with the
/// `{fieldName, originalName, fileURL}` shape (read eagerly into memory
/// rather than referenced by URL, since external file-loading is out of
/// scope here).
pub struct UploadFile {
    /// The GraphQL variable path this file fills in, e.g. `"variables.file"`.
    pub field_name: String,
    /// The file name reported to the server.
    pub original_name: String,
    /// The MIME type to report, if known.
    pub content_type: Option<String>,
    /// The file's bytes.
    pub bytes: Vec<u8>,
}

/// Builds the ordered interceptor list for one operation.
///
/// A composable trait plus a decorator layering custom stages atop a
/// default provider's list, in place of subclassing a default provider.
pub trait InterceptorProvider<Op: GraphQLOperation>: Send + Sync {
    /// Returns the interceptors to run, in order, for `operation`.
    fn interceptors(&self, operation: &Op, request: &HttpRequest) -> Vec<Arc<dyn Interceptor>>;
}

/// Wraps an inner [`InterceptorProvider`], appending `extra` interceptors
/// after its list — the composition the real client uses in place of
/// subclassing a default interceptor provider.
pub struct AppendingInterceptorProvider<Op, P> {
    inner: P,
    extra: Vec<Arc<dyn Interceptor>>,
    _operation: PhantomData<fn() -> Op>,
}

impl<Op, P> AppendingInterceptorProvider<Op, P>
where
    Op: GraphQLOperation,
    P: InterceptorProvider<Op>,
{
    /// Layers `extra` after whatever `inner` returns.
    pub fn new(inner: P, extra: Vec<Arc<dyn Interceptor>>) -> Self {
        Self {
            inner,
            extra,
            _operation: PhantomData,
        }
    }
}

impl<Op, P> InterceptorProvider<Op> for AppendingInterceptorProvider<Op, P>
where
    Op: GraphQLOperation,
    P: InterceptorProvider<Op>,
{
    fn interceptors(&self, operation: &Op, request: &HttpRequest) -> Vec<Arc<dyn Interceptor>> {
        let mut interceptors = self.inner.interceptors(operation, request);
        interceptors.extend(self.extra.iter().cloned());
        interceptors
    }
}

/// The standard pipeline, in the order a default client runs them: request
/// id stamping, header augmentation, a total-entry cap,
/// cache read, network fetch, response-code check, multipart parsing, JSON
/// parsing, and cache write.
pub struct DefaultInterceptorProvider<T: Transport, H: DocumentHasher> {
    store: Arc<ApolloStore>,
    transport: Arc<T>,
    hasher: Arc<H>,
    max_entries: u32,
    upload_client: reqwest::Client,
}

impl<T: Transport, H: DocumentHasher> DefaultInterceptorProvider<T, H> {
    /// Builds the default provider against `store`, issuing network calls
    /// through `transport` and hashing documents with `hasher`.
    /// `max_entries` bounds how many times the pipeline may be entered in
    /// total for one chain (see [`MaxRetryInterceptor`]). Uploads, which
    /// need a concrete `reqwest::multipart::Form`, go out over
    /// `upload_client` rather than `transport`.
    pub fn new(
        store: Arc<ApolloStore>,
        transport: Arc<T>,
        hasher: Arc<H>,
        max_entries: u32,
        upload_client: reqwest::Client,
    ) -> Self {
        Self {
            store,
            transport,
            hasher,
            max_entries,
            upload_client,
        }
    }
}

impl<Op, T, H> InterceptorProvider<Op> for DefaultInterceptorProvider<T, H>
where
    Op: GraphQLOperation,
    T: Transport + 'static,
    H: DocumentHasher + 'static,
{
    fn interceptors(&self, operation: &Op, _request: &HttpRequest) -> Vec<Arc<dyn Interceptor>> {
        let document = operation
            .operation_document(OperationDocumentFormat::Document)
            .into_owned();
        // The APQ stage sits at two positions in the same pass: once before
        // the network call, to attach the hash-only body, and once after
        // JSON parsing, to inspect the response for `PersistedQueryNotFound`
        // and retry with the full document. Both positions share the one
        // `retried` flag, so it must be the same instance.
        let apq = Arc::new(crate::interceptor::standard::AutomaticPersistedQueryInterceptor::new(
            self.hasher.clone(),
            document,
        ));
        vec![
            Arc::new(RequestIdInterceptor),
            Arc::new(HeaderAugmentingInterceptor),
            Arc::new(MaxRetryInterceptor::new(self.max_entries)),
            Arc::new(CacheReadInterceptor::new(
                self.store.clone(),
                operation.root_cache_key(),
                operation.root_selection_set(),
            )),
            apq.clone(),
            Arc::new(crate::interceptor::standard::NetworkFetchInterceptor::new(
                self.transport.clone(),
            )),
            Arc::new(crate::interceptor::standard::ResponseCodeInterceptor),
            Arc::new(crate::interceptor::standard::MultipartResponseParsingInterceptor),
            Arc::new(crate::interceptor::standard::JSONResponseParsingInterceptor),
            apq,
            Arc::new(CacheWriteInterceptor::new(
                self.store.clone(),
                operation.normalizer(),
                operation.root_cache_key(),
            )),
        ]
    }
}

impl<Op, T, H> UploadInterceptorProvider<Op> for DefaultInterceptorProvider<T, H>
where
    Op: GraphQLOperation,
    T: Transport + 'static,
    H: DocumentHasher + 'static,
{
    fn upload_interceptors(
        &self,
        operation: &Op,
        _request: &HttpRequest,
        files: Vec<UploadFile>,
    ) -> Vec<Arc<dyn Interceptor>> {
        vec![
            Arc::new(RequestIdInterceptor),
            Arc::new(HeaderAugmentingInterceptor),
            Arc::new(MaxRetryInterceptor::new(self.max_entries)),
            Arc::new(MultipartUploadInterceptor::new(self.upload_client.clone(), files)),
            Arc::new(crate::interceptor::standard::ResponseCodeInterceptor),
            Arc::new(crate::interceptor::standard::MultipartResponseParsingInterceptor),
            Arc::new(crate::interceptor::standard::JSONResponseParsingInterceptor),
            Arc::new(CacheWriteInterceptor::new(
                self.store.clone(),
                operation.normalizer(),
                operation.root_cache_key(),
            )),
        ]
    }
}

fn build_request<Op: GraphQLOperation>(
    operation: &Op,
    endpoint_url: reqwest::Url,
    cache_policy: CachePolicy,
) -> HttpRequest {
    let body = serde_json::json!({
        "query": operation.operation_document(OperationDocumentFormat::Document),
        "operationName": operation.operation_name(),
        "variables": operation.variables(),
    });
    let mut request = HttpRequest::new(endpoint_url, operation.operation_kind(), body);
    request.operation_name = Some(operation.operation_name().to_string());
    request.cache_policy = cache_policy;
    request
}

/// The client façade: builds a [`RequestChain`] per operation from an
/// [`InterceptorProvider`] and kicks it off.
pub struct ApolloClient<Op: GraphQLOperation, P: InterceptorProvider<Op>> {
    endpoint_url: reqwest::Url,
    provider: P,
    client_name: Option<String>,
    client_version: Option<String>,
    error_interceptor: Option<Arc<dyn ErrorInterceptor>>,
    max_retries: Option<u32>,
    _operation: PhantomData<fn() -> Op>,
}

impl<Op, P> ApolloClient<Op, P>
where
    Op: GraphQLOperation + 'static,
    P: InterceptorProvider<Op>,
{
    /// Builds a client against `endpoint_url`, driving every operation
    /// through `provider`'s interceptor list.
    pub fn new(endpoint_url: reqwest::Url, provider: P) -> Self {
        Self {
            endpoint_url,
            provider,
            client_name: None,
            client_version: None,
            error_interceptor: None,
            max_retries: None,
            _operation: PhantomData,
        }
    }

    /// Sets the `apollographql-client-name`/`-version` telemetry values
    /// attached by [`HeaderAugmentingInterceptor`].
    pub fn with_client_identity(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self.client_version = Some(version.into());
        self
    }

    /// Attaches an additional error interceptor, given first refusal on
    /// every chain-level error before it reaches the caller.
    pub fn with_error_interceptor(mut self, error_interceptor: Arc<dyn ErrorInterceptor>) -> Self {
        self.error_interceptor = Some(error_interceptor);
        self
    }

    /// Caps how many times [`crate::interceptor::RequestChainHandle::retry`]
    /// may restart a chain before it fails with
    /// [`crate::error::ChainError::TooManyRetries`].
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sends `operation`, returning a handle to cancel it and a stream to
    /// drain its result(s) from.
    pub fn send(&self, operation: &Op, cache_policy: CachePolicy) -> (Cancellable, ResultStream) {
        let mut request = build_request(operation, self.endpoint_url.clone(), cache_policy);
        request.client_name = self.client_name.clone();
        request.client_version = self.client_version.clone();

        let interceptors = self.provider.interceptors(operation, &request);
        let (chain, results) = RequestChain::new(
            interceptors,
            self.error_interceptor.clone(),
            self.max_retries,
        );
        let handle = chain.kickoff(request);
        (handle, results)
    }

    /// Sends `operation` as a `multipart/form-data` upload carrying `files`,
    /// per the GraphQL multipart request specification, tagging the
    /// request with `context_identifier` if given.
    pub fn upload(
        &self,
        operation: &Op,
        files: Vec<UploadFile>,
        context_identifier: Option<uuid::Uuid>,
    ) -> (Cancellable, ResultStream)
    where
        P: UploadInterceptorProvider<Op>,
    {
        let mut request = build_request(operation, self.endpoint_url.clone(), CachePolicy::FetchIgnoringCacheCompletely);
        request.client_name = self.client_name.clone();
        request.client_version = self.client_version.clone();
        request.context_identifier = context_identifier;

        let interceptors = self.provider.upload_interceptors(operation, &request, files);
        let (chain, results) = RequestChain::new(
            interceptors,
            self.error_interceptor.clone(),
            self.max_retries,
        );
        let handle = chain.kickoff(request);
        (handle, results)
    }
}

/// Extends [`InterceptorProvider`] with the extra wiring an upload needs: a
/// network stage that posts `multipart/form-data` instead of bare JSON.
pub trait UploadInterceptorProvider<Op: GraphQLOperation>: InterceptorProvider<Op> {
    /// Returns the interceptors to run for an upload carrying `files`.
    fn upload_interceptors(
        &self,
        operation: &Op,
        request: &HttpRequest,
        files: Vec<UploadFile>,
    ) -> Vec<Arc<dyn Interceptor>>;
}

/// Issues the GraphQL multipart request spec's `operations`/`map`/file-part
/// encoding over `reqwest::multipart`, in place of
/// [`crate::interceptor::standard::NetworkFetchInterceptor`].
pub struct MultipartUploadInterceptor {
    client: reqwest::Client,
    files: std::sync::Mutex<Option<Vec<UploadFile>>>,
}

impl MultipartUploadInterceptor {
    /// Builds an upload stage carrying `files`, issued once (a second
    /// `intercept` entry on the same instance finds the files already
    /// taken and fails fast rather than re-reading consumed file bytes).
    pub fn new(client: reqwest::Client, files: Vec<UploadFile>) -> Self {
        Self {
            client,
            files: std::sync::Mutex::new(Some(files)),
        }
    }
}

#[async_trait]
impl Interceptor for MultipartUploadInterceptor {
    async fn intercept(
        &self,
        chain: &crate::interceptor::RequestChainHandle,
        request: HttpRequest,
        response: Option<crate::http::HttpResponse>,
    ) {
        let files = self.files.lock().expect("upload files mutex poisoned").take();
        let Some(files) = files else {
            chain
                .fail(
                    crate::error::ChainError::MalformedMultipart(
                        "upload interceptor entered more than once".into(),
                    ),
                    request,
                    response,
                )
                .await;
            return;
        };

        let map: serde_json::Map<String, serde_json::Value> = files
            .iter()
            .enumerate()
            .map(|(index, file)| (index.to_string(), serde_json::json!([file.field_name])))
            .collect();

        let mut form = reqwest::multipart::Form::new()
            .text("operations", request.body.to_string())
            .text("map", serde_json::Value::Object(map).to_string());

        for (index, file) in files.into_iter().enumerate() {
            let mut part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.original_name);
            if let Some(content_type) = file.content_type {
                if let Ok(part_with_type) = part.mime_str(&content_type) {
                    part = part_with_type;
                }
            }
            form = form.part(index.to_string(), part);
        }

        let outcome = self
            .client
            .post(request.endpoint_url.clone())
            .headers(request.headers.clone())
            .multipart(form)
            .send()
            .await;

        match outcome {
            Ok(raw_response) => {
                let status = raw_response.status().as_u16();
                let headers = raw_response.headers().clone();
                let body = match raw_response.bytes().await {
                    Ok(bytes) => bytes.to_vec(),
                    Err(err) => {
                        chain
                            .fail(crate::error::ChainError::Transport(err), request, response)
                            .await;
                        return;
                    }
                };
                let response = crate::http::HttpResponse {
                    status,
                    headers,
                    raw_body: body,
                    parsed_result: None,
                };
                chain.proceed(request, Some(response)).await;
            }
            Err(err) => {
                chain
                    .fail(crate::error::ChainError::Transport(err), request, response)
                    .await;
            }
        }
    }

    fn name(&self) -> &'static str {
        "multipart_upload"
    }
}
