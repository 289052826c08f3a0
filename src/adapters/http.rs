use crate::config::toml_config::{
    ClientConfig, DEFAULT_API_VERSION, DEFAULT_CLIENT_TYPE, DEFAULT_CONCURRENT_REQUESTS,
    DEFAULT_TIMEOUT_MS,
};
use crate::core::batch::settle_all_bounded;
use crate::core::retry::RetryExecutor;
use crate::domain::model::{ApiResult, BatchOutcome, BatchRequest, ErrorCode, HttpMethod, RequestOptions};
use crate::domain::ports::TokenProvider;
use crate::utils::error::{ClientError, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const JSON_CONTENT_TYPE: &str = "application/json";

const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// HTTP client for the backend API. Every call returns an [`ApiResult`];
/// transport problems, timeouts and error statuses are reported as data.
pub struct BackendClient {
    client: Client,
    base_url: String,
    api_version: String,
    client_type: String,
    timeout: Duration,
    default_headers: HashMap<String, String>,
    tokens: Arc<dyn TokenProvider>,
    executor: RetryExecutor,
    concurrent_requests: usize,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            client_type: DEFAULT_CLIENT_TYPE.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            default_headers: HashMap::new(),
            tokens,
            executor: RetryExecutor::default(),
            concurrent_requests: DEFAULT_CONCURRENT_REQUESTS,
        }
    }

    pub fn from_config(config: &ClientConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            base_url: config.api.base_url.clone(),
            api_version: config.api.api_version.clone(),
            client_type: config.client_type().to_string(),
            timeout: config.timeout(),
            default_headers: config.api.headers.clone().unwrap_or_default(),
            tokens,
            executor: config.retry_executor()?,
            concurrent_requests: config.concurrent_requests(),
        })
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_executor(mut self, executor: RetryExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_concurrent_requests(mut self, limit: usize) -> Self {
        self.concurrent_requests = limit.max(1);
        self
    }

    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}{}",
            self.base_url.trim_end_matches('/'),
            self.api_version,
            endpoint
        )
    }

    /// 單次請求，不重試
    pub async fn make_request(&self, endpoint: &str, options: RequestOptions) -> ApiResult<Value> {
        let request = match self
            .authorized_request(
                to_reqwest_method(options.method),
                endpoint,
                Some(JSON_CONTENT_TYPE),
                &options.headers,
            )
            .await
        {
            Ok(request) => request,
            Err(e) => return failure_from(e),
        };

        let request = match &options.body {
            Some(body) => request.json(body),
            None => request,
        };

        match self.send(request, "HTTP error! status").await {
            ApiResult::Success { data } => read_json(data).await,
            ApiResult::Failure { error, code } => ApiResult::failure(error, code),
        }
    }

    /// Uploads a file as multipart form data to `/files/upload`.
    pub async fn upload_file(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        metadata: Value,
    ) -> ApiResult<Value> {
        let request = match self
            .authorized_request(Method::POST, "/files/upload", None, &HashMap::new())
            .await
        {
            Ok(request) => request,
            Err(e) => return failure_from(e),
        };

        let form = Form::new()
            .part("file", Part::bytes(contents).file_name(file_name.to_string()))
            .text("metadata", metadata.to_string());

        tracing::debug!("📤 Uploading {}", file_name);
        match self.send(request.multipart(form), "Upload failed").await {
            ApiResult::Success { data } => read_json(data).await,
            ApiResult::Failure { error, code } => ApiResult::failure(error, code),
        }
    }

    /// Downloads a file's raw bytes.
    pub async fn download_file(&self, file_id: &str) -> ApiResult<Vec<u8>> {
        let endpoint = format!("/files/{}/download", path_segment(file_id));
        let request = match self
            .authorized_request(Method::GET, &endpoint, None, &HashMap::new())
            .await
        {
            Ok(request) => request,
            Err(e) => return failure_from(e),
        };

        let response = match self.send(request, "Download failed").await {
            ApiResult::Success { data } => data,
            ApiResult::Failure { error, code } => return ApiResult::failure(error, code),
        };

        match response.bytes().await {
            Ok(bytes) => ApiResult::success(bytes.to_vec()),
            Err(e) => failure_from(e.into()),
        }
    }

    /// 取得 token 並組好標頭；沒有 token 時不發出請求
    async fn authorized_request(
        &self,
        method: Method,
        endpoint: &str,
        content_type: Option<&'static str>,
        overrides: &HashMap<String, String>,
    ) -> Result<RequestBuilder> {
        let id_token = self.tokens.id_token().await.inspect_err(|e| {
            tracing::warn!("🔒 No identity token for {}: {}", endpoint, e);
        })?;
        let headers = self.build_headers(&id_token, content_type, overrides)?;
        let url = self.endpoint_url(endpoint);

        tracing::debug!("📡 {} {}", method, url);
        Ok(self
            .client
            .request(method, &url)
            .headers(headers)
            .timeout(self.timeout))
    }

    /// Non-2xx statuses become `"<prefix>: <status>"` failures.
    async fn send(&self, request: RequestBuilder, status_prefix: &str) -> ApiResult<Response> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("❌ API request failed: {}", e);
                return failure_from(e.into());
            }
        };

        let status = response.status();
        tracing::debug!("📡 Response status: {}", status);

        if !status.is_success() {
            return ApiResult::failure(
                format!("{}: {}", status_prefix, status.as_u16()),
                ErrorCode::from_status(status.as_u16()),
            );
        }
        ApiResult::success(response)
    }

    pub async fn request_with_retry(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> ApiResult<Value> {
        self.executor
            .execute(|| self.make_request(endpoint, options.clone()))
            .await
    }

    /// Runs any client call through the configured retry executor.
    pub async fn retry<T, F, Fut>(&self, operation: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        self.executor.execute(operation).await
    }

    /// Issues every request and reports each outcome separately, in input order.
    pub async fn batch_request(&self, requests: Vec<BatchRequest>) -> Vec<BatchOutcome> {
        let pending = requests
            .iter()
            .map(|r| self.make_request(&r.endpoint, r.options.clone()));
        let entries = settle_all_bounded(pending, self.concurrent_requests).await;

        requests
            .into_iter()
            .zip(entries)
            .map(|(request, entry)| BatchOutcome {
                request,
                result: entry.result,
            })
            .collect()
    }

    /// Like [`batch_request`](Self::batch_request), retrying each request on its own.
    pub async fn batch_request_with_retry(&self, requests: Vec<BatchRequest>) -> Vec<BatchOutcome> {
        let pending = requests
            .iter()
            .map(|r| self.request_with_retry(&r.endpoint, r.options.clone()));
        let entries = settle_all_bounded(pending, self.concurrent_requests).await;

        requests
            .into_iter()
            .zip(entries)
            .map(|(request, entry)| BatchOutcome {
                request,
                result: entry.result,
            })
            .collect()
    }

    fn build_headers(
        &self,
        id_token: &str,
        content_type: Option<&'static str>,
        overrides: &HashMap<String, String>,
    ) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(content_type) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", id_token))?);
        headers.insert(
            HeaderName::from_static("x-api-version"),
            header_value(&self.api_version)?,
        );
        headers.insert(
            HeaderName::from_static("x-client-type"),
            header_value(&self.client_type)?,
        );

        // 設定檔標頭先套用，單次請求的標頭最後覆蓋
        for (key, value) in self.default_headers.iter().chain(overrides.iter()) {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                ClientError::ValidationError {
                    message: format!("Invalid header name '{}': {}", key, e),
                }
            })?;
            headers.insert(name, header_value(value)?);
        }

        Ok(headers)
    }
}

/// Percent-encodes an id for use as a single path segment.
pub(crate) fn path_segment(id: &str) -> String {
    utf8_percent_encode(id, PATH_SEGMENT).to_string()
}

async fn read_json(response: Response) -> ApiResult<Value> {
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return failure_from(e.into()),
    };

    // 204 等空回應視為 null
    if bytes.is_empty() {
        return ApiResult::success(Value::Null);
    }

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(data) => ApiResult::success(data),
        Err(e) => failure_from(e.into()),
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ClientError::ValidationError {
        message: format!("Invalid header value: {}", e),
    })
}

fn failure_from<T>(error: ClientError) -> ApiResult<T> {
    ApiResult::failure(error.to_string(), error.error_code())
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}
