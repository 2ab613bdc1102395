//! The pipeline-backed HTTP client.
//!
//! [`ApiClient`] is the "raw" surface: every call returns `Result<T, ApiError>`
//! and errors propagate. [`ApiClient::enveloped`] is the "standard" surface:
//! calls return a [`BaseResponse`] and fold errors into it.
//!
//! Clients are independent by default. [`init_global`] additionally installs
//! one shared instance that [`global`] hands out; reading it before
//! initialization is an [`ApiError::NotInitialized`] rather than a panic.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest_middleware as rqm;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
#[cfg(feature = "telemetry")]
use tracing::{debug, instrument};
use url::Url;

use crate::constants::{DEFAULT_TIMEOUT, FORM_CONTENT_TYPE};
use crate::error::ApiError;
use crate::plugins::{BearerAuth, LimitBodySize, PreventRepeat, Retry, Unauthorized};

/// Which pipeline stages run.
///
/// Composition order is fixed regardless of how the options are filled in:
/// bearer auth, body-size limit, dedup, unauthorized detection, retry,
/// network.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Adds `Authorization: Bearer <token>`.
    pub bearer_auth: Option<BearerAuth>,
    /// Rejects oversized POST/PUT/PATCH bodies locally.
    pub limit_body_size: Option<LimitBodySize>,
    /// Cancels in-flight duplicates.
    pub prevent_repeat: Option<PreventRepeat>,
    /// Reports invalid-session responses.
    pub unauthorized: Option<Unauthorized>,
    /// Retries network failures and idempotent 5xx responses.
    pub retry: Option<Retry>,
}

impl PipelineOptions {
    /// Options with only the default [`Retry`] stage enabled.
    #[must_use]
    pub fn with_default_retry() -> Self {
        Self {
            retry: Some(Retry::default()),
            ..Self::default()
        }
    }
}

/// Builder for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiClientBuilder {
    base_url: String,
    timeout: Duration,
    headers: HeaderMap,
    pipeline: PipelineOptions,
}

impl ApiClientBuilder {
    /// Sets the per-request timeout. A timeout is reported as a network
    /// error and is subject to retry.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a header sent with every request.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the pipeline stages.
    #[must_use]
    pub fn pipeline(mut self, pipeline: PipelineOptions) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Enables the [`BearerAuth`] stage.
    #[must_use]
    pub fn bearer_auth(mut self, stage: BearerAuth) -> Self {
        self.pipeline.bearer_auth = Some(stage);
        self
    }

    /// Enables the [`LimitBodySize`] stage.
    #[must_use]
    pub fn limit_body_size(mut self, stage: LimitBodySize) -> Self {
        self.pipeline.limit_body_size = Some(stage);
        self
    }

    /// Enables the [`PreventRepeat`] stage.
    #[must_use]
    pub fn prevent_repeat(mut self, stage: PreventRepeat) -> Self {
        self.pipeline.prevent_repeat = Some(stage);
        self
    }

    /// Enables the [`Unauthorized`] stage.
    #[must_use]
    pub fn unauthorized(mut self, stage: Unauthorized) -> Self {
        self.pipeline.unauthorized = Some(stage);
        self
    }

    /// Enables the [`Retry`] stage.
    #[must_use]
    pub fn retry(mut self, stage: Retry) -> Self {
        self.pipeline.retry = Some(stage);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if the base URL does not parse, or
    /// [`ApiError::Build`] if the reqwest client cannot be constructed.
    pub fn build(self) -> Result<ApiClient, ApiError> {
        let base_url = self.base_url.trim_end_matches('/').to_owned();
        Url::parse(&base_url).map_err(|source| ApiError::InvalidUrl {
            url: base_url.clone(),
            source,
        })?;

        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .default_headers(self.headers)
            .build()
            .map_err(ApiError::Build)?;

        let PipelineOptions {
            bearer_auth,
            limit_body_size,
            prevent_repeat,
            unauthorized,
            retry,
        } = self.pipeline;

        let mut chain = rqm::ClientBuilder::new(http);
        if let Some(stage) = bearer_auth {
            chain = chain.with(stage);
        }
        if let Some(stage) = limit_body_size {
            chain = chain.with(stage);
        }
        if let Some(stage) = prevent_repeat.clone() {
            chain = chain.with(stage);
        }
        if let Some(stage) = unauthorized {
            chain = chain.with(stage);
        }
        if let Some(stage) = retry {
            chain = chain.with(stage);
        }

        Ok(ApiClient {
            base_url,
            http: chain.build(),
            prevent_repeat,
        })
    }
}

/// HTTP client whose requests run through the configured pipeline.
///
/// Cloning is cheap and clones share the connection pool and dedup registry.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http: rqm::ClientWithMiddleware,
    prevent_repeat: Option<PreventRepeat>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("prevent_repeat", &self.prevent_repeat)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Starts a builder with a 10 second timeout and no stages.
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            headers: HeaderMap::new(),
            pipeline: PipelineOptions::default(),
        }
    }

    /// Returns the base URL, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Number of requests the dedup stage currently tracks as in flight.
    /// Always zero when the stage is disabled.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.prevent_repeat
            .as_ref()
            .map_or(0, PreventRepeat::pending_len)
    }

    /// Resolves `path` against the base URL.
    ///
    /// Absolute `http(s)://` paths are used as given; anything else is
    /// appended to the base URL, keeping any query string in `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if the result does not parse.
    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        let joined = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_owned()
        } else if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        };
        Url::parse(&joined).map_err(|source| ApiError::InvalidUrl {
            url: joined,
            source,
        })
    }

    /// Returns the "standard" view that folds errors into [`BaseResponse`].
    #[must_use]
    pub const fn enveloped(&self) -> Enveloped<'_> {
        Enveloped { client: self }
    }

    /// `GET path`.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] on local rejection, transport failure, non-2xx
    /// status or a body that does not decode as `T`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path)?;
        self.send(self.http.get(url)).await
    }

    /// `GET path?query`, with `query` form-encoded and appended to any query
    /// already present in `path`.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn get_query<T, I, K, V>(&self, path: &str, query: I) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut url = self.url(path)?;
        url.query_pairs_mut().extend_pairs(query);
        self.send(self.http.get(url)).await
    }

    /// `POST path` with an `application/x-www-form-urlencoded` body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn post_form<T, I, K, V>(&self, path: &str, form: I) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let url = self.url(path)?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();
        let request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
            .body(body);
        self.send(request).await
    }

    /// `POST path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(path)?;
        self.send(self.http.post(url).json(body)).await
    }

    /// `PUT path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn put_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(path)?;
        self.send(self.http.put(url).json(body)).await
    }

    /// `PATCH path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn patch_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(path)?;
        self.send(self.http.patch(url).json(body)).await
    }

    /// `DELETE path`.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path)?;
        self.send(self.http.delete(url)).await
    }

    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "paygw.http.send", skip_all, err)
    )]
    async fn send<T: DeserializeOwned>(&self, request: rqm::RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await.map_err(ApiError::from_middleware)?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(ApiError::from)?;

        #[cfg(feature = "telemetry")]
        debug!(%status, bytes = body.len(), "received response");

        if !status.is_success() {
            return Err(ApiError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        serde_json::from_slice(&body).map_err(ApiError::Decode)
    }
}

/// The standard `{ code, message, data }` response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseResponse<T> {
    /// Business status code.
    pub code: i64,
    /// Human-readable message.
    #[serde(default, alias = "msg")]
    pub message: String,
    /// Payload, absent on failure.
    pub data: Option<T>,
}

impl<T> BaseResponse<T> {
    /// Folds an error into an envelope.
    ///
    /// A non-2xx response whose body is itself an envelope is passed through
    /// (its `data` dropped); otherwise `code` is the HTTP status, or 500 when
    /// there is none, and `message` is the error text.
    #[must_use]
    pub fn from_error(err: &ApiError) -> Self {
        if let ApiError::Status { status, body } = err {
            if let Ok(envelope) = serde_json::from_str::<BaseResponse<serde_json::Value>>(body) {
                return Self {
                    code: envelope.code,
                    message: envelope.message,
                    data: None,
                };
            }
            return Self {
                code: i64::from(status.as_u16()),
                message: err.to_string(),
                data: None,
            };
        }
        Self {
            code: 500,
            message: err.to_string(),
            data: None,
        }
    }
}

/// Standard-surface view of an [`ApiClient`]; see [`ApiClient::enveloped`].
#[derive(Debug, Clone, Copy)]
pub struct Enveloped<'a> {
    client: &'a ApiClient,
}

fn fold<T>(result: Result<BaseResponse<T>, ApiError>) -> BaseResponse<T> {
    result.unwrap_or_else(|err| BaseResponse::from_error(&err))
}

impl Enveloped<'_> {
    /// `GET path`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> BaseResponse<T> {
        fold(self.client.get(path).await)
    }

    /// `GET path?query`.
    pub async fn get_query<T, I, K, V>(&self, path: &str, query: I) -> BaseResponse<T>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        fold(self.client.get_query(path, query).await)
    }

    /// `POST path` with a form body.
    pub async fn post_form<T, I, K, V>(&self, path: &str, form: I) -> BaseResponse<T>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        fold(self.client.post_form(path, form).await)
    }

    /// `POST path` with a JSON body.
    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> BaseResponse<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        fold(self.client.post_json(path, body).await)
    }

    /// `PUT path` with a JSON body.
    pub async fn put_json<T, B>(&self, path: &str, body: &B) -> BaseResponse<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        fold(self.client.put_json(path, body).await)
    }

    /// `PATCH path` with a JSON body.
    pub async fn patch_json<T, B>(&self, path: &str, body: &B) -> BaseResponse<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        fold(self.client.patch_json(path, body).await)
    }

    /// `DELETE path`.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> BaseResponse<T> {
        fold(self.client.delete(path).await)
    }
}

static GLOBAL: OnceLock<ApiClient> = OnceLock::new();

/// Builds and installs the process-wide client.
///
/// Only the first successful call builds anything; later calls return the
/// installed client and ignore `builder`.
///
/// # Errors
///
/// Returns the build error if no client is installed yet and `builder`
/// fails to build.
pub fn init_global(builder: ApiClientBuilder) -> Result<&'static ApiClient, ApiError> {
    if let Some(client) = GLOBAL.get() {
        return Ok(client);
    }
    let client = builder.build()?;
    Ok(GLOBAL.get_or_init(|| client))
}

/// Returns the process-wide client.
///
/// # Errors
///
/// Returns [`ApiError::NotInitialized`] before [`init_global`] has succeeded.
pub fn global() -> Result<&'static ApiClient, ApiError> {
    GLOBAL.get().ok_or(ApiError::NotInitialized)
}
