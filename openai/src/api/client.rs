use reqwest::header::AUTHORIZATION;
use reqwest::multipart::Form;
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::common::ApiErrorResponse;
use super::error::{ApiError, ApiErrorDetails};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    admin_key: Option<String>,
    organization_id: Option<String>,
    retry_config: RetryConfig,
}

#[derive(Clone, Default)]
pub struct ClientConfig {
    /// Project key used for everything outside `/organization`
    pub api_key: Option<String>,
    /// Admin key used for `/organization` endpoints
    pub admin_key: Option<String>,
    /// Defaults to `DEFAULT_BASE_URL` when unset
    pub base_url: Option<String>,
    pub organization_id: Option<String>,
    pub retry: RetryConfig,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("admin_key", &self.admin_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("organization_id", &self.organization_id)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 120,
        }
    }
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let base_url = config
            .base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&base_url)?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.retry.timeout_seconds))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                api_key: config.api_key.filter(|k| !k.is_empty()),
                admin_key: config.admin_key.filter(|k| !k.is_empty()),
                organization_id: config.organization_id.filter(|o| !o.is_empty()),
                retry_config: config.retry,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn files(&self) -> super::files::FilesApi<'_> {
        super::files::FilesApi::new(self)
    }

    pub fn fine_tuning(&self) -> super::fine_tuning::FineTuningApi<'_> {
        super::fine_tuning::FineTuningApi::new(self)
    }

    pub fn models(&self) -> super::models::ModelsApi<'_> {
        super::models::ModelsApi::new(self)
    }

    pub fn assistants(&self) -> super::assistants::AssistantsApi<'_> {
        super::assistants::AssistantsApi::new(self)
    }

    pub fn vector_stores(&self) -> super::vector_stores::VectorStoresApi<'_> {
        super::vector_stores::VectorStoresApi::new(self)
    }

    pub fn projects(&self) -> super::projects::ProjectsApi<'_> {
        super::projects::ProjectsApi::new(self)
    }

    /// Execute a GET request with retry logic
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ApiError> {
        let auth = self.auth_header(path)?;
        self.execute_with_retry(|| self.request(Method::GET, path, &auth).send(), path)
            .await
    }

    /// Execute a POST request with a JSON body
    pub async fn post<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let auth = self.auth_header(path)?;
        self.execute_with_retry(
            || self.request(Method::POST, path, &auth).json(body).send(),
            path,
        )
        .await
    }

    /// Execute a POST request without a body
    pub async fn post_empty<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ApiError> {
        let auth = self.auth_header(path)?;
        self.execute_with_retry(|| self.request(Method::POST, path, &auth).send(), path)
            .await
    }

    /// Execute a multipart POST. The form is rebuilt for every attempt since
    /// a sent form cannot be reused.
    pub async fn post_multipart<T, F>(&self, path: &str, form: F) -> Result<T, ApiError>
    where
        T: for<'de> Deserialize<'de>,
        F: Fn() -> Form,
    {
        let auth = self.auth_header(path)?;
        self.execute_with_retry(
            || self.request(Method::POST, path, &auth).multipart(form()).send(),
            path,
        )
        .await
    }

    /// Execute a DELETE request with retry logic
    pub async fn delete<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ApiError> {
        let auth = self.auth_header(path)?;
        self.execute_with_retry(|| self.request(Method::DELETE, path, &auth).send(), path)
            .await
    }

    /// Organization endpoints take the admin key, everything else the
    /// project key.
    fn auth_header(&self, path: &str) -> Result<String, ApiError> {
        let (key, name) = if path.starts_with("/organization") {
            (&self.inner.admin_key, "admin_key")
        } else {
            (&self.inner.api_key, "api_key")
        };
        key.as_ref()
            .map(|key| format!("Bearer {}", key))
            .ok_or_else(|| {
                ApiError::AuthError(format!("{} is required to call {}", name, path))
            })
    }

    fn request(&self, method: Method, path: &str, auth: &str) -> RequestBuilder {
        let url = format!("{}{}", self.inner.base_url, path);
        tracing::debug!("{} request to: {}", method, url);

        let mut builder = self
            .inner
            .http_client
            .request(method, &url)
            .header(AUTHORIZATION, auth);
        if let Some(org) = &self.inner.organization_id {
            builder = builder.header("OpenAI-Organization", org);
        }
        if path.starts_with("/assistants") || path.starts_with("/vector_stores") {
            builder = builder.header("OpenAI-Beta", "assistants=v2");
        }
        builder
    }

    /// Execute request with retry logic
    async fn execute_with_retry<F, Fut, T>(&self, request_fn: F, path: &str) -> Result<T, ApiError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
        T: for<'de> Deserialize<'de>,
    {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.inner.retry_config.max_retries {
            if attempt > 0 {
                let backoff = std::cmp::min(
                    self.inner.retry_config.initial_backoff_ms * (2_u64.pow(attempt - 1)),
                    self.inner.retry_config.max_backoff_ms,
                );
                tracing::debug!(
                    "Retrying request to {} after {}ms (attempt {})",
                    path,
                    backoff,
                    attempt
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            match request_fn().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return self.parse_success_response(response).await;
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(ApiError::RateLimited);
                    } else if status.is_server_error() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return self.handle_error_response(response).await;
                    }
                }
                Err(e) => {
                    if e.is_timeout() {
                        last_error =
                            Some(ApiError::Timeout(self.inner.retry_config.timeout_seconds));
                    } else if e.is_connect() {
                        last_error = Some(ApiError::RequestError(e));
                    } else {
                        return Err(ApiError::RequestError(e));
                    }
                }
            }

            attempt += 1;
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    /// Parse successful response
    async fn parse_success_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;

        serde_json::from_str::<T>(&text).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
            ApiError::ParseError(e.to_string())
        })
    }

    /// Handle error response
    async fn handle_error_response<T>(&self, response: reqwest::Response) -> Result<T, ApiError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let (message, details) = match serde_json::from_str::<ApiErrorResponse>(&text) {
            Ok(body) if !body.error.message.is_empty() => {
                (body.error.message, Some(Box::new(body.error.details)))
            }
            _ => (text, None::<Box<ApiErrorDetails>>),
        };
        tracing::debug!("API error response (HTTP {}): {}", status, message);

        if status == 401 {
            return Err(ApiError::AuthError(message));
        }

        Err(ApiError::ApiError {
            status,
            message,
            details,
        })
    }
}
