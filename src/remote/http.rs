//! reqwest-backed remote contact store.

use serde::Deserialize;
use tokio::time::Duration;

use async_trait::async_trait;

use crate::{
    contact::{ContactDraft, ContactPatch, ContactRecord},
    remote::{RemoteError, RemoteResult, RemoteStore},
    retry::RetryPolicy,
    types::ContactId,
};

/// Connection settings for [`HttpContactStore`].
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Base URL of the store, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Transport-level attempts per call.
    pub request_attempts: u32,
    /// Backoff between transport attempts.
    pub retry: RetryPolicy,
}

impl HttpStoreConfig {
    /// Settings with the observed defaults for `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: 5_000,
            request_attempts: 2,
            retry: RetryPolicy::TRANSPORT,
        }
    }
}

/// HTTP/JSON implementation of [`RemoteStore`].
#[derive(Debug, Clone)]
pub struct HttpContactStore {
    base_url: String,
    timeout: Duration,
    request_attempts: u32,
    retry: RetryPolicy,
    http: reqwest::Client,
}

/// Structured error body on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpContactStore {
    /// Builds a client from `config`.
    pub fn new(config: HttpStoreConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.timeout_ms),
            request_attempts: config.request_attempts.max(1),
            retry: config.retry,
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_with_retry<F>(&self, build: F) -> RemoteResult<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last: Option<RemoteError> = None;

        for attempt in 0..self.request_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.retry.delay_for(attempt - 1)).await;
            }

            match build().timeout(self.timeout).send().await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_timeout() => {
                    last = Some(RemoteError::Timeout);
                }
                Err(err) => {
                    last = Some(RemoteError::Transport {
                        message: err.to_string(),
                    });
                }
            }
            tracing::debug!(attempt, "contact store request attempt failed");
        }

        Err(last.unwrap_or(RemoteError::Transport {
            message: "no attempts made".to_string(),
        }))
    }

    async fn decode<T>(response: reqwest::Response) -> RemoteResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| RemoteError::Transport {
                message: err.to_string(),
            })?;

        if !status.is_success() {
            return Err(Self::status_error(status.as_u16(), &bytes));
        }

        serde_json::from_slice(&bytes).map_err(|err| RemoteError::Decode {
            message: err.to_string(),
        })
    }

    async fn expect_success(response: reqwest::Response) -> RemoteResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let bytes = response.bytes().await.unwrap_or_default();
        Err(Self::status_error(status.as_u16(), &bytes))
    }

    /// 4xx carries a remote validation message and is not retried; other
    /// non-2xx statuses stay transient.
    fn status_error(status: u16, body: &[u8]) -> RemoteError {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .map(|b| b.error)
            .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string());

        if (400..500).contains(&status) {
            RemoteError::Rejected { message }
        } else {
            RemoteError::Http {
                status,
                body: message,
            }
        }
    }
}

#[async_trait]
impl RemoteStore for HttpContactStore {
    async fn list(&self) -> RemoteResult<Vec<ContactRecord>> {
        let url = self.endpoint("/contacts");
        let response = self.send_with_retry(|| self.http.get(&url)).await?;
        Self::decode(response).await
    }

    async fn create(&self, draft: &ContactDraft) -> RemoteResult<ContactRecord> {
        let url = self.endpoint("/contacts");
        let response = self
            .send_with_retry(|| self.http.post(&url).json(draft))
            .await?;
        Self::decode(response).await
    }

    async fn fetch(&self, id: ContactId) -> RemoteResult<ContactRecord> {
        let url = self.endpoint(&format!("/contacts/{id}"));
        let response = self.send_with_retry(|| self.http.get(&url)).await?;
        Self::decode(response).await
    }

    async fn update(&self, id: ContactId, patch: &ContactPatch) -> RemoteResult<ContactRecord> {
        let url = self.endpoint(&format!("/contacts/{id}"));
        let response = self
            .send_with_retry(|| self.http.put(&url).json(patch))
            .await?;
        Self::decode(response).await
    }

    async fn delete(&self, id: ContactId) -> RemoteResult<()> {
        let url = self.endpoint(&format!("/contacts/{id}"));
        let response = self.send_with_retry(|| self.http.delete(&url)).await?;
        Self::expect_success(response).await
    }
}
