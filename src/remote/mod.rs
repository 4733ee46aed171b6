//! Remote contact-store boundary.

/// HTTP implementation of the remote store.
pub mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    contact::{ContactDraft, ContactPatch, ContactRecord},
    types::ContactId,
};

/// Failure taxonomy for remote calls.
///
/// Everything except [`RemoteError::Rejected`] is considered transient and
/// eligible for retry with backoff.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("transport failure: {message}")]
    Transport {
        /// Underlying transport error text.
        message: String,
    },
    #[error("request timed out")]
    Timeout,
    #[error("http {status}: {body}")]
    Http {
        /// Response status code.
        status: u16,
        /// Raw response body, possibly empty.
        body: String,
    },
    #[error("rejected by remote: {message}")]
    Rejected {
        /// Remote-provided validation message.
        message: String,
    },
    #[error("response decode failed: {message}")]
    Decode {
        /// Serde error text.
        message: String,
    },
}

impl RemoteError {
    /// True for failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// Result alias for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// The remote contact store at its interface boundary.
///
/// The sync engine owns one of these behind a `Box`/`Arc`; tests inject
/// scripted fakes.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches the full authoritative collection.
    async fn list(&self) -> RemoteResult<Vec<ContactRecord>>;

    /// Creates a record; the remote assigns the id.
    async fn create(&self, draft: &ContactDraft) -> RemoteResult<ContactRecord>;

    /// Fetches one record.
    async fn fetch(&self, id: ContactId) -> RemoteResult<ContactRecord>;

    /// Commits a sparse update and returns the authoritative record.
    async fn update(&self, id: ContactId, patch: &ContactPatch) -> RemoteResult<ContactRecord>;

    /// Deletes a record.
    async fn delete(&self, id: ContactId) -> RemoteResult<()>;
}
