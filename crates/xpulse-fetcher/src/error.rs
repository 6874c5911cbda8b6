use thiserror::Error;

/// Errors returned by the content API client and the paginated fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by content API (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    /// 401 or 403. Retrying with the same credential cannot succeed.
    #[error("content API rejected the credential (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("unexpected HTTP {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("pagination limit reached for {subject} after {max_pages} pages")]
    PaginationLimit { subject: String, max_pages: usize },

    #[error("invalid API base URL '{0}'")]
    InvalidBaseUrl(String),

    #[error("XPULSE_API_KEY is not set")]
    MissingApiKey,

    #[error("fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Errors that will recur for every subject of a run, so continuing the
    /// run is pointless.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FetchError::Unauthorized { .. } | FetchError::MissingApiKey | FetchError::Cancelled
        )
    }
}
