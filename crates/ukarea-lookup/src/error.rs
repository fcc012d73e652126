use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by postcodes API (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("batch of {size} points exceeds the per-request cap of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("invalid base URL \"{url}\": {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("query superseded by a newer search")]
    Superseded,
}

impl LookupError {
    /// True when the failure came from the remote service or the network,
    /// as opposed to a local rejection or a cancelled query.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            LookupError::Http(_)
                | LookupError::Deserialize { .. }
                | LookupError::RateLimited { .. }
                | LookupError::UnexpectedStatus { .. }
        )
    }
}
