use std::time::Duration;
use thiserror::Error;

/// Typed failure taxonomy for all outbound provider calls.
///
/// The pipeline distinguishes between failures that are retried internally
/// (`RateLimitExceeded`, `Unavailable`, `Timeout`), failures that propagate
/// immediately (`Rejected`), and the provider's empty-result sentinel
/// (`NoDataFound`), which callers treat as success with an empty collection.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP 429 or an explicit rate-limit response. Retried with backoff,
    /// never surfaced to the caller directly.
    #[error("provider rate limit exceeded")]
    RateLimitExceeded,

    /// HTTP 5xx, connection failure, or a malformed response body.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The hard per-request timeout fired.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A non-retryable client error (4xx other than 429).
    #[error("provider rejected request (HTTP {status})")]
    Rejected { status: u16 },

    /// The provider's "no records" sentinel.
    #[error("no data found")]
    NoDataFound,
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimitExceeded
                | ProviderError::Unavailable(_)
                | ProviderError::Timeout(_)
        )
    }

    /// Classify an HTTP status into the taxonomy. `None` means success.
    pub fn from_status(status: reqwest::StatusCode) -> Option<ProviderError> {
        if status.is_success() {
            return None;
        }
        Some(match status.as_u16() {
            429 => ProviderError::RateLimitExceeded,
            404 => ProviderError::NoDataFound,
            s if (500..600).contains(&s) => {
                ProviderError::Unavailable(format!("HTTP {}", s))
            }
            s => ProviderError::Rejected { status: s },
        })
    }

    /// Classify an ethers provider error. The JSON-RPC layer does not expose
    /// structured status codes for every transport, so this sniffs the
    /// message for the rate-limit and timeout cases.
    pub fn from_ethers(err: ethers::providers::ProviderError) -> ProviderError {
        let msg = err.to_string();
        let lowered = msg.to_lowercase();
        if lowered.contains("429") || lowered.contains("rate limit") || lowered.contains("too many requests") {
            ProviderError::RateLimitExceeded
        } else if lowered.contains("timed out") || lowered.contains("timeout") {
            ProviderError::Timeout(Duration::from_secs(0))
        } else {
            ProviderError::Unavailable(msg)
        }
    }
}
