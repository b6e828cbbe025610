use thiserror::Error;

#[derive(Debug, Error)]
pub enum MirageError {
    /// Both the direct attempt and the proxy fallback failed.
    #[error("transport failed: {message}")]
    TransportFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("upstream timeout after {elapsed_ms}ms")]
    UpstreamTimeout { elapsed_ms: u64 },

    /// The call succeeded but no usable artifact could be extracted.
    #[error("unexpected response shape: {0}")]
    UnexpectedResponse(String),

    /// The provider's own error field reported the failure.
    #[error("provider reported failure: {message}")]
    ProviderFailure {
        code: Option<i64>,
        message: String,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("feature not configured: {0}")]
    NotConfigured(&'static str),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
}

impl MirageError {
    /// Returns true for transient errors that may succeed on retry.
    /// Cancellation is never retryable — it is a caller decision, not a failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TransportFailed { status, .. } => match status {
                // 5xx = server error (retryable), 4xx = client error (not retryable)
                Some(s) => *s >= 500,
                // no status = network-level failure, may be transient
                None => true,
            },
            Self::UpstreamTimeout { .. } => true,
            Self::Request(_) => true,
            _ => false,
        }
    }

    /// Returns true when the provider does not know the requested resource.
    /// The poller treats this differently on the first tick (indexing delay)
    /// than on later ticks (the task is gone).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::TransportFailed { status: Some(404), .. }
                | Self::ProviderFailure { code: Some(404), .. }
        )
    }

    /// Produce a sanitized message safe for user-visible status text.
    /// Does not leak internal URLs or raw upstream error bodies.
    pub fn user_message(&self) -> String {
        match self {
            Self::TransportFailed { status, .. } => match status {
                Some(s) => format!("generation service unavailable (HTTP {s})"),
                None => "generation service unavailable".to_string(),
            },
            Self::UpstreamTimeout { .. } => {
                "the provider took too long to respond — try again".to_string()
            }
            Self::UnexpectedResponse(_) => {
                "the provider returned an unexpected response".to_string()
            }
            Self::ProviderFailure { message, .. } => format!("generation failed: {message}"),
            Self::Cancelled => "cancelled".to_string(),
            Self::NotConfigured(feature) => format!("{feature} generation is not configured"),
            Self::Request(_) => "request to provider failed".to_string(),
        }
    }
}
