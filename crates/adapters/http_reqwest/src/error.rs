//! HTTP-specific error type wrapping reqwest errors.

use signage_domain::error::SignageError;

/// Errors originating from the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The configured server URL cannot be used.
    #[error("invalid base url {0:?}")]
    InvalidBaseUrl(String),

    /// The request could not be sent or its body could not be read.
    #[error("request failed")]
    Request(#[from] reqwest::Error),

    /// The server answered with an unexpected status.
    #[error("{url} answered {status}")]
    Status { url: String, status: u16 },

    /// A server-sent event frame grew past the decoder limit.
    #[error("event stream frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },

    /// The server answered `304` for a resource that was never cached.
    #[error("{0} answered 304 but nothing is cached")]
    NotModifiedWithoutCache(&'static str),
}

impl From<HttpError> for SignageError {
    fn from(err: HttpError) -> Self {
        Self::network(err)
    }
}
