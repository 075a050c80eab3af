//! Errors raised by outbound service clients.

use std::time::Duration;

/// Failure talking to an external collaborator.
///
/// `service` names the collaborator (`"openai"`, `"github"`, `"printify"`,
/// `"shopify"`) so a mixed failure list stays readable.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CollaboratorError {
    /// Non-success HTTP status.
    #[error("{service} HTTP {status}: {message}")]
    Http {
        service: &'static str,
        status: u16,
        message: String,
    },

    /// The configured timeout elapsed.
    #[error("{service} request timed out")]
    Timeout { service: &'static str },

    /// HTTP 429 persisted after all retries.
    #[error("{service} rate limited (retry after {retry_after:?})")]
    RateLimited {
        service: &'static str,
        retry_after: Option<Duration>,
    },

    /// Credentials rejected (401/403).
    #[error("{service} authentication failed: {message}")]
    Auth {
        service: &'static str,
        message: String,
    },

    /// Response body did not have the expected shape.
    #[error("{service} response could not be decoded: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    /// Connection failure or a request that could not be built.
    #[error("{service} request failed: {message}")]
    Request {
        service: &'static str,
        message: String,
    },
}

impl CollaboratorError {
    /// Classify a transport error.
    pub fn from_reqwest(service: &'static str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { service }
        } else if err.is_decode() {
            Self::Decode {
                service,
                message: err.to_string(),
            }
        } else {
            Self::Request {
                service,
                message: err.to_string(),
            }
        }
    }

    pub fn decode(service: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            service,
            message: message.into(),
        }
    }

    pub fn request(service: &'static str, message: impl Into<String>) -> Self {
        Self::Request {
            service,
            message: message.into(),
        }
    }

    pub fn service(&self) -> &'static str {
        match self {
            Self::Http { service, .. }
            | Self::Timeout { service }
            | Self::RateLimited { service, .. }
            | Self::Auth { service, .. }
            | Self::Decode { service, .. }
            | Self::Request { service, .. } => service,
        }
    }

    /// Whether repeating the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::RateLimited { .. } | Self::Request { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            Self::Auth { .. } | Self::Decode { .. } => false,
        }
    }
}
