//! Error types for job API operations.
//!
//! Errors are categorized so callers can log an actionable hint next to a
//! failed item. Batch operations never propagate these; they downgrade the
//! batch result instead.

use std::fmt;

/// Result type alias for job API operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of job API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection, DNS, TLS or timeout problems (transient).
    Network,
    /// The API rejected the credential.
    Auth,
    /// The API rejected the request (bad payload, unknown job, ...).
    Api,
    /// The API answered with something we could not decode.
    InvalidResponse,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether a fresh invocation is likely to succeed without changes.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Auth => "Authentication failed",
            Self::Api => "Request rejected by the API",
            Self::InvalidResponse => "Invalid API response",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check connectivity to the API and re-run",
            Self::Auth => "Check that SERVICE_PRINCIPAL_TOKEN is set and still valid",
            Self::Api => "Check the job payload and that the job still exists",
            Self::InvalidResponse => "The API may have changed; check the endpoint URLs",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to the job API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed (transport error or non-2xx status).
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// Response body could not be decoded.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Payload could not be encoded.
    #[error("failed to encode payload: {0}")]
    Encode(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// HTTP status code, when the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            _ => None,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Http {
                status: Some(401 | 403),
                ..
            } => ErrorCategory::Auth,
            Self::Http {
                status: Some(code), ..
            } if *code >= 500 => ErrorCategory::Network,
            Self::Http {
                status: Some(_), ..
            } => ErrorCategory::Api,
            Self::Http { status: None, .. } => ErrorCategory::Network,
            Self::InvalidResponse(_) => ErrorCategory::InvalidResponse,
            Self::Encode(_) | Self::Other(_) => ErrorCategory::Other,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {}", code),
                status: Some(code),
            },
            ureq::Error::Json(e) => Self::InvalidResponse(e.to_string()),
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
