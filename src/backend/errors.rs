use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single request against the sensor backend.
///
/// The client never retries; callers decide what a failure means for their
/// view (usually: keep the last good snapshot and wait for the next tick).
#[derive(Debug, Error)]
pub enum ApiError {
    /// Backend unreachable, DNS failure, connection reset or timeout.
    #[error("network error on {path}: {source}")]
    Network {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// Backend answered with a non-2xx status. The body is not inspected.
    #[error("backend returned {status} for {path}")]
    Http { path: String, status: StatusCode },

    /// Response body did not match the expected shape.
    #[error("malformed response from {path}: {reason}")]
    Decode { path: String, reason: String },
}

impl ApiError {
    pub(crate) fn decode(path: &str, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.to_owned(),
            reason: reason.to_string(),
        }
    }

    /// `true` when the request never got a response (including timeouts).
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Network { source, .. } if source.is_timeout())
    }

    /// HTTP status for [`ApiError::Http`], `None` otherwise.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
