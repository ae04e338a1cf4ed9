use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by the dashboard API boundary.
///
/// Rate limiting is its own variant so callers can tell it apart from other
/// transient failures; both are retried by [`super::retry_with_backoff`].
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ApiError {
    #[error("Rate limited by dashboard API{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Transient API failure: {message}")]
    Transient { status: Option<u16>, message: String },

    #[error("API request rejected with status {status}: {message}")]
    Permanent { status: u16, message: String },

    #[error("Invalid API response: {message}")]
    InvalidResponse { message: String },

    #[error("HTTP client error: {message}")]
    Client { message: String },
}

impl ApiError {
    /// Whether the failure may succeed if the same request is sent again
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited { .. } | ApiError::Transient { .. }
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }

    /// Server-requested wait, in milliseconds
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ApiError::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(secs.saturating_mul(1000)),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RateLimited { .. } => Some(429),
            ApiError::Transient { status, .. } => *status,
            ApiError::Permanent { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn from_transport(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() || error.is_request() {
            ApiError::Transient {
                status: None,
                message: error.to_string(),
            }
        } else if error.is_decode() {
            ApiError::InvalidResponse {
                message: error.to_string(),
            }
        } else {
            ApiError::Client {
                message: error.to_string(),
            }
        }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, message: String, retry_after_secs: Option<u64>) -> Self {
        match status {
            429 => ApiError::RateLimited { retry_after_secs },
            500..=599 => ApiError::Transient {
                status: Some(status),
                message,
            },
            _ => ApiError::Permanent { status, message },
        }
    }
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (retry after {}s)", secs),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(ApiError::from_status(429, String::new(), Some(2)).is_rate_limited());
        assert!(ApiError::from_status(503, "unavailable".into(), None).is_transient());
        assert!(!ApiError::from_status(400, "bad".into(), None).is_transient());
        assert!(!ApiError::from_status(403, "forbidden".into(), None).is_transient());
    }

    #[test]
    fn test_retry_after_is_reported_in_millis() {
        let err = ApiError::RateLimited {
            retry_after_secs: Some(3),
        };
        assert_eq!(err.retry_after_ms(), Some(3000));
        assert_eq!(err.status(), Some(429));

        let err = ApiError::Transient {
            status: Some(502),
            message: "bad gateway".into(),
        };
        assert_eq!(err.retry_after_ms(), None);
    }

    #[test]
    fn test_rate_limit_message_shows_plain_seconds() {
        let err = ApiError::RateLimited {
            retry_after_secs: Some(3),
        };
        assert_eq!(err.to_string(), "Rate limited by dashboard API (retry after 3s)");

        let err = ApiError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(err.to_string(), "Rate limited by dashboard API");
    }
}
