//! Errors from the backend REST API.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP 429. `retry_after_ms` comes from the `Retry-After` header when present.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Any other non-2xx response.
    #[error("API error (status {status}): {message}")]
    Status { status: u16, message: String },

    /// DNS, connection refused, timeout, or an undecodable body.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ApiError {
    /// Whether trying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::RateLimited { .. } | ApiError::Network(_) => true,
            ApiError::Status { status, .. } => *status >= 500,
            ApiError::JobNotFound(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_display() {
        let err = ApiError::RateLimited {
            retry_after_ms: 5000,
        };
        assert_eq!(err.to_string(), "rate limited, retry after 5000ms");
    }

    #[test]
    fn status_display() {
        let err = ApiError::Status {
            status: 422,
            message: "invalid tender".into(),
        };
        assert_eq!(err.to_string(), "API error (status 422): invalid tender");
    }

    #[test]
    fn transient_classification() {
        assert!(ApiError::RateLimited { retry_after_ms: 1 }.is_transient());
        assert!(
            ApiError::Status {
                status: 503,
                message: String::new()
            }
            .is_transient()
        );
        assert!(
            !ApiError::Status {
                status: 400,
                message: String::new()
            }
            .is_transient()
        );
        assert!(!ApiError::JobNotFound("J-1".into()).is_transient());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ApiError>();
    }
}
