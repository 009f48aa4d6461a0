//! Transport error types for the tax service client.

use thiserror::Error;

/// Failures talking to the remote tax service.
///
/// Timeouts, connection failures and 5xx responses are transient and may be
/// retried by the caller with the same document code. Everything else is
/// fatal for the request as sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("connection error calling {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    /// The service returned a 5xx status.
    #[error("{endpoint} returned {status}: {body}")]
    Server {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The service rejected the request with a 4xx status.
    #[error("{endpoint} rejected request with {status}: {body}")]
    Client {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("client configuration error: {0}")]
    Configuration(String),
}

impl TransportError {
    /// Returns true for timeouts, connection failures and 5xx responses.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout { .. }
                | TransportError::Connection { .. }
                | TransportError::Server { .. }
        )
    }

    /// HTTP status carried by the error, if the service answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Server { status, .. } | TransportError::Client { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_retryable_errors() {
        let timeout = TransportError::Timeout {
            endpoint: "create".into(),
        };
        let server = TransportError::Server {
            endpoint: "create".into(),
            status: 503,
            body: "unavailable".into(),
        };
        let client = TransportError::Client {
            endpoint: "create".into(),
            status: 400,
            body: "InvalidAddress".into(),
        };
        let decode = TransportError::Decode {
            endpoint: "create".into(),
            reason: "missing field `code`".into(),
        };

        assert!(timeout.is_retryable());
        assert!(server.is_retryable());
        assert!(!client.is_retryable());
        assert!(!decode.is_retryable());
        assert!(!TransportError::Configuration("no url".into()).is_retryable());
    }

    #[test]
    fn status_is_exposed_for_http_errors() {
        let client = TransportError::Client {
            endpoint: "get".into(),
            status: 404,
            body: String::new(),
        };
        assert_eq!(client.status(), Some(404));
        assert_eq!(
            TransportError::Timeout {
                endpoint: "get".into()
            }
            .status(),
            None
        );
    }
}
