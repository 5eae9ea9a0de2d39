//! Error types for the reconciliation core

use thiserror::Error;

/// Main error type for reconciliation operations
///
/// These are the failures that abort a reconciliation attempt outright.
/// Remote rejections and ambiguous lookups are not errors — they are
/// reported through [`crate::Outcome`] so callers always receive a
/// structured result.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Transport-level failure from the HTTP client
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body did not have the expected shape
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl Error {
    /// Create a transport error with the given message
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a decode error with the given message
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = Error::transport("connection refused");
        assert!(err.to_string().contains("transport error"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_decode_error_display() {
        let err = Error::decode("list response missing pagination.total");
        assert!(err.to_string().contains("unexpected response shape"));
        assert!(err.to_string().contains("pagination.total"));
    }

    #[test]
    fn test_constructors_accept_str_and_string() {
        let err = Error::transport(format!("dns failure for {}", "rancher.example.com"));
        assert!(err.to_string().contains("rancher.example.com"));

        match Error::decode("static message") {
            Error::Decode(msg) => assert_eq!(msg, "static message"),
            _ => panic!("expected Decode variant"),
        }
    }
}
