//! Completion error types

use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

/// Completion failure with a coarse classification
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Network, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::ServerError, message)
    }

    /// The provider answered, but not with anything usable
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Malformed, message)
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: StatusCode, detail: &str) -> Self {
        let kind = match status.as_u16() {
            400 | 404 => LlmErrorKind::InvalidRequest,
            401 | 403 => LlmErrorKind::Auth,
            408 => LlmErrorKind::Timeout,
            429 => LlmErrorKind::RateLimit,
            500..=599 => LlmErrorKind::ServerError,
            _ => LlmErrorKind::Unknown,
        };
        Self::new(kind, format!("HTTP {status}: {detail}"))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            LlmErrorKind::Timeout
        } else if e.is_connect() {
            LlmErrorKind::Network
        } else if e.is_decode() {
            LlmErrorKind::Malformed
        } else {
            LlmErrorKind::Unknown
        };
        Self::new(kind, e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    Network,
    Timeout,
    RateLimit,
    ServerError,
    Auth,
    InvalidRequest,
    /// Unparseable body, or a reply with no text
    Malformed,
    Unknown,
}

impl LlmErrorKind {
    /// Whether the same request could succeed if sent again later
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimit | Self::ServerError
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::RateLimit => "rate_limit",
            Self::ServerError => "server_error",
            Self::Auth => "auth",
            Self::InvalidRequest => "invalid_request",
            Self::Malformed => "malformed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let cases = [
            (StatusCode::BAD_REQUEST, LlmErrorKind::InvalidRequest, false),
            (StatusCode::FORBIDDEN, LlmErrorKind::Auth, false),
            (StatusCode::TOO_MANY_REQUESTS, LlmErrorKind::RateLimit, true),
            (StatusCode::SERVICE_UNAVAILABLE, LlmErrorKind::ServerError, true),
            (StatusCode::IM_A_TEAPOT, LlmErrorKind::Unknown, false),
        ];

        for (status, kind, transient) in cases {
            let err = LlmError::from_status(status, "quota");
            assert_eq!(err.kind, kind, "{status}");
            assert_eq!(err.kind.is_transient(), transient, "{status}");
            assert!(err.message.contains("quota"));
        }
    }

    #[test]
    fn test_display_includes_kind() {
        let err = LlmError::malformed("no candidates");
        assert_eq!(err.to_string(), "malformed: no candidates");
    }
}
