//! Typed failure taxonomy shared by the OTP and token engines.
//!
//! Engines never swallow these; handlers translate them into transport
//! responses. Storage failures are carried separately so a database outage
//! is never mistaken for a bad credential.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// A resend was requested before the minimum resend interval elapsed.
    #[error("code already sent, retry in {retry_after_seconds}s")]
    Throttled { retry_after_seconds: i64 },

    /// The challenge attempt counter reached the configured maximum.
    #[error("too many attempts, request a new code")]
    AttemptsExceeded,

    /// A challenge or token is past its expiry.
    #[error("expired")]
    Expired,

    /// The submitted code does not match the live challenge.
    #[error("invalid code, {remaining} attempts remaining")]
    InvalidCode { remaining: u32 },

    /// No live challenge, or the principal is missing. Deliberately a
    /// single variant so callers cannot distinguish the two.
    #[error("not found")]
    NotFound,

    /// Tampered token, or a token signed for a different
    /// (principal kind, token kind) pair. Treat as hostile input.
    #[error("invalid signature")]
    InvalidSignature,

    /// Gateway strict mode, user principal expected: surfaced as 401.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Gateway strict mode, admin principal expected: surfaced as 403.
    #[error("forbidden")]
    Forbidden,

    /// Store or I/O failure unrelated to the credential itself.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Transport status for handlers translating engine failures.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Throttled { .. } | Self::AttemptsExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::Expired | Self::InvalidCode { .. } | Self::InvalidSignature => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            AuthError::Throttled {
                retry_after_seconds: 30
            }
            .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AuthError::AttemptsExceeded.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(AuthError::Expired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AuthError::InvalidCode { remaining: 2 }.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AuthError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AuthError::InvalidSignature.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::Unauthenticated.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::Forbidden.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn invalid_code_reports_remaining() {
        let err = AuthError::InvalidCode { remaining: 3 };
        assert_eq!(err.to_string(), "invalid code, 3 attempts remaining");
    }

    #[test]
    fn throttled_reports_wait() {
        let err = AuthError::Throttled {
            retry_after_seconds: 42,
        };
        assert_eq!(err.to_string(), "code already sent, retry in 42s");
    }
}
