//! Authentication / authorization failure taxonomy.
//!
//! Kept independent from `AppError` (HTTP) so services can be exercised without axum;
//! the mapping to status codes lives in `crate::error`.
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Malformed, expired or badly signed access token.
    #[error("invalid credential")]
    InvalidCredential,

    /// No identity was established for a call that needs one.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Refresh token unknown, expired, consumed or revoked.
    #[error("invalid refresh credential")]
    InvalidRefreshCredential,

    /// Policy evaluated to false. Also used when the resource does not exist.
    #[error("forbidden")]
    Forbidden,

    #[error("unknown policy: {0}")]
    UnknownPolicy(String),

    #[error("duplicate policy: {0}")]
    DuplicatePolicy(String),

    #[error("refresh store unavailable: {0}")]
    StoreUnavailable(String),

    /// Signing, randomness or other local failures.
    #[error("internal auth failure: {0}")]
    Internal(String),
}
