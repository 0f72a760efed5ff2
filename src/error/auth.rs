//! Reasons attached to authentication, token and uniqueness failures.

use thiserror::Error;

/// Token verification failures reported by the token codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("invalid refresh token")]
    InvalidRefreshToken,
}

/// Why a request was rejected as unauthenticated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnauthorizedReason {
    #[error("authentication is required")]
    MissingIdentity,

    #[error("invalid email/username or password")]
    InvalidCredentials,

    #[error("invalid or expired refresh token")]
    InvalidOrExpiredRefreshToken,

    #[error("invalid old password")]
    InvalidOldPassword,

    #[error("invalid access token: {0}")]
    AccessToken(#[from] TokenError),
}

/// Which uniqueness rule a write violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictReason {
    #[error("email already exists")]
    EmailExists,

    #[error("username already exists")]
    UsernameExists,

    #[error("role code already exists: {0}")]
    RoleCodeExists(String),

    #[error("permission key already exists: {0}")]
    PermissionKeyExists(String),
}
