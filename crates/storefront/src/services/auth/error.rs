//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::tokens::TokenError;

/// Errors that can occur during authentication and authorization.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No token was presented.
    #[error("no token provided")]
    MissingCredential,

    /// Token failed signature or format checks.
    #[error("invalid token")]
    InvalidToken,

    /// Token is past its expiry.
    #[error("token expired")]
    TokenExpired,

    /// Refresh token has been superseded or revoked.
    #[error("token revoked")]
    TokenRevoked,

    /// Authenticated, but the account lacks the admin role.
    #[error("admin access required")]
    Forbidden,

    /// Email address is not well-formed.
    #[error("invalid email: {0}")]
    MalformedEmail(#[from] mercato_core::EmailError),

    /// No account uses this email.
    #[error("unknown email")]
    UnknownEmail,

    /// Password does not match.
    #[error("wrong password")]
    WrongPassword,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Display name is blank.
    #[error("name is required")]
    MissingName,

    /// Token refers to an account that no longer exists.
    #[error("user not found")]
    UserNotFound,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Signing or session-cache failure while handling tokens.
    #[error("token service error: {0}")]
    TokenService(TokenError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => Self::InvalidToken,
            TokenError::Expired => Self::TokenExpired,
            TokenError::Revoked => Self::TokenRevoked,
            other @ (TokenError::Signing(_) | TokenError::Cache(_)) => Self::TokenService(other),
        }
    }
}

impl AuthError {
    /// Machine-readable code sent alongside the message.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_token",
            Self::InvalidToken | Self::UserNotFound => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::TokenRevoked => "token_revoked",
            Self::Forbidden => "forbidden",
            Self::MalformedEmail(_) | Self::WeakPassword(_) | Self::MissingName => {
                "validation_failed"
            }
            Self::UnknownEmail | Self::WrongPassword => "invalid_credentials",
            Self::UserAlreadyExists => "user_exists",
            Self::Repository(_) | Self::TokenService(_) | Self::PasswordHash => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_errors_map_to_distinct_codes() {
        let codes = [
            AuthError::MissingCredential.code(),
            AuthError::from(TokenError::Invalid).code(),
            AuthError::from(TokenError::Expired).code(),
            AuthError::from(TokenError::Revoked).code(),
        ];
        assert_eq!(
            codes,
            ["missing_token", "invalid_token", "token_expired", "token_revoked"]
        );
    }
}
