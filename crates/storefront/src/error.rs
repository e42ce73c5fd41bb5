//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`. Responses are JSON: `{"message": ..., "code": ...}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::cache::CacheError;
use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::catalog::CatalogError;
use crate::services::checkout::CheckoutError;
use crate::services::coupons::CouponError;
use crate::services::tokens::TokenError;
use crate::stripe::StripeError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request body or parameters failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Request is well-formed but cannot be served.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Authenticated but not allowed.
    #[error("Forbidden")]
    Forbidden,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Concurrent modification or uniqueness clash.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(RepositoryError),

    /// Session cache operation failed.
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Stripe call failed.
    #[error("Payment provider error: {0}")]
    Payment(#[from] StripeError),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Auth(err) => match err {
                AuthError::MalformedEmail(_)
                | AuthError::WeakPassword(_)
                | AuthError::MissingName
                | AuthError::UserAlreadyExists => StatusCode::BAD_REQUEST,
                AuthError::Forbidden => StatusCode::FORBIDDEN,
                AuthError::MissingCredential
                | AuthError::InvalidToken
                | AuthError::TokenExpired
                | AuthError::TokenRevoked
                | AuthError::UnknownEmail
                | AuthError::WrongPassword
                | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::Repository(_) | AuthError::TokenService(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Payment(_) | Self::Database(_) | Self::Cache(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::BadRequest(_) => "bad_request",
            Self::Auth(err) => err.code(),
            Self::Forbidden => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Payment(_) => "payment_provider_error",
            Self::RateLimited => "rate_limited",
            Self::Database(_) | Self::Cache(_) | Self::Internal(_) => "internal_error",
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::BadRequest(msg) | Self::NotFound(msg) => msg.clone(),
            Self::Conflict(_) => "Resource was modified concurrently, please retry".to_string(),
            Self::Forbidden => "Access denied - Admin only".to_string(),
            Self::Payment(_) => "Payment provider error".to_string(),
            Self::RateLimited => "Too many requests".to_string(),
            Self::Database(_) | Self::Cache(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Auth(err) => match err {
                AuthError::MissingCredential => "Unauthorized - No token provided".to_string(),
                AuthError::InvalidToken => "Unauthorized - Invalid token".to_string(),
                AuthError::TokenExpired => "Unauthorized - Token expired".to_string(),
                AuthError::TokenRevoked => "Unauthorized - Token revoked".to_string(),
                AuthError::UserNotFound => "User not found".to_string(),
                AuthError::Forbidden => "Access denied - Admin only".to_string(),
                AuthError::MalformedEmail(_) => "Invalid email address".to_string(),
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::MissingName => "Name is required".to_string(),
                AuthError::UnknownEmail => "Invalid Email".to_string(),
                AuthError::WrongPassword => "Invalid Password".to_string(),
                AuthError::UserAlreadyExists => "User Already Exists".to_string(),
                AuthError::Repository(_) | AuthError::TokenService(_) | AuthError::PasswordHash => {
                    "Internal server error".to_string()
                }
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else if matches!(self, Self::Conflict(_)) {
            tracing::info!(error = %self, "Request conflict");
        }

        // Don't expose internal error details to clients
        let body = serde_json::json!({
            "message": self.public_message(),
            "code": self.code(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("Resource not found".to_string()),
            RepositoryError::Conflict(what) => Self::Conflict(what),
            other => Self::Database(other),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        Self::Auth(AuthError::from(err))
    }
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::NotInCart(_) => Self::NotFound("Product not in cart".to_string()),
            CartError::UnknownProduct(_) => Self::NotFound("Product not found".to_string()),
            CartError::Amount(e) => Self::BadRequest(format!("Cart total is out of range: {e}")),
            CartError::Repository(e) => e.into(),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound => Self::NotFound("Product not found".to_string()),
            CatalogError::Invalid(msg) => Self::Validation(msg),
            CatalogError::Repository(e) => e.into(),
            CatalogError::Cache(e) => Self::Cache(e),
        }
    }
}

impl From<CouponError> for AppError {
    fn from(err: CouponError) -> Self {
        match err {
            CouponError::NotFound | CouponError::Expired => Self::NotFound(err.to_string()),
            CouponError::Repository(e) => e.into(),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyCart | CheckoutError::NotPaid => Self::BadRequest(err.to_string()),
            CheckoutError::UnknownSession => Self::NotFound(err.to_string()),
            CheckoutError::SessionMismatch => Self::Forbidden,
            CheckoutError::Payment(e) => Self::Payment(e),
            CheckoutError::Cart(e) => e.into(),
            CheckoutError::Coupon(e) => e.into(),
            CheckoutError::Repository(e) => e.into(),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}
