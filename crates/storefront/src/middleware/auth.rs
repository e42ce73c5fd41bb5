//! Authentication extractors and token cookies.
//!
//! Access and refresh tokens travel in `HttpOnly` cookies managed through
//! `tower-cookies`, so `CookieManagerLayer` must wrap every route that uses
//! these extractors.

use std::time::Duration;

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_cookies::{
    Cookie, Cookies,
    cookie::{SameSite, time},
};

use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::services::auth::{AuthError, AuthService};
use crate::services::tokens::{ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL, TokenPair};
use crate::state::AppState;

/// Cookie carrying the short-lived access token.
pub const ACCESS_COOKIE: &str = "accessToken";

/// Cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Extractor that requires a valid access token.
///
/// Rejects with 401 and a `code` of `missing_token`, `invalid_token` or
/// `token_expired`.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(RequireAuth(user): RequireAuth) -> Json<User> {
///     Json(user)
/// }
/// ```
pub struct RequireAuth(pub User);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::Internal(msg.to_string()))?;

        let token = cookies
            .get(ACCESS_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        let user_id = state.tokens().validate_access(&token)?;
        let user = AuthService::new(state.pool()).get_user(user_id).await?;

        set_sentry_user(&user.id, Some(user.email.as_str()));
        Ok(Self(user))
    }
}

/// Extractor that requires an authenticated admin.
///
/// Rejects like [`RequireAuth`], then with 403 for non-admins.
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, "non-admin attempted admin route");
            return Err(AuthError::Forbidden.into());
        }
        Ok(Self(user))
    }
}

/// Value of the refresh cookie, if present.
#[must_use]
pub fn refresh_token(cookies: &Cookies) -> Option<String> {
    cookies
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Set both token cookies after login or signup.
pub fn set_token_cookies(cookies: &Cookies, pair: &TokenPair, secure: bool) {
    cookies.add(token_cookie(ACCESS_COOKIE, pair.access.clone(), ACCESS_TOKEN_TTL, secure));
    cookies.add(token_cookie(REFRESH_COOKIE, pair.refresh.clone(), REFRESH_TOKEN_TTL, secure));
}

/// Replace the access cookie after a refresh.
pub fn set_access_cookie(cookies: &Cookies, access: String, secure: bool) {
    cookies.add(token_cookie(ACCESS_COOKIE, access, ACCESS_TOKEN_TTL, secure));
}

/// Expire both token cookies (logout).
pub fn clear_token_cookies(cookies: &Cookies) {
    for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
        cookies.remove(Cookie::build((name, "")).path("/").build());
    }
}

fn token_cookie(name: &'static str, value: String, ttl: Duration, secure: bool) -> Cookie<'static> {
    let max_age = time::Duration::seconds(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX));
    Cookie::build((name, value))
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .path("/")
        .max_age(max_age)
        .build()
}
