//! Auth route handlers.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_cookies::Cookies;

use mercato_core::{Email, Role, UserId};

use super::ApiJson;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{
    RequireAuth, clear_token_cookies, refresh_token as refresh_cookie, set_access_cookie,
    set_token_cookies,
};
use crate::db::UserRepository;
use crate::models::{Cart, User};
use crate::services::auth::{AuthError, AuthService};
use crate::state::AppState;

/// Signup form.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login form.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The account fields returned after signup or login.
#[derive(Debug, Serialize)]
pub struct AuthUser {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: Role,
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

/// The signed-in account with its cart lines.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub cart_items: Cart,
}

/// Create an account and log it in.
///
/// POST /api/auth/signup
///
/// # Errors
///
/// Returns 400 "User Already Exists" for a registered email and 400 for
/// invalid input.
pub async fn signup(
    State(state): State<AppState>,
    cookies: Cookies,
    ApiJson(body): ApiJson<SignupRequest>,
) -> Result<Json<AuthUser>, AppError> {
    let user = AuthService::new(state.pool())
        .signup(&body.name, &body.email, &body.password)
        .await?;
    start_session(&state, &cookies, &user).await?;
    Ok(Json(user.into()))
}

/// Log in with email and password.
///
/// POST /api/auth/login
///
/// # Errors
///
/// Returns 401 "Invalid Email" or "Invalid Password".
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<AuthUser>, AppError> {
    let user = AuthService::new(state.pool())
        .login(&body.email, &body.password)
        .await?;
    start_session(&state, &cookies, &user).await?;
    Ok(Json(user.into()))
}

async fn start_session(state: &AppState, cookies: &Cookies, user: &User) -> Result<(), AppError> {
    let pair = state.tokens().issue_token_pair(user.id).await?;
    set_token_cookies(cookies, &pair, state.config().app_env.secure_cookies());
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// Log out: revoke the presented refresh token and clear both cookies.
///
/// POST /api/auth/logout
///
/// Succeeds even without cookies or with an unreadable token.
///
/// # Errors
///
/// Returns 500 if the session cache cannot be reached.
pub async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Json<Value>, AppError> {
    if let Some(token) = refresh_cookie(&cookies)
        && let Some(user_id) = state.tokens().revoke_presented(&token).await?
    {
        tracing::info!(user_id = %user_id, "user logged out");
    }

    clear_token_cookies(&cookies);
    clear_sentry_user();
    Ok(Json(json!({ "message": "Logged out successfully" })))
}

/// Issue a new access token from the refresh cookie.
///
/// POST /api/auth/refresh-token
///
/// # Errors
///
/// Returns 401 with code `missing_token`, `invalid_token`, `token_expired`
/// or `token_revoked`.
pub async fn refresh_token(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Json<Value>, AppError> {
    let token = refresh_cookie(&cookies).ok_or(AuthError::MissingCredential)?;
    let access = state.tokens().rotate_access(&token).await?;
    set_access_cookie(&cookies, access, state.config().app_env.secure_cookies());
    Ok(Json(json!({ "message": "Token refreshed successfully" })))
}

/// The authenticated user and their cart lines.
///
/// GET /api/auth/profile
///
/// # Errors
///
/// Returns 500 if the cart cannot be loaded.
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Profile>, AppError> {
    let (cart_items, _version) = UserRepository::new(state.pool()).load_cart(user.id).await?;
    Ok(Json(Profile { user, cart_items }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::num::NonZeroU32;

    use chrono::Utc;
    use mercato_core::ProductId;

    use super::*;
    use crate::models::CartLine;

    #[test]
    fn test_profile_includes_cart_lines() {
        let cart = Cart::from(vec![CartLine::new(
            ProductId::new(7),
            NonZeroU32::new(2).unwrap(),
        )]);
        let profile = Profile {
            user: User {
                id: UserId::new(3),
                name: "Ada".to_string(),
                email: Email::parse("ada@example.com").unwrap(),
                role: Role::Customer,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            cart_items: cart,
        };

        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["email"], "ada@example.com");
        assert_eq!(
            value["cartItems"],
            json!([{ "productId": 7, "quantity": 2 }])
        );
        assert!(value.get("password").is_none());
    }
}
