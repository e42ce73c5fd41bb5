//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST   /api/auth/signup              - Create account, set token cookies (strict rate limit)
//! POST   /api/auth/login               - Log in, set token cookies (strict rate limit)
//! POST   /api/auth/logout              - Revoke refresh token, clear cookies
//! POST   /api/auth/refresh-token       - New access token from refresh cookie
//! GET    /api/auth/profile             - Current user
//!
//! # Products
//! GET    /api/products                 - All products (admin)
//! GET    /api/products/featured        - Featured products (cached)
//! GET    /api/products/category/{c}    - Products in a category
//! GET    /api/products/recommendations - Random picks
//! POST   /api/products                 - Create (admin)
//! PATCH  /api/products/{id}            - Toggle featured (admin)
//! DELETE /api/products/{id}            - Delete (admin)
//!
//! # Cart (auth)
//! GET    /api/cart                     - Cart items with product details
//! POST   /api/cart                     - Add one unit
//! PUT    /api/cart/{id}                - Set quantity (0 removes)
//! DELETE /api/cart                     - Remove one product, or clear
//! GET    /api/cart/totals              - Subtotal, discount, total
//!
//! # Coupons (auth)
//! GET    /api/coupons                  - Active coupon or null
//! POST   /api/coupons/validate         - Check a code
//!
//! # Payments (auth)
//! POST   /api/payments/checkout-session - Start Stripe checkout
//! POST   /api/payments/checkout-success - Record the paid order
//!
//! # Analytics (admin)
//! GET    /api/analytics                - Totals and last 7 days
//! ```

pub mod analytics;
pub mod auth;
pub mod cart;
pub mod coupons;
pub mod payments;
pub mod products;

use axum::{
    Router,
    extract::FromRequest,
    routing::{get, patch, post, put},
};

use crate::error::AppError;
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// JSON body extractor whose rejections use the API error format.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Create the auth routes router.
///
/// Only the credential-checking routes get the strict limiter; session
/// upkeep (profile, refresh, logout) runs on every page load.
pub fn auth_routes() -> Router<AppState> {
    let credentials = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/logout", post(auth::logout))
        .route("/refresh-token", post(auth::refresh_token))
        .route("/profile", get(auth::profile))
        .merge(credentials)
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::list_all).post(products::create))
        .route("/featured", get(products::featured))
        .route("/category/{category}", get(products::by_category))
        .route("/recommendations", get(products::recommendations))
        .route(
            "/{id}",
            patch(products::toggle_featured).delete(products::delete),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(cart::show).post(cart::add).delete(cart::remove),
        )
        .route("/totals", get(cart::totals))
        .route("/{id}", put(cart::update_quantity))
}

/// Create the coupon routes router.
pub fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(coupons::show))
        .route("/validate", post(coupons::validate))
}

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout-session", post(payments::create_checkout_session))
        .route("/checkout-success", post(payments::checkout_success))
}

/// Create all API routes, nested under `/api`.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .nest("/auth", auth_routes())
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/coupons", coupon_routes())
        .nest("/payments", payment_routes())
        .route("/analytics", get(analytics::dashboard))
        .layer(api_rate_limiter());

    Router::new().nest("/api", api)
}
