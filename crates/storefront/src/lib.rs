//! Mercato storefront library.
//!
//! JSON API for the storefront: token auth, carts, catalog, coupons, Stripe
//! checkout and admin analytics. The binary in `main.rs` only wires
//! configuration, tracing and the listener around [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod stripe;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    routing::get,
};
use tower_cookies::CookieManagerLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::config::StorefrontConfig;
use crate::state::AppState;

/// Build the full application router with its middleware stack.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .layer(CookieManagerLayer::new())
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(cors)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Credentialed CORS for the single client origin.
fn cors_layer(config: &StorefrontConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    match HeaderValue::from_str(config.client_origin()) {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            tracing::warn!(error = %e, "CLIENT_URL is not a valid origin, CORS disabled");
            cors
        }
    }
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database and session cache connectivity.
/// Returns 503 Service Unavailable if either is unreachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    if let Err(e) = sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        tracing::warn!(error = %e, "readiness: database unreachable");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    if let Err(e) = state.cache().ping().await {
        tracing::warn!(error = %e, backend = state.cache().backend_name(), "readiness: cache unreachable");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use axum::response::Response;
    use mercato_core::UserId;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::cache::KeyValueCache;
    use crate::config::test_config;

    fn test_state() -> AppState {
        // never connects: these requests are rejected before any query
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unreachable")
            .unwrap();
        AppState::new(test_config(), pool, KeyValueCache::memory()).unwrap()
    }

    fn request(method: Method, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7")
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(test_state())
            .oneshot(request(Method::GET, "/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn test_profile_without_cookie_is_missing_token() {
        let response = app(test_state())
            .oneshot(
                request(Method::GET, "/api/auth/profile")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "missing_token");
    }

    #[tokio::test]
    async fn test_garbage_access_token_is_invalid() {
        let response = app(test_state())
            .oneshot(
                request(Method::GET, "/api/cart")
                    .header(header::COOKIE, "accessToken=not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "invalid_token");
    }

    #[tokio::test]
    async fn test_refresh_without_cookie_is_missing_token() {
        let response = app(test_state())
            .oneshot(
                request(Method::POST, "/api/auth/refresh-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "missing_token");
    }

    #[tokio::test]
    async fn test_refresh_rotates_access_cookie() {
        let state = test_state();
        let pair = state.tokens().issue_token_pair(UserId::new(4)).await.unwrap();

        let response = app(state)
            .oneshot(
                request(Method::POST, "/api/auth/refresh-token")
                    .header(header::COOKIE, format!("refreshToken={}", pair.refresh))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert!(cookies.iter().any(|c| c.starts_with("accessToken=")));
        assert!(cookies.iter().all(|c| !c.starts_with("refreshToken=")));
    }

    #[tokio::test]
    async fn test_refresh_after_logout_is_revoked() {
        let state = test_state();
        let pair = state.tokens().issue_token_pair(UserId::new(9)).await.unwrap();
        let router = app(state);

        let logout = router
            .clone()
            .oneshot(
                request(Method::POST, "/api/auth/logout")
                    .header(
                        header::COOKIE,
                        format!("accessToken={}; refreshToken={}", pair.access, pair.refresh),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(logout.status(), StatusCode::OK);
        let cleared = set_cookies(&logout);
        assert!(cleared.iter().any(|c| c.starts_with("accessToken=")));
        assert!(cleared.iter().any(|c| c.starts_with("refreshToken=")));

        let refresh = router
            .oneshot(
                request(Method::POST, "/api/auth/refresh-token")
                    .header(header::COOKIE, format!("refreshToken={}", pair.refresh))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(refresh.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(refresh).await["code"], "token_revoked");
    }

    #[tokio::test]
    async fn test_logout_without_cookies_succeeds() {
        let response = app(test_state())
            .oneshot(
                request(Method::POST, "/api/auth/logout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["message"], "Logged out successfully");
    }

    #[tokio::test]
    async fn test_malformed_signup_body_is_validation_error() {
        let response = app(test_state())
            .oneshot(
                request(Method::POST, "/api/auth/signup")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "validation_failed");
    }

    #[tokio::test]
    async fn test_short_password_is_rejected_before_storage() {
        let response = app(test_state())
            .oneshot(
                request(Method::POST, "/api/auth/signup")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"name":"Ada","email":"ada@example.com","password":"12345"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "validation_failed");
    }

    #[tokio::test]
    async fn test_cors_allows_client_origin_with_credentials() {
        let response = app(test_state())
            .oneshot(
                request(Method::OPTIONS, "/api/products/featured")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:5173"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    }

    #[tokio::test]
    async fn test_session_upkeep_is_not_throttled_like_login() {
        let router = app(test_state());

        for _ in 0..8 {
            let response = router
                .clone()
                .oneshot(
                    request(Method::GET, "/api/auth/profile")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let mut statuses = Vec::new();
        let mut last = None;
        for _ in 0..6 {
            let response = router
                .clone()
                .oneshot(
                    request(Method::POST, "/api/auth/login")
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(Body::from("{}"))
                        .unwrap(),
                )
                .await
                .unwrap();
            statuses.push(response.status());
            last = Some(response);
        }
        assert!(statuses[..5].iter().all(|s| *s == StatusCode::BAD_REQUEST));
        assert_eq!(statuses[5], StatusCode::TOO_MANY_REQUESTS);

        let throttled = last.unwrap();
        assert_eq!(
            throttled.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        assert_eq!(json_body(throttled).await["code"], "rate_limited");
    }
}
