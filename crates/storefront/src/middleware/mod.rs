//! HTTP middleware stack for the storefront API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (credentialed requests from `CLIENT_URL` only)
//! 5. Security headers
//! 6. Cookie manager (token cookies)
//! 7. Rate limiting (governor), per route group

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{
    ACCESS_COOKIE, REFRESH_COOKIE, RequireAdmin, RequireAuth, clear_token_cookies, refresh_token,
    set_access_cookie, set_token_cookies,
};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use security_headers::security_headers_middleware;
