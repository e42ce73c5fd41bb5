//! Integration tests for Mercato.
//!
//! # Running Tests
//!
//! ```bash
//! # Start PostgreSQL and Redis, migrate, then start the server
//! cargo run -p mercato-cli -- migrate
//! cargo run -p mercato-storefront
//!
//! # Run the ignored end-to-end tests
//! cargo test -p mercato-integration-tests -- --ignored
//! ```
//!
//! Set `MERCATO_BASE_URL` to target a server other than
//! `http://localhost:5000`.
//!
//! # Test Categories
//!
//! - `storefront_auth` - Signup, login, refresh and logout
//! - `storefront_cart` - Cart mutations and totals

#![cfg_attr(not(test), forbid(unsafe_code))]

use mercato_client::{ApiClient, User};
use reqwest::header::{HeaderMap, HeaderValue};

/// Password used for every generated account.
pub const TEST_PASSWORD: &str = "integration-pass-1";

/// Base URL of the storefront under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("MERCATO_BASE_URL").unwrap_or_else(|_| "http://localhost:5000".to_string())
}

/// A fresh client with an empty cookie store.
///
/// Each client claims its own `X-Forwarded-For` address so parallel tests do
/// not share a rate-limit bucket.
///
/// # Panics
///
/// Panics if the base URL is invalid.
#[must_use]
pub fn client() -> ApiClient {
    ApiClient::with_http_client(&base_url(), http_client()).expect("Failed to create API client")
}

/// A cookie-keeping `reqwest` client with a random forwarded address.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
pub fn http_client() -> reqwest::Client {
    let mut headers = HeaderMap::new();
    let forwarded = HeaderValue::from_str(&random_ip()).expect("IP is a valid header value");
    headers.insert("x-forwarded-for", forwarded);

    reqwest::Client::builder()
        .cookie_store(true)
        .default_headers(headers)
        .build()
        .expect("Failed to create HTTP client")
}

fn random_ip() -> String {
    let [a, b, c, ..] = uuid::Uuid::new_v4().into_bytes();
    // 10.0.0.0/8 keeps the address private
    format!("10.{a}.{b}.{c}")
}

/// An email address no other test run has used.
#[must_use]
pub fn unique_email() -> String {
    format!("it-{}@example.com", uuid::Uuid::new_v4().simple())
}

/// Sign up a new customer and return the signed-in client.
///
/// # Panics
///
/// Panics if signup fails.
pub async fn signed_in_customer() -> (ApiClient, User) {
    let client = client();
    let user = client
        .signup("Integration Tester", &unique_email(), TEST_PASSWORD)
        .await
        .expect("Failed to sign up test user");
    (client, user)
}
