//! Mercato Client - Typed HTTP client for the storefront API.
//!
//! Tokens travel as `HttpOnly` cookies, so the client keeps a cookie store
//! and never sees token values. When an authenticated call fails because the
//! access token expired, the client refreshes once and retries the call.
//!
//! Concurrent calls that hit an expired token share a single refresh request
//! through [`SingleFlight`]; the refresh token is never presented twice for
//! the same expiry.
//!
//! # Example
//!
//! ```rust,ignore
//! use mercato_client::ApiClient;
//!
//! let client = ApiClient::new("http://localhost:5000")?;
//! client.login("ada@example.com", "correct horse").await?;
//! let cart = client.add_to_cart(product_id).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

mod error;
mod single_flight;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use mercato_core::ProductId;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

pub use error::ClientError;
pub use single_flight::SingleFlight;
pub use types::*;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the storefront JSON API.
///
/// Cheap to clone; clones share the cookie store and the refresh guard.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    base: Url,
    refresh: SingleFlight<(), ClientError>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.inner.base.as_str())
            .field("refresh", &self.inner.refresh)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client for the server at `base_url` (e.g. `http://localhost:5000`).
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Url` or `ClientError::InvalidBaseUrl` for a bad
    /// base URL, and `ClientError::Http` if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Self::with_http_client(base_url, http)
    }

    /// Create a client over a preconfigured `reqwest::Client`.
    ///
    /// `http` must have a cookie store enabled, or no session survives the
    /// login response.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Url` or `ClientError::InvalidBaseUrl` for a bad
    /// base URL.
    pub fn with_http_client(base_url: &str, http: reqwest::Client) -> Result<Self, ClientError> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                http,
                base,
                refresh: SingleFlight::new(),
            }),
        })
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Create an account and start a session.
    ///
    /// # Errors
    ///
    /// Returns a 400 `ClientError::Api` for invalid input or an existing email.
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> Result<User, ClientError> {
        let body = json!({ "name": name, "email": email, "password": password });
        let url = self.endpoint(&["api", "auth", "signup"]);
        self.send(self.inner.http.post(url).json(&body)).await
    }

    /// Start a session with email and password.
    ///
    /// # Errors
    ///
    /// Returns a 401 `ClientError::Api` for an unknown email or wrong password.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let body = json!({ "email": email, "password": password });
        let url = self.endpoint(&["api", "auth", "login"]);
        self.send(self.inner.http.post(url).json(&body)).await
    }

    /// End the session and drop the token cookies.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the request fails.
    pub async fn logout(&self) -> Result<Message, ClientError> {
        let url = self.endpoint(&["api", "auth", "logout"]);
        self.send(self.inner.http.post(url)).await
    }

    /// Exchange the refresh cookie for a new access cookie.
    ///
    /// Concurrent callers share one request.
    ///
    /// # Errors
    ///
    /// Returns a 401 `ClientError::Api` if the refresh token is missing,
    /// expired or revoked.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let client = self.clone();
        self.inner
            .refresh
            .run(move || async move { client.refresh_now().await })
            .await
    }

    async fn refresh_now(&self) -> Result<(), ClientError> {
        let url = self.endpoint(&["api", "auth", "refresh-token"]);
        let _: Message = self.send(self.inner.http.post(url)).await?;
        tracing::debug!("access token refreshed");
        Ok(())
    }

    /// The signed-in user and their cart lines.
    ///
    /// # Errors
    ///
    /// Returns a 401 `ClientError::Api` without a session.
    pub async fn profile(&self) -> Result<Profile, ClientError> {
        self.authed(Method::GET, &["api", "auth", "profile"], None)
            .await
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Every product (admin).
    ///
    /// # Errors
    ///
    /// Returns a 401/403 `ClientError::Api` for non-admins.
    pub async fn list_products(&self) -> Result<Vec<Product>, ClientError> {
        let list: ProductList = self.authed(Method::GET, &["api", "products"], None).await?;
        Ok(list.products)
    }

    /// Featured products.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the request fails.
    pub async fn featured_products(&self) -> Result<Vec<Product>, ClientError> {
        let url = self.endpoint(&["api", "products", "featured"]);
        self.send(self.inner.http.get(url)).await
    }

    /// Products in one category.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the request fails.
    pub async fn products_by_category(&self, category: &str) -> Result<Vec<Product>, ClientError> {
        let url = self.endpoint(&["api", "products", "category", category]);
        self.send(self.inner.http.get(url)).await
    }

    /// A few random products.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the request fails.
    pub async fn recommendations(&self) -> Result<Vec<Product>, ClientError> {
        let url = self.endpoint(&["api", "products", "recommendations"]);
        self.send(self.inner.http.get(url)).await
    }

    /// Add a product to the catalog (admin).
    ///
    /// # Errors
    ///
    /// Returns a 400 `ClientError::Api` for invalid fields.
    pub async fn create_product(&self, product: &NewProduct) -> Result<Product, ClientError> {
        self.authed(Method::POST, &["api", "products"], Some(json!(product)))
            .await
    }

    /// Flip a product's featured flag (admin).
    ///
    /// # Errors
    ///
    /// Returns a 404 `ClientError::Api` for an unknown product.
    pub async fn toggle_featured(&self, id: ProductId) -> Result<Product, ClientError> {
        let id = id.to_string();
        self.authed(Method::PATCH, &["api", "products", &id], None)
            .await
    }

    /// Remove a product from the catalog (admin).
    ///
    /// # Errors
    ///
    /// Returns a 404 `ClientError::Api` for an unknown product.
    pub async fn delete_product(&self, id: ProductId) -> Result<Message, ClientError> {
        let id = id.to_string();
        self.authed(Method::DELETE, &["api", "products", &id], None)
            .await
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Cart lines with product details.
    ///
    /// # Errors
    ///
    /// Returns a 401 `ClientError::Api` without a session.
    pub async fn cart(&self) -> Result<Vec<CartItem>, ClientError> {
        self.authed(Method::GET, &["api", "cart"], None).await
    }

    /// Add one unit of a product.
    ///
    /// # Errors
    ///
    /// Returns a 404 `ClientError::Api` for an unknown product and 409 on a
    /// concurrent cart write.
    pub async fn add_to_cart(&self, product_id: ProductId) -> Result<Vec<CartLine>, ClientError> {
        let body = json!({ "productId": product_id });
        self.authed(Method::POST, &["api", "cart"], Some(body))
            .await
    }

    /// Set a line's quantity; 0 removes it.
    ///
    /// # Errors
    ///
    /// Returns a 404 `ClientError::Api` if the product is not in the cart.
    pub async fn update_quantity(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Vec<CartLine>, ClientError> {
        let id = product_id.to_string();
        let body = json!({ "quantity": quantity });
        self.authed(Method::PUT, &["api", "cart", &id], Some(body))
            .await
    }

    /// Remove one product, or every product when `product_id` is `None`.
    ///
    /// # Errors
    ///
    /// Returns a 409 `ClientError::Api` on a concurrent cart write.
    pub async fn remove_from_cart(
        &self,
        product_id: Option<ProductId>,
    ) -> Result<Vec<CartLine>, ClientError> {
        let body = product_id.map(|id| json!({ "productId": id }));
        self.authed(Method::DELETE, &["api", "cart"], body).await
    }

    /// Price the cart, optionally with a coupon code.
    ///
    /// # Errors
    ///
    /// Returns a 401 `ClientError::Api` without a session.
    pub async fn cart_totals(&self, coupon: Option<&str>) -> Result<CartTotals, ClientError> {
        let mut url = self.endpoint(&["api", "cart", "totals"]);
        if let Some(code) = coupon {
            url.query_pairs_mut().append_pair("coupon", code);
        }
        self.authed_url(Method::GET, url, None).await
    }

    // =========================================================================
    // Coupons and checkout
    // =========================================================================

    /// The user's active coupon, if any.
    ///
    /// # Errors
    ///
    /// Returns a 401 `ClientError::Api` without a session.
    pub async fn coupon(&self) -> Result<Option<Coupon>, ClientError> {
        self.authed(Method::GET, &["api", "coupons"], None).await
    }

    /// Check a coupon code.
    ///
    /// # Errors
    ///
    /// Returns a 404 `ClientError::Api` for an unknown or expired code.
    pub async fn validate_coupon(&self, code: &str) -> Result<ValidatedCoupon, ClientError> {
        let body = json!({ "code": code });
        self.authed(Method::POST, &["api", "coupons", "validate"], Some(body))
            .await
    }

    /// Start a Stripe checkout for the cart.
    ///
    /// # Errors
    ///
    /// Returns a 400 `ClientError::Api` for an empty cart.
    pub async fn create_checkout_session(
        &self,
        coupon_code: Option<&str>,
    ) -> Result<CheckoutSession, ClientError> {
        let body = json!({ "couponCode": coupon_code });
        self.authed(
            Method::POST,
            &["api", "payments", "checkout-session"],
            Some(body),
        )
        .await
    }

    /// Confirm a paid Stripe session and record the order.
    ///
    /// # Errors
    ///
    /// Returns a 400 `ClientError::Api` if the session is not paid.
    pub async fn checkout_success(&self, session_id: &str) -> Result<CheckoutSuccess, ClientError> {
        let body = json!({ "sessionId": session_id });
        self.authed(
            Method::POST,
            &["api", "payments", "checkout-success"],
            Some(body),
        )
        .await
    }

    /// Store totals and last week's daily sales (admin).
    ///
    /// # Errors
    ///
    /// Returns a 401/403 `ClientError::Api` for non-admins.
    pub async fn analytics(&self) -> Result<Dashboard, ClientError> {
        self.authed(Method::GET, &["api", "analytics"], None).await
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.inner.base.clone();
        // checked in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn authed<R: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<serde_json::Value>,
    ) -> Result<R, ClientError> {
        self.authed_url(method, self.endpoint(segments), body).await
    }

    /// Send a request that needs the access cookie, refreshing and retrying
    /// once if the access token is stale.
    async fn authed_url<R: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<R, ClientError> {
        let build = || {
            let request = self.inner.http.request(method.clone(), url.clone());
            match &body {
                Some(body) => request.json(body),
                None => request,
            }
        };

        match self.send(build()).await {
            Err(err) if err.is_refreshable() => {
                tracing::debug!(code = err.code(), "access token stale, refreshing");
                self.refresh().await?;
                self.send(build()).await
            }
            other => other,
        }
    }

    async fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R, ClientError> {
        let response = request.send().await?;
        Self::decode(response).await
    }

    async fn decode<R: DeserializeOwned>(response: Response) -> Result<R, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::from_response(status.as_u16(), &body))
    }
}
