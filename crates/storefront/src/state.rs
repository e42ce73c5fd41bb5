//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cache::KeyValueCache;
use crate::config::StorefrontConfig;
use crate::services::tokens::TokenIssuer;
use crate::stripe::{StripeClient, StripeError};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    cache: KeyValueCache,
    tokens: TokenIssuer,
    stripe: StripeClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    /// * `cache` - Session cache shared by tokens and the catalog
    ///
    /// # Errors
    ///
    /// Returns an error if the Stripe client cannot be built.
    pub fn new(
        config: StorefrontConfig,
        pool: PgPool,
        cache: KeyValueCache,
    ) -> Result<Self, StripeError> {
        let tokens = TokenIssuer::new(&config.tokens, cache.clone());
        let stripe = StripeClient::new(&config.stripe)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                cache,
                tokens,
                stripe,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the session cache.
    #[must_use]
    pub fn cache(&self) -> &KeyValueCache {
        &self.inner.cache
    }

    /// Get a reference to the token issuer.
    #[must_use]
    pub fn tokens(&self) -> &TokenIssuer {
        &self.inner.tokens
    }

    /// Get a reference to the Stripe client.
    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }
}
