//! Catalog service.
//!
//! The featured list is read through the session cache under
//! [`FEATURED_CACHE_KEY`] with no TTL. Every catalog mutation deletes that
//! key so the next read rebuilds it from the database.

use sqlx::PgPool;
use thiserror::Error;

use mercato_core::ProductId;

use crate::cache::{CacheError, KeyValueCache};
use crate::db::{ProductRepository, RepositoryError};
use crate::models::{NewProduct, Product};

/// Session cache key of the featured product list.
pub const FEATURED_CACHE_KEY: &str = "featured_products";

/// Number of products returned by [`CatalogService::recommendations`].
pub const RECOMMENDATION_COUNT: i64 = 3;

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product not found")]
    NotFound,

    #[error("invalid product: {0}")]
    Invalid(String),

    #[error(transparent)]
    Repository(RepositoryError),

    /// The featured list could not be invalidated after a write.
    #[error("failed to invalidate featured products: {0}")]
    Cache(#[from] CacheError),
}

impl From<RepositoryError> for CatalogError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

/// Catalog queries and admin mutations.
pub struct CatalogService<'a> {
    products: ProductRepository<'a>,
    cache: &'a KeyValueCache,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, cache: &'a KeyValueCache) -> Self {
        Self {
            products: ProductRepository::new(pool),
            cache,
        }
    }

    /// Every product, for the admin dashboard.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.products.list_all().await?)
    }

    /// Featured products, from the cache when possible.
    ///
    /// Cache failures are logged and the database answers instead.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the database query fails.
    pub async fn featured(&self) -> Result<Vec<Product>, CatalogError> {
        match self.cache.get_json::<Vec<Product>>(FEATURED_CACHE_KEY).await {
            Ok(Some(products)) => return Ok(products),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "featured cache read failed, using database"),
        }

        let products = self.products.list_featured().await?;

        if let Err(e) = self.cache.set_json(FEATURED_CACHE_KEY, &products, None).await {
            tracing::warn!(error = %e, "failed to populate featured cache");
        }
        Ok(products)
    }

    /// Products in one category.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn by_category(&self, category: &str) -> Result<Vec<Product>, CatalogError> {
        Ok(self.products.list_by_category(category).await?)
    }

    /// A few random products.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn recommendations(&self) -> Result<Vec<Product>, CatalogError> {
        Ok(self.products.sample(RECOMMENDATION_COUNT).await?)
    }

    /// Add a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Invalid` if a required field is blank.
    #[tracing::instrument(skip(self, new), fields(name = %new.name))]
    pub async fn create(&self, new: &NewProduct) -> Result<Product, CatalogError> {
        new.validate().map_err(CatalogError::Invalid)?;
        let product = self.products.create(new).await?;
        self.invalidate_featured().await?;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Flip a product's featured flag.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the product does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_featured(&self, id: ProductId) -> Result<Product, CatalogError> {
        let product = self.products.toggle_featured(id).await?;
        self.invalidate_featured().await?;
        Ok(product)
    }

    /// Remove a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the product does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<(), CatalogError> {
        self.products.delete(id).await?;
        self.invalidate_featured().await?;
        tracing::info!("product deleted");
        Ok(())
    }

    async fn invalidate_featured(&self) -> Result<(), CacheError> {
        self.cache.delete(FEATURED_CACHE_KEY).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use mercato_core::Money;
    use sqlx::postgres::PgPoolOptions;

    use super::*;

    fn product(id: i32) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: "A thing".to_string(),
            price: Money::from_minor(1_999).unwrap(),
            image: "https://img.example/p.png".to_string(),
            category: "jeans".to_string(),
            is_featured: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_featured_served_from_cache() {
        // never connects: the cached list answers
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unreachable")
            .unwrap();
        let cache = KeyValueCache::memory();
        let cached = vec![product(1), product(2)];
        cache
            .set_json(FEATURED_CACHE_KEY, &cached, None)
            .await
            .unwrap();

        let featured = CatalogService::new(&pool, &cache).featured().await.unwrap();
        assert_eq!(featured, cached);
    }

    #[test]
    fn test_missing_row_maps_to_not_found() {
        assert!(matches!(
            CatalogError::from(RepositoryError::NotFound),
            CatalogError::NotFound
        ));
    }
}
