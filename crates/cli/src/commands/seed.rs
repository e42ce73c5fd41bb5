//! Seed the catalog from a YAML file.
//!
//! Products go through the catalog service, so field validation and
//! featured-list invalidation match the admin API. A product whose name is
//! already in the catalog is skipped, which makes re-running a seed safe.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use mercato_storefront::cache::KeyValueCache;
use mercato_storefront::config::RedisConfig;
use mercato_storefront::db;
use mercato_storefront::models::NewProduct;
use mercato_storefront::services::CatalogService;

use super::database_url;

/// Layout of a seed file.
#[derive(Debug, Deserialize)]
pub struct ProductSeed {
    pub products: Vec<NewProduct>,
}

/// Outcome of a seed run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Parse and validate a seed file without touching the database.
///
/// # Errors
///
/// Returns an error naming the first invalid product.
pub fn parse_products(content: &str) -> Result<ProductSeed, Box<dyn std::error::Error>> {
    let seed: ProductSeed = serde_yaml::from_str(content)?;
    for (i, product) in seed.products.iter().enumerate() {
        product
            .validate()
            .map_err(|e| format!("product #{} ({}): {e}", i + 1, product.name))?;
    }
    Ok(seed)
}

/// Insert the products listed in `file_path`.
///
/// # Errors
///
/// Returns an error if the file is missing or invalid, or a database or cache
/// operation fails.
pub async fn products(file_path: &str) -> Result<SeedSummary, Box<dyn std::error::Error>> {
    let database_url = database_url()?;

    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading products from file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed = parse_products(&content)?;
    info!(products = seed.products.len(), "Parsed seed file");

    let pool = db::create_pool(&database_url).await?;
    let cache = KeyValueCache::from_config(RedisConfig::from_env()?.as_ref()).await?;
    info!(cache = cache.backend_name(), "Connected to database");

    let catalog = CatalogService::new(&pool, &cache);
    let mut existing: HashSet<String> = catalog
        .list_all()
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();

    let mut summary = SeedSummary::default();
    for product in &seed.products {
        if existing.contains(&product.name) {
            warn!(name = %product.name, "Product already exists, skipping");
            summary.skipped += 1;
            continue;
        }
        let created = catalog.create(product).await?;
        info!(id = %created.id, name = %created.name, "Product created");
        existing.insert(created.name);
        summary.inserted += 1;
    }

    info!("Seeding complete!");
    info!("  Products inserted: {}", summary.inserted);
    info!("  Products skipped (already exist): {}", summary.skipped);
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_seed_file_parses() {
        let seed = parse_products(include_str!("../../data/products.yaml")).unwrap();
        assert_eq!(seed.products.len(), 5);
        assert!(seed.products.iter().any(|p| p.is_featured));
        assert_eq!(seed.products[2].price.as_minor(), 129_950);
    }

    #[test]
    fn test_blank_field_is_rejected() {
        let yaml = r#"
products:
  - name: Scarf
    description: ""
    price: "10.00"
    image: https://images.example.com/scarf.jpg
    category: accessories
"#;
        let err = parse_products(yaml).unwrap_err();
        assert!(err.to_string().contains("Scarf"));
    }

    #[test]
    fn test_featured_defaults_to_false() {
        let yaml = r#"
products:
  - name: Scarf
    description: Wool scarf
    price: "10.00"
    image: https://images.example.com/scarf.jpg
    category: accessories
"#;
        let seed = parse_products(yaml).unwrap();
        assert!(!seed.products[0].is_featured);
    }
}
