//! Product route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use mercato_core::ProductId;

use super::ApiJson;
use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::{NewProduct, Product};
use crate::services::catalog::CatalogService;
use crate::state::AppState;

fn catalog(state: &AppState) -> CatalogService<'_> {
    CatalogService::new(state.pool(), state.cache())
}

/// Every product.
///
/// GET /api/products (admin)
///
/// # Errors
///
/// Returns 401/403 for non-admins.
pub async fn list_all(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Value>, AppError> {
    let products = catalog(&state).list_all().await?;
    Ok(Json(json!({ "products": products })))
}

/// Featured products, served from the session cache when warm.
///
/// GET /api/products/featured
///
/// # Errors
///
/// Returns 500 if the database cannot be read.
pub async fn featured(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(catalog(&state).featured().await?))
}

/// Products in one category.
///
/// GET /api/products/category/{category}
///
/// # Errors
///
/// Returns 500 if the database cannot be read.
pub async fn by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(catalog(&state).by_category(&category).await?))
}

/// A few random products.
///
/// GET /api/products/recommendations
///
/// # Errors
///
/// Returns 500 if the database cannot be read.
pub async fn recommendations(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(catalog(&state).recommendations().await?))
}

/// Add a product.
///
/// POST /api/products (admin)
///
/// # Errors
///
/// Returns 400 if a required field is missing.
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(body): ApiJson<NewProduct>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let product = catalog(&state).create(&body).await?;
    tracing::info!(admin_id = %admin.id, product_id = %product.id, "admin created product");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Flip a product's featured flag.
///
/// PATCH /api/products/{id} (admin)
///
/// # Errors
///
/// Returns 404 if the product does not exist.
pub async fn toggle_featured(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(catalog(&state).toggle_featured(id).await?))
}

/// Remove a product.
///
/// DELETE /api/products/{id} (admin)
///
/// # Errors
///
/// Returns 404 if the product does not exist.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Json<Value>, AppError> {
    catalog(&state).delete(id).await?;
    tracing::info!(admin_id = %admin.id, product_id = %id, "admin deleted product");
    Ok(Json(json!({ "message": "Product deleted successfully" })))
}
