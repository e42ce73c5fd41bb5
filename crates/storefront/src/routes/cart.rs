//! Cart route handlers.
//!
//! Every write loads the cart with its version and stores the result with a
//! compare-and-swap; a concurrent write from another tab surfaces as 409.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
};
use chrono::Utc;
use serde::Deserialize;

use mercato_core::ProductId;

use super::ApiJson;
use crate::error::{AppError, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::models::{Cart, CartItem, CartTotals};
use crate::services::cart::CartService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromCartRequest {
    pub product_id: Option<ProductId>,
}

#[derive(Debug, Deserialize)]
pub struct TotalsQuery {
    pub coupon: Option<String>,
}

/// Cart lines with product details.
///
/// GET /api/cart
///
/// # Errors
///
/// Returns 401 without a valid access token.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<CartItem>>, AppError> {
    Ok(Json(CartService::new(state.pool()).items(user.id).await?))
}

/// Add one unit of a product.
///
/// POST /api/cart
///
/// # Errors
///
/// Returns 404 for an unknown product and 409 on a concurrent cart write.
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<AddToCartRequest>,
) -> Result<Json<Cart>, AppError> {
    let cart = CartService::new(state.pool())
        .add(user.id, body.product_id)
        .await?;
    add_breadcrumb(
        "cart",
        "Added to cart",
        &[("product_id", &body.product_id.to_string())],
    );
    Ok(Json(cart))
}

/// Set a line's quantity; 0 removes it.
///
/// PUT /api/cart/{id}
///
/// # Errors
///
/// Returns 404 if the product is not in the cart.
pub async fn update_quantity(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
    ApiJson(body): ApiJson<UpdateQuantityRequest>,
) -> Result<Json<Cart>, AppError> {
    let cart = CartService::new(state.pool())
        .update_quantity(user.id, id, body.quantity)
        .await?;
    Ok(Json(cart))
}

/// Remove one product, or empty the cart when no `productId` is given.
///
/// DELETE /api/cart
///
/// The body is optional.
///
/// # Errors
///
/// Returns 400 for a malformed body and 409 on a concurrent cart write.
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    body: Bytes,
) -> Result<Json<Cart>, AppError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        RemoveFromCartRequest::default()
    } else {
        serde_json::from_slice::<RemoveFromCartRequest>(&body)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))?
    };

    let cart = CartService::new(state.pool())
        .remove(user.id, request.product_id)
        .await?;
    Ok(Json(cart))
}

/// Price the cart, optionally with a coupon.
///
/// GET /api/cart/totals?coupon=CODE
///
/// # Errors
///
/// Returns 401 without a valid access token.
pub async fn totals(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<TotalsQuery>,
) -> Result<Json<CartTotals>, AppError> {
    let coupon = query.coupon.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let totals = CartService::new(state.pool())
        .totals(user.id, coupon, Utc::now())
        .await?;
    Ok(Json(totals))
}
