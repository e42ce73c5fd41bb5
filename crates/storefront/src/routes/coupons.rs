//! Coupon route handlers.

use axum::{Json, extract::State};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use mercato_core::Percentage;

use super::ApiJson;
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::Coupon;
use crate::services::coupons::CouponService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponResponse {
    pub message: &'static str,
    pub code: String,
    pub discount_percentage: Percentage,
}

/// The user's active coupon, or `null`.
///
/// GET /api/coupons
///
/// # Errors
///
/// Returns 401 without a valid access token.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Option<Coupon>>, AppError> {
    Ok(Json(
        CouponService::new(state.pool())
            .active_for_user(user.id)
            .await?,
    ))
}

/// Check a coupon code.
///
/// POST /api/coupons/validate
///
/// # Errors
///
/// Returns 404 "Coupon not found" or "Coupon expired".
pub async fn validate(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<ValidateCouponRequest>,
) -> Result<Json<ValidateCouponResponse>, AppError> {
    let coupon = CouponService::new(state.pool())
        .validate(user.id, &body.code, Utc::now())
        .await?;

    Ok(Json(ValidateCouponResponse {
        message: "Coupon is valid",
        code: coupon.code,
        discount_percentage: coupon.discount_percentage,
    }))
}
