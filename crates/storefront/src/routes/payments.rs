//! Payment route handlers.

use axum::{Json, extract::State};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use mercato_core::{Money, OrderId};

use super::ApiJson;
use crate::error::{AppError, add_breadcrumb};
use crate::middleware::RequireAuth;
use crate::services::checkout::CheckoutService;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionRequest {
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionResponse {
    pub id: String,
    pub total_amount: Money,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSuccessRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSuccessResponse {
    pub success: bool,
    pub message: &'static str,
    pub order_id: OrderId,
}

fn checkout(state: &AppState) -> CheckoutService<'_> {
    let config = state.config();
    CheckoutService::new(
        state.pool(),
        state.stripe(),
        &config.checkout,
        config.client_origin(),
    )
}

/// Start a Stripe checkout for the user's cart.
///
/// POST /api/payments/checkout-session
///
/// # Errors
///
/// Returns 400 "Invalid or empty product list" for an empty cart and 500 if
/// Stripe rejects the session.
pub async fn create_checkout_session(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<CheckoutSessionRequest>,
) -> Result<Json<CheckoutSessionResponse>, AppError> {
    let started = checkout(&state)
        .create_checkout_session(user.id, body.coupon_code.as_deref(), Utc::now())
        .await?;
    add_breadcrumb(
        "checkout",
        "Checkout session created",
        &[("session_id", &started.session_id)],
    );

    Ok(Json(CheckoutSessionResponse {
        id: started.session_id,
        total_amount: started.total_amount,
    }))
}

/// Record the order for a paid session. Safe to call more than once.
///
/// POST /api/payments/checkout-success
///
/// # Errors
///
/// Returns 400 "Payment not completed" if Stripe has not marked it paid.
pub async fn checkout_success(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<CheckoutSuccessRequest>,
) -> Result<Json<CheckoutSuccessResponse>, AppError> {
    let session_id = body.session_id.trim();
    if session_id.is_empty() {
        return Err(AppError::Validation("sessionId is required".to_string()));
    }

    let completed = checkout(&state).checkout_success(user.id, session_id).await?;
    let message = if completed.created {
        "Payment successful, order created, and coupon deactivated if used."
    } else {
        "Order already recorded for this payment."
    };

    Ok(Json(CheckoutSuccessResponse {
        success: true,
        message,
        order_id: completed.order.id,
    }))
}
