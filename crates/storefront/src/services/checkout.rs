//! Checkout orchestration.
//!
//! A session is priced from the server-side cart and current catalog prices.
//! The purchased lines travel in the Stripe session metadata, so the order
//! recorded on success matches what was charged even if the catalog has
//! changed since.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;

use mercato_core::{Money, ProductId, UserId};

use super::cart::{CartError, clear, compute_totals};
use super::coupons::{CouponError, CouponService};
use crate::config::CheckoutConfig;
use crate::db::{CouponRepository, OrderRepository, ProductRepository, RepositoryError, UserRepository};
use crate::models::{Cart, Order, OrderLine, Product};
use crate::stripe::{
    CheckoutSessionRequest, LineItem, SessionMetadata, StripeClient, StripeError,
};

/// Errors from checkout.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Invalid or empty product list")]
    EmptyCart,

    #[error("Payment not completed")]
    NotPaid,

    #[error("Checkout session not found")]
    UnknownSession,

    /// The session was paid by a different user.
    #[error("checkout session belongs to another user")]
    SessionMismatch,

    #[error(transparent)]
    Payment(#[from] StripeError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A created checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutStarted {
    pub session_id: String,
    /// Amount the customer will be charged, after discount.
    pub total_amount: Money,
}

/// Result of the success callback.
#[derive(Debug, Clone)]
pub struct CheckoutCompleted {
    pub order: Order,
    /// `false` when the order already existed from an earlier callback.
    pub created: bool,
}

/// Builds payment sessions and records paid orders.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    stripe: &'a StripeClient,
    config: &'a CheckoutConfig,
    client_origin: &'a str,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        stripe: &'a StripeClient,
        config: &'a CheckoutConfig,
        client_origin: &'a str,
    ) -> Self {
        Self {
            pool,
            stripe,
            config,
            client_origin,
        }
    }

    /// Create a Stripe Checkout Session for the user's cart.
    ///
    /// An unknown, inactive or expired `coupon_code` is ignored. When the
    /// discounted total reaches the gift threshold the user is issued a new
    /// coupon for a later order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` if nothing purchasable is in the
    /// cart and `CheckoutError::Payment` if Stripe rejects the session.
    #[tracing::instrument(skip(self, now))]
    pub async fn create_checkout_session(
        &self,
        user_id: UserId,
        coupon_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<CheckoutStarted, CheckoutError> {
        let (cart, _) = UserRepository::new(self.pool).load_cart(user_id).await?;
        let ids: Vec<ProductId> = cart.product_ids().collect();
        let products: HashMap<ProductId, Product> = ProductRepository::new(self.pool)
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let (line_items, order_lines) = price_lines(&cart, &products);
        if line_items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let coupon = match coupon_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => CouponRepository::new(self.pool)
                .find_active_by_code(user_id, code)
                .await?
                .filter(|c| c.is_usable_at(now)),
            None => None,
        };

        let prices: HashMap<ProductId, Money> =
            products.iter().map(|(id, p)| (*id, p.price)).collect();
        let totals = compute_totals(&cart, &prices, coupon.as_ref(), now)?;

        let coupon_id = match &coupon {
            Some(c) => Some(
                self.stripe
                    .create_percent_coupon(c.discount_percentage)
                    .await?
                    .id,
            ),
            None => None,
        };

        let request = CheckoutSessionRequest {
            currency: self.config.currency.clone(),
            line_items,
            coupon_id,
            success_url: format!(
                "{}/purchase-success?session_id={{CHECKOUT_SESSION_ID}}",
                self.client_origin
            ),
            cancel_url: format!("{}/purchase-cancel", self.client_origin),
            metadata: SessionMetadata {
                user_id,
                coupon_code: coupon.as_ref().map(|c| c.code.clone()),
                products: order_lines,
            },
        };
        let session = self.stripe.create_checkout_session(&request).await?;

        if totals.total >= self.config.gift_coupon_threshold {
            // the session already exists; a missed gift must not fail it
            if let Err(e) = CouponService::new(self.pool).issue_gift(user_id, now).await {
                tracing::error!(error = %e, "failed to issue gift coupon");
            }
        }

        Ok(CheckoutStarted {
            session_id: session.id,
            total_amount: totals.total,
        })
    }

    /// Record the order for a paid session.
    ///
    /// Calling this again for the same session returns the existing order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::UnknownSession` if Stripe has no such session,
    /// `CheckoutError::NotPaid` if Stripe does not report the session
    /// as paid and `CheckoutError::SessionMismatch` if it belongs to another
    /// user.
    #[tracing::instrument(skip(self))]
    pub async fn checkout_success(
        &self,
        user_id: UserId,
        session_id: &str,
    ) -> Result<CheckoutCompleted, CheckoutError> {
        let session = self
            .stripe
            .retrieve_checkout_session(session_id)
            .await
            .map_err(retrieve_error)?;
        if !session.is_paid() {
            return Err(CheckoutError::NotPaid);
        }

        let orders = OrderRepository::new(self.pool);
        if let Some(order) = orders.find_by_session(&session.id).await? {
            return Ok(CheckoutCompleted {
                order,
                created: false,
            });
        }

        let metadata = SessionMetadata::from_map(&session.metadata)?;
        if metadata.user_id != user_id {
            tracing::warn!(owner = %metadata.user_id, "checkout session presented by another user");
            return Err(CheckoutError::SessionMismatch);
        }

        if let Some(code) = &metadata.coupon_code {
            CouponService::new(self.pool).redeem(user_id, code).await?;
        }

        let total = match session.amount_total {
            Some(minor) => Money::from_minor(minor)
                .map_err(|e| StripeError::Parse(format!("bad amount_total: {e}")))?,
            None => line_total(&metadata.products)?,
        };

        let order = match orders
            .create(user_id, &metadata.products, total, &session.id)
            .await
        {
            Ok(order) => order,
            // a concurrent callback recorded it first
            Err(RepositoryError::Conflict(_)) => {
                let existing = orders
                    .find_by_session(&session.id)
                    .await?
                    .ok_or(RepositoryError::NotFound)?;
                return Ok(CheckoutCompleted {
                    order: existing,
                    created: false,
                });
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(order_id = %order.id, total = %order.total_amount, "order created");

        self.clear_cart(user_id).await?;

        Ok(CheckoutCompleted {
            order,
            created: true,
        })
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<(), RepositoryError> {
        let users = UserRepository::new(self.pool);
        let (cart, version) = users.load_cart(user_id).await?;
        if cart.is_empty() {
            return Ok(());
        }
        match users.save_cart(user_id, &clear(cart), version).await {
            Ok(_) => Ok(()),
            Err(RepositoryError::Conflict(_)) => {
                tracing::warn!("cart changed during checkout, left as is");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Stripe line items and order snapshot lines for the cart lines whose
/// product still exists, in cart order.
fn price_lines(cart: &Cart, products: &HashMap<ProductId, Product>) -> (Vec<LineItem>, Vec<OrderLine>) {
    cart.lines()
        .iter()
        .filter_map(|line| {
            let product = products.get(&line.product_id)?;
            let quantity = line.quantity.get();
            Some((
                LineItem {
                    name: product.name.clone(),
                    image: Some(product.image.clone()).filter(|i| !i.is_empty()),
                    unit_amount: product.price,
                    quantity,
                },
                OrderLine {
                    product_id: product.id,
                    quantity,
                    price: product.price,
                },
            ))
        })
        .unzip()
}

/// A session id Stripe does not know is the caller's mistake, not an outage.
fn retrieve_error(err: StripeError) -> CheckoutError {
    match err {
        StripeError::Api { status: 404, .. } => CheckoutError::UnknownSession,
        other => CheckoutError::Payment(other),
    }
}

fn line_total(lines: &[OrderLine]) -> Result<Money, CartError> {
    lines.iter().try_fold(Money::ZERO, |acc, line| {
        Ok(acc.checked_add(line.price.times(line.quantity)?)?)
    })
}
