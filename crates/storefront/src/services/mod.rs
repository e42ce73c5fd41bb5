//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `tokens` - Access/refresh token issuance, rotation and revocation
//! - `auth` - Password signup and login
//! - `cart` - Pure cart rules plus the versioned cart store
//! - `catalog` - Product queries and admin mutations, featured-list cache
//! - `coupons` - Personal coupon validation and gift issuance
//! - `checkout` - Stripe checkout sessions and order creation
//! - `analytics` - Admin sales dashboard
//!
//! Services borrow the pool (and cache or Stripe client where needed) for
//! the length of one request: `CartService::new(state.pool())`.

pub mod analytics;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod tokens;

pub use analytics::AnalyticsService;
pub use auth::{AuthError, AuthService};
pub use cart::{CartError, CartService};
pub use catalog::{CatalogError, CatalogService};
pub use checkout::{CheckoutError, CheckoutService};
pub use coupons::{CouponError, CouponService};
pub use tokens::{TokenError, TokenIssuer, TokenPair};
