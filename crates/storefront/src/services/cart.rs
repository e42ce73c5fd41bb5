//! Cart rules and the cart service.
//!
//! The free functions are the whole of the cart logic: each takes the current
//! cart by value and returns the next one, with no I/O. [`CartService`] loads
//! the cart document, applies one of them, and writes the result back with a
//! compare-and-swap on the cart version. A lost race surfaces as
//! `RepositoryError::Conflict` and is not retried here.

use std::collections::HashMap;
use std::num::NonZeroU32;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;

use mercato_core::{Money, MoneyError, ProductId, UserId};

use crate::db::{CouponRepository, ProductRepository, RepositoryError, UserRepository};
use crate::models::{Cart, CartItem, CartLine, CartTotals, Coupon};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// A quantity was set for a product that is not in the cart.
    #[error("product {0} is not in the cart")]
    NotInCart(ProductId),

    /// The product does not exist in the catalog.
    #[error("product {0} does not exist")]
    UnknownProduct(ProductId),

    /// Totals do not fit in the money type.
    #[error("cart total is out of range: {0}")]
    Amount(#[from] MoneyError),

    /// Repository/database error, including lost compare-and-swap.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

// =============================================================================
// Cart rules
// =============================================================================

/// Add one unit of `product`, appending a new line if it is not in the cart.
#[must_use]
pub fn add_item(mut cart: Cart, product: ProductId) -> Cart {
    let lines = cart.lines_mut();
    if let Some(line) = lines.iter_mut().find(|line| line.product_id == product) {
        line.quantity = line.quantity.saturating_add(1);
    } else {
        lines.push(CartLine::new(product, NonZeroU32::MIN));
    }
    cart
}

/// Set the quantity of a line already in the cart; `0` removes it.
///
/// # Errors
///
/// Returns `CartError::NotInCart` when `quantity > 0` and the product has no
/// line.
pub fn set_quantity(cart: Cart, product: ProductId, quantity: u32) -> Result<Cart, CartError> {
    let Some(quantity) = NonZeroU32::new(quantity) else {
        return Ok(remove_item(cart, product));
    };

    let mut cart = cart;
    let line = cart
        .lines_mut()
        .iter_mut()
        .find(|line| line.product_id == product)
        .ok_or(CartError::NotInCart(product))?;
    line.quantity = quantity;
    Ok(cart)
}

/// Drop the line for `product`, if any.
#[must_use]
pub fn remove_item(mut cart: Cart, product: ProductId) -> Cart {
    cart.lines_mut().retain(|line| line.product_id != product);
    cart
}

/// Empty the cart.
#[must_use]
pub fn clear(_cart: Cart) -> Cart {
    Cart::new()
}

/// Price the cart.
///
/// Lines whose product has no price (deleted from the catalog) are skipped.
/// The coupon applies only if it is active and unexpired at `now`.
///
/// # Errors
///
/// Returns `CartError::Amount` if the subtotal overflows.
pub fn compute_totals(
    cart: &Cart,
    prices: &HashMap<ProductId, Money>,
    coupon: Option<&Coupon>,
    now: DateTime<Utc>,
) -> Result<CartTotals, CartError> {
    let mut subtotal = Money::ZERO;
    for line in cart.lines() {
        let Some(price) = prices.get(&line.product_id) else {
            continue;
        };
        subtotal = subtotal.checked_add(price.times(line.quantity.get())?)?;
    }

    let discount = coupon
        .filter(|c| c.is_usable_at(now))
        .map_or(Money::ZERO, |c| subtotal.percent(c.discount_percentage));

    Ok(CartTotals {
        subtotal,
        discount,
        total: subtotal.saturating_sub(discount),
    })
}

// =============================================================================
// Cart service
// =============================================================================

/// Loads, mutates and stores a user's cart.
pub struct CartService<'a> {
    users: UserRepository<'a>,
    products: ProductRepository<'a>,
    coupons: CouponRepository<'a>,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
            products: ProductRepository::new(pool),
            coupons: CouponRepository::new(pool),
        }
    }

    /// Cart lines joined with their products, in cart order. Lines for
    /// products that no longer exist are left out.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if loading fails.
    pub async fn items(&self, user_id: UserId) -> Result<Vec<CartItem>, CartError> {
        let (cart, _) = self.users.load_cart(user_id).await?;
        let ids: Vec<ProductId> = cart.product_ids().collect();
        let mut products: HashMap<ProductId, _> = self
            .products
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(cart
            .into_iter()
            .filter_map(|line| {
                products.remove(&line.product_id).map(|product| CartItem {
                    product,
                    quantity: line.quantity,
                })
            })
            .collect())
    }

    /// Add one unit of a catalog product.
    ///
    /// # Errors
    ///
    /// Returns `CartError::UnknownProduct` if the product does not exist and
    /// `RepositoryError::Conflict` (wrapped) on a concurrent write.
    #[tracing::instrument(skip(self))]
    pub async fn add(&self, user_id: UserId, product: ProductId) -> Result<Cart, CartError> {
        if self.products.get_many(&[product]).await?.is_empty() {
            return Err(CartError::UnknownProduct(product));
        }
        self.mutate(user_id, |cart| Ok(add_item(cart, product))).await
    }

    /// Set a line's quantity; `0` removes it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` for a positive quantity on an absent
    /// line.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        product: ProductId,
        quantity: u32,
    ) -> Result<Cart, CartError> {
        self.mutate(user_id, |cart| set_quantity(cart, product, quantity))
            .await
    }

    /// Remove one product, or everything when `product` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` on storage failure or a lost race.
    #[tracing::instrument(skip(self))]
    pub async fn remove(
        &self,
        user_id: UserId,
        product: Option<ProductId>,
    ) -> Result<Cart, CartError> {
        self.mutate(user_id, |cart| {
            Ok(match product {
                Some(id) => remove_item(cart, id),
                None => clear(cart),
            })
        })
        .await
    }

    /// Price the cart at current catalog prices, optionally with one of the
    /// user's coupons. Unknown or inactive codes give no discount.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if loading fails or the total overflows.
    pub async fn totals(
        &self,
        user_id: UserId,
        coupon_code: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<CartTotals, CartError> {
        let (cart, _) = self.users.load_cart(user_id).await?;
        let ids: Vec<ProductId> = cart.product_ids().collect();
        let prices = self.products.prices(&ids).await?;
        let coupon = match coupon_code {
            Some(code) => self.coupons.find_active_by_code(user_id, code).await?,
            None => None,
        };

        compute_totals(&cart, &prices, coupon.as_ref(), now)
    }

    /// Load the cart, apply `change`, and store the result if it differs.
    async fn mutate<F>(&self, user_id: UserId, change: F) -> Result<Cart, CartError>
    where
        F: FnOnce(Cart) -> Result<Cart, CartError>,
    {
        let (cart, version) = self.users.load_cart(user_id).await?;
        let next = change(cart.clone())?;
        if next != cart {
            self.users.save_cart(user_id, &next, version).await?;
        }
        Ok(next)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use mercato_core::{CouponId, Percentage};

    use super::*;

    fn p(id: i32) -> ProductId {
        ProductId::new(id)
    }

    fn qty(cart: &Cart, id: i32) -> Option<u32> {
        cart.quantity_of(p(id)).map(NonZeroU32::get)
    }

    fn coupon(pct: u8, active: bool, expires_in: Duration) -> Coupon {
        Coupon {
            id: CouponId::new(1),
            code: "GIFT7QX2ZA".to_string(),
            discount_percentage: Percentage::new(pct).unwrap(),
            expiration_date: Utc::now() + expires_in,
            is_active: active,
            user_id: UserId::new(1),
        }
    }

    fn prices(pairs: &[(i32, i64)]) -> HashMap<ProductId, Money> {
        pairs
            .iter()
            .map(|&(id, minor)| (p(id), Money::from_minor(minor).unwrap()))
            .collect()
    }

    #[test]
    fn test_add_twice_gives_one_line_of_two() {
        let cart = add_item(add_item(Cart::new(), p(1)), p(1));
        assert_eq!(cart.len(), 1);
        assert_eq!(qty(&cart, 1), Some(2));
    }

    #[test]
    fn test_add_preserves_order() {
        let cart = add_item(add_item(add_item(Cart::new(), p(3)), p(1)), p(3));
        let ids: Vec<i32> = cart.product_ids().map(|id| id.as_i32()).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn test_set_quantity_zero_removes_line() {
        let mut cart = Cart::new();
        for _ in 0..5 {
            cart = add_item(cart, p(2));
        }
        let cart = set_quantity(cart, p(2), 0).unwrap();
        assert!(cart.is_empty());

        // and is a no-op on an absent line
        let cart = set_quantity(cart, p(2), 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_overwrites() {
        let cart = add_item(Cart::new(), p(4));
        let cart = set_quantity(cart, p(4), 7).unwrap();
        assert_eq!(qty(&cart, 4), Some(7));
    }

    #[test]
    fn test_set_quantity_on_absent_line_is_not_found() {
        let cart = add_item(Cart::new(), p(1));
        let err = set_quantity(cart, p(9), 3).unwrap_err();
        assert!(matches!(err, CartError::NotInCart(id) if id == p(9)));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let cart = add_item(add_item(Cart::new(), p(1)), p(2));
        let once = remove_item(cart, p(1));
        let twice = remove_item(once.clone(), p(1));
        assert_eq!(once, twice);
        assert_eq!(qty(&twice, 2), Some(1));
    }

    #[test]
    fn test_clear() {
        let cart = add_item(Cart::new(), p(1));
        assert!(clear(cart).is_empty());
    }

    #[test]
    fn test_totals_with_ten_percent_coupon() {
        let cart = set_quantity(add_item(Cart::new(), p(1)), p(1), 4).unwrap();
        let totals = compute_totals(
            &cart,
            &prices(&[(1, 2_500)]),
            Some(&coupon(10, true, Duration::days(1))),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(totals.subtotal.as_minor(), 10_000);
        assert_eq!(totals.discount.as_minor(), 1_000);
        assert_eq!(totals.total.as_minor(), 9_000);
    }

    #[test]
    fn test_totals_ignore_unusable_coupons() {
        let cart = add_item(Cart::new(), p(1));
        let table = prices(&[(1, 10_000)]);
        let now = Utc::now();

        for unusable in [
            coupon(10, false, Duration::days(1)),
            coupon(10, true, Duration::days(-1)),
        ] {
            let totals = compute_totals(&cart, &table, Some(&unusable), now).unwrap();
            assert_eq!(totals.discount, Money::ZERO);
            assert_eq!(totals.total.as_minor(), 10_000);
        }
    }

    #[test]
    fn test_totals_skip_missing_products() {
        let cart = add_item(add_item(Cart::new(), p(1)), p(2));
        let totals = compute_totals(&cart, &prices(&[(2, 799)]), None, Utc::now()).unwrap();
        assert_eq!(totals.subtotal.as_minor(), 799);
        assert_eq!(totals.total.as_minor(), 799);
    }

    #[test]
    fn test_totals_of_empty_cart() {
        let totals = compute_totals(&Cart::new(), &HashMap::new(), None, Utc::now()).unwrap();
        assert_eq!(totals.total, Money::ZERO);
    }
}
