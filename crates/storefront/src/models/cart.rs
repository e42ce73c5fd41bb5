//! Cart document types.
//!
//! A cart lives on the user row as a JSONB array of lines, guarded by a
//! version counter. Mutation rules are in [`crate::services::cart`].

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use mercato_core::{Money, ProductId};

use super::Product;

/// One product in a cart. Zero-quantity lines cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: NonZeroU32,
}

impl CartLine {
    #[must_use]
    pub const fn new(product_id: ProductId, quantity: NonZeroU32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Ordered list of cart lines, at most one per product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart(Vec<CartLine>);

impl Cart {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Quantity of `product_id`, if it is in the cart.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> Option<NonZeroU32> {
        self.0
            .iter()
            .find(|line| line.product_id == product_id)
            .map(|line| line.quantity)
    }

    /// Product ids in cart order.
    pub fn product_ids(&self) -> impl Iterator<Item = ProductId> + '_ {
        self.0.iter().map(|line| line.product_id)
    }

    pub(crate) fn lines_mut(&mut self) -> &mut Vec<CartLine> {
        &mut self.0
    }
}

impl From<Vec<CartLine>> for Cart {
    fn from(lines: Vec<CartLine>) -> Self {
        Self(lines)
    }
}

impl IntoIterator for Cart {
    type Item = CartLine;
    type IntoIter = std::vec::IntoIter<CartLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A cart line joined with its current product record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItem {
    #[serde(flatten)]
    pub product: Product,
    pub quantity: NonZeroU32,
}

/// Price breakdown of a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CartTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_json_shape() {
        let cart = Cart::from(vec![CartLine::new(
            ProductId::new(3),
            NonZeroU32::new(2).unwrap(),
        )]);
        let json = serde_json::to_value(&cart).unwrap();
        assert_eq!(json, serde_json::json!([{"productId": 3, "quantity": 2}]));
    }

    #[test]
    fn test_zero_quantity_is_rejected_on_decode() {
        let result = serde_json::from_str::<Cart>(r#"[{"productId": 3, "quantity": 0}]"#);
        assert!(result.is_err());
    }
}
