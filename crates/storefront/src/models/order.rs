//! Order types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::{Money, OrderId, ProductId, UserId};

/// A purchased line, priced at the time of purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Money,
}

/// An immutable record of a paid checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub products: Vec<OrderLine>,
    pub total_amount: Money,
    pub payment_session_id: String,
    pub created_at: DateTime<Utc>,
}
