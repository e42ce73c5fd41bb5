//! Order repository and sales aggregates.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use mercato_core::{Money, OrderId, ProductId, UserId};

use super::{RepositoryError, map_unique_violation};
use crate::models::{Order, OrderLine};

/// JSONB form of an order line; prices stay in minor units in storage.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredLine {
    product_id: i32,
    quantity: u32,
    price: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    products: serde_json::Value,
    total_amount: i64,
    payment_session_id: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let corrupt = |what: String| {
            RepositoryError::DataCorruption(format!("order {}: {what}", row.id))
        };

        let stored: Vec<StoredLine> =
            serde_json::from_value(row.products.clone()).map_err(|e| corrupt(e.to_string()))?;
        let products = stored
            .into_iter()
            .map(|line| {
                Ok(OrderLine {
                    product_id: ProductId::new(line.product_id),
                    quantity: line.quantity,
                    price: Money::from_minor(line.price).map_err(|e| corrupt(e.to_string()))?,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;
        let total_amount =
            Money::from_minor(row.total_amount).map_err(|e| corrupt(e.to_string()))?;

        Ok(Self {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            products,
            total_amount,
            payment_session_id: row.payment_session_id,
            created_at: row.created_at,
        })
    }
}

/// Order count and revenue over all time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct SalesSummary {
    pub sales: i64,
    pub revenue: i64,
}

/// Orders and revenue on one calendar day (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct DailySalesRow {
    pub day: NaiveDate,
    pub sales: i64,
    pub revenue: i64,
}

const ORDER_COLUMNS: &str = "id, user_id, products, total_amount, payment_session_id, created_at";

/// Repository for orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The order created for a payment session, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or the row is invalid.
    pub async fn find_by_session(&self, session_id: &str) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Record a paid order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if an order already exists for
    /// `session_id`.
    pub async fn create(
        &self,
        user_id: UserId,
        lines: &[OrderLine],
        total_amount: Money,
        session_id: &str,
    ) -> Result<Order, RepositoryError> {
        let stored: Vec<StoredLine> = lines
            .iter()
            .map(|line| StoredLine {
                product_id: line.product_id.as_i32(),
                quantity: line.quantity,
                price: line.price.as_minor(),
            })
            .collect();
        let products = serde_json::to_value(stored)
            .map_err(|e| RepositoryError::DataCorruption(format!("unencodable order: {e}")))?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "INSERT INTO orders (user_id, products, total_amount, payment_session_id) \
             VALUES ($1, $2, $3, $4) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(products)
        .bind(total_amount.as_minor())
        .bind(session_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "order for payment session"))?;

        Order::try_from(row)
    }

    /// Total order count and revenue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn summary(&self) -> Result<SalesSummary, RepositoryError> {
        let summary = sqlx::query_as::<_, SalesSummary>(
            "SELECT COUNT(*) AS sales, COALESCE(SUM(total_amount), 0)::BIGINT AS revenue \
             FROM orders",
        )
        .fetch_one(self.pool)
        .await?;
        Ok(summary)
    }

    /// Per-day totals for days in `[start, end]` that had at least one order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn daily_sales(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySalesRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, DailySalesRow>(
            "SELECT (created_at AT TIME ZONE 'UTC')::date AS day, \
                    COUNT(*) AS sales, \
                    COALESCE(SUM(total_amount), 0)::BIGINT AS revenue \
             FROM orders \
             WHERE (created_at AT TIME ZONE 'UTC')::date BETWEEN $1 AND $2 \
             GROUP BY day \
             ORDER BY day",
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}
