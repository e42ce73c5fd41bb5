//! Admin sales analytics.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;

use mercato_core::Money;

use crate::db::{
    DailySalesRow, OrderRepository, ProductRepository, RepositoryError, UserRepository,
};

/// Days covered by the dashboard chart, today included.
pub const DASHBOARD_DAYS: u64 = 7;

/// Store-wide totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub users: i64,
    pub products: i64,
    pub total_sales: i64,
    pub total_revenue: Money,
}

/// Orders and revenue on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailySales {
    /// Serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    pub sales: i64,
    pub revenue: Money,
}

pub struct AnalyticsService<'a> {
    users: UserRepository<'a>,
    products: ProductRepository<'a>,
    orders: OrderRepository<'a>,
}

impl<'a> AnalyticsService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
            products: ProductRepository::new(pool),
            orders: OrderRepository::new(pool),
        }
    }

    /// Counts of users, products and orders, plus total revenue.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a query fails.
    pub async fn summary(&self) -> Result<AnalyticsSummary, RepositoryError> {
        let (users, products, sales) = tokio::try_join!(
            self.users.count(),
            self.products.count(),
            self.orders.summary(),
        )?;

        Ok(AnalyticsSummary {
            users,
            products,
            total_sales: sales.sales,
            total_revenue: revenue(sales.revenue)?,
        })
    }

    /// One entry per day in `[start, end]`, days without orders included.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    pub async fn daily_sales(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySales>, RepositoryError> {
        let rows = self.orders.daily_sales(start, end).await?;
        zero_fill(start, end, &rows)
    }
}

/// The dashboard window ending on the UTC day of `now`.
#[must_use]
pub fn dashboard_window(now: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
    let end = now.date_naive();
    let start = end
        .checked_sub_days(Days::new(DASHBOARD_DAYS - 1))
        .unwrap_or(NaiveDate::MIN);
    (start, end)
}

fn zero_fill(
    start: NaiveDate,
    end: NaiveDate,
    rows: &[DailySalesRow],
) -> Result<Vec<DailySales>, RepositoryError> {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|date| {
            let row = rows.iter().find(|r| r.day == date);
            Ok(DailySales {
                date,
                sales: row.map_or(0, |r| r.sales),
                revenue: revenue(row.map_or(0, |r| r.revenue))?,
            })
        })
        .collect()
}

fn revenue(minor: i64) -> Result<Money, RepositoryError> {
    Money::from_minor(minor)
        .map_err(|e| RepositoryError::DataCorruption(format!("order revenue: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn test_zero_fill_covers_every_day() {
        let rows = [
            DailySalesRow {
                day: day(2),
                sales: 3,
                revenue: 12_000,
            },
            DailySalesRow {
                day: day(5),
                sales: 1,
                revenue: 999,
            },
        ];

        let filled = zero_fill(day(1), day(7), &rows).unwrap();
        assert_eq!(filled.len(), 7);
        assert_eq!(filled[0].date, day(1));
        assert_eq!(filled[0].sales, 0);
        assert_eq!(filled[1].sales, 3);
        assert_eq!(filled[1].revenue.as_minor(), 12_000);
        assert_eq!(filled[4].revenue.as_minor(), 999);
        assert_eq!(filled[6].date, day(7));
    }

    #[test]
    fn test_zero_fill_empty_range() {
        assert!(zero_fill(day(5), day(4), &[]).unwrap().is_empty());
    }

    #[test]
    fn test_dashboard_window_is_seven_days() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 23, 59, 0).unwrap();
        assert_eq!(dashboard_window(now), (day(4), day(10)));
    }

    #[test]
    fn test_daily_sales_json_shape() {
        let entry = DailySales {
            date: day(9),
            sales: 2,
            revenue: Money::from_minor(2_550).unwrap(),
        };
        assert_eq!(
            serde_json::to_value(entry).unwrap(),
            serde_json::json!({"date": "2026-03-09", "sales": 2, "revenue": "25.50"})
        );
    }
}
