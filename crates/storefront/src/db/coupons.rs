//! Coupon repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use mercato_core::{CouponId, Percentage, UserId};

use super::{RepositoryError, map_unique_violation};
use crate::models::Coupon;

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: i32,
    code: String,
    discount_percentage: i16,
    expiration_date: DateTime<Utc>,
    is_active: bool,
    user_id: i32,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = RepositoryError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        let discount_percentage = Percentage::try_from(row.discount_percentage).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid coupon {}: {e}", row.code))
        })?;

        Ok(Self {
            id: CouponId::new(row.id),
            code: row.code,
            discount_percentage,
            expiration_date: row.expiration_date,
            is_active: row.is_active,
            user_id: UserId::new(row.user_id),
        })
    }
}

const COUPON_COLUMNS: &str = "id, code, discount_percentage, expiration_date, is_active, user_id";

/// Repository for personal coupons.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's coupon if it is still active.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or the row is invalid.
    pub async fn find_active_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE user_id = $1 AND is_active"
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Coupon::try_from).transpose()
    }

    /// The user's active coupon with this exact code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or the row is invalid.
    pub async fn find_active_by_code(
        &self,
        user_id: UserId,
        code: &str,
    ) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE user_id = $1 AND code = $2 AND is_active"
        ))
        .bind(user_id)
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        row.map(Coupon::try_from).transpose()
    }

    /// Mark the user's coupon with this code as inactive.
    ///
    /// Returns whether a coupon was changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn deactivate(&self, user_id: UserId, code: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE coupons SET is_active = FALSE, updated_at = now() \
             WHERE user_id = $1 AND code = $2 AND is_active",
        )
        .bind(user_id)
        .bind(code)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Give the user a fresh coupon, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if `code` is already taken by
    /// another user.
    pub async fn replace_for_user(
        &self,
        user_id: UserId,
        code: &str,
        discount: Percentage,
        expiration_date: DateTime<Utc>,
    ) -> Result<Coupon, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "INSERT INTO coupons (code, discount_percentage, expiration_date, user_id) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 code = EXCLUDED.code, \
                 discount_percentage = EXCLUDED.discount_percentage, \
                 expiration_date = EXCLUDED.expiration_date, \
                 is_active = TRUE, \
                 updated_at = now() \
             RETURNING {COUPON_COLUMNS}"
        ))
        .bind(code)
        .bind(i16::from(discount))
        .bind(expiration_date)
        .bind(user_id)
        .fetch_one(self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "coupon code"))?;

        Coupon::try_from(row)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_percentage_is_corruption() {
        let row = CouponRow {
            id: 1,
            code: "GIFT000000".to_string(),
            discount_percentage: 140,
            expiration_date: Utc::now(),
            is_active: true,
            user_id: 1,
        };
        assert!(matches!(
            Coupon::try_from(row),
            Err(RepositoryError::DataCorruption(_))
        ));
    }
}
