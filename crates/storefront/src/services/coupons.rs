//! Personal coupons.

use chrono::{DateTime, Duration, Utc};
use rand::seq::IndexedRandom;
use sqlx::PgPool;
use thiserror::Error;

use mercato_core::{Percentage, UserId};

use crate::db::{CouponRepository, RepositoryError};
use crate::models::Coupon;

/// Prefix of generated gift codes.
pub const GIFT_CODE_PREFIX: &str = "GIFT";

/// Random characters after the prefix.
const GIFT_CODE_SUFFIX_LEN: usize = 6;

const GIFT_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Discount granted by a gift coupon, in percent.
pub const GIFT_DISCOUNT_PERCENT: u8 = 10;

/// Days a gift coupon stays valid.
pub const GIFT_VALIDITY_DAYS: i64 = 30;

/// Attempts at finding an unused gift code.
const GIFT_CODE_ATTEMPTS: usize = 3;

/// Errors from coupon operations.
#[derive(Debug, Error)]
pub enum CouponError {
    #[error("Coupon not found")]
    NotFound,

    #[error("Coupon expired")]
    Expired,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Coupon lookups, validation, and gift issuance.
pub struct CouponService<'a> {
    coupons: CouponRepository<'a>,
}

impl<'a> CouponService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            coupons: CouponRepository::new(pool),
        }
    }

    /// The user's active coupon, if any.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::Repository` if the query fails.
    pub async fn active_for_user(&self, user_id: UserId) -> Result<Option<Coupon>, CouponError> {
        Ok(self.coupons.find_active_for_user(user_id).await?)
    }

    /// Check that `code` is one of the user's usable coupons.
    ///
    /// An expired coupon is deactivated on the way out.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::NotFound` if the user has no active coupon with
    /// this code and `CouponError::Expired` if it has lapsed.
    #[tracing::instrument(skip(self))]
    pub async fn validate(
        &self,
        user_id: UserId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Coupon, CouponError> {
        let coupon = self
            .coupons
            .find_active_by_code(user_id, code.trim())
            .await?
            .ok_or(CouponError::NotFound)?;

        if coupon.is_expired_at(now) {
            self.coupons.deactivate(user_id, &coupon.code).await?;
            tracing::info!(code = %coupon.code, "deactivated expired coupon");
            return Err(CouponError::Expired);
        }

        Ok(coupon)
    }

    /// Give the user a fresh gift coupon, replacing their previous one.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::Repository` if the write fails, including when
    /// every generated code collided with an existing one.
    #[tracing::instrument(skip(self, now))]
    pub async fn issue_gift(&self, user_id: UserId, now: DateTime<Utc>) -> Result<Coupon, CouponError> {
        let discount = Percentage::new(GIFT_DISCOUNT_PERCENT)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        let expiration = now + Duration::days(GIFT_VALIDITY_DAYS);

        let mut attempt = 1;
        loop {
            let code = generate_gift_code();
            match self
                .coupons
                .replace_for_user(user_id, &code, discount, expiration)
                .await
            {
                Ok(coupon) => {
                    tracing::info!(code = %coupon.code, "issued gift coupon");
                    return Ok(coupon);
                }
                Err(RepositoryError::Conflict(_)) if attempt < GIFT_CODE_ATTEMPTS => {
                    tracing::debug!(attempt, "gift code collision, regenerating");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Mark a coupon as used.
    ///
    /// Returns whether an active coupon was changed.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::Repository` if the update fails.
    pub async fn redeem(&self, user_id: UserId, code: &str) -> Result<bool, CouponError> {
        Ok(self.coupons.deactivate(user_id, code).await?)
    }
}

/// `GIFT` followed by random uppercase letters and digits.
fn generate_gift_code() -> String {
    let mut rng = rand::rng();
    let mut code = String::with_capacity(GIFT_CODE_PREFIX.len() + GIFT_CODE_SUFFIX_LEN);
    code.push_str(GIFT_CODE_PREFIX);
    code.extend(
        (0..GIFT_CODE_SUFFIX_LEN)
            .filter_map(|_| GIFT_CODE_ALPHABET.choose(&mut rng))
            .map(|&b| char::from(b)),
    );
    code
}
