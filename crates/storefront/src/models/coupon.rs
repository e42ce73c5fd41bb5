//! Coupon types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use mercato_core::{CouponId, Percentage, UserId};

/// A personal discount coupon. Each user owns at most one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub discount_percentage: Percentage,
    pub expiration_date: DateTime<Utc>,
    pub is_active: bool,
    pub user_id: UserId,
}

impl Coupon {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date < now
    }

    /// Whether the coupon can discount an order placed at `now`.
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired_at(now)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn coupon(active: bool, expires_in: Duration) -> Coupon {
        Coupon {
            id: CouponId::new(1),
            code: "GIFTABC123".to_string(),
            discount_percentage: Percentage::new(10).unwrap(),
            expiration_date: Utc::now() + expires_in,
            is_active: active,
            user_id: UserId::new(1),
        }
    }

    #[test]
    fn test_usable_requires_active_and_unexpired() {
        let now = Utc::now();
        assert!(coupon(true, Duration::days(1)).is_usable_at(now));
        assert!(!coupon(false, Duration::days(1)).is_usable_at(now));
        assert!(!coupon(true, Duration::days(-1)).is_usable_at(now));
    }
}
