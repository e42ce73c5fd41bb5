//! Request and response bodies of the storefront API.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::{CouponId, Email, Money, OrderId, Percentage, ProductId, Role, UserId};

/// The signed-in user as returned by the auth routes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: Role,
}

/// `GET /api/auth/profile`: the user and their raw cart lines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    #[serde(default)]
    pub cart_items: Vec<CartLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub image: String,
    pub category: String,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new catalog product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub image: String,
    pub category: String,
    pub is_featured: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A cart line with its product details.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CartItem {
    #[serde(flatten)]
    pub product: Product,
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CartTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub discount_percentage: Percentage,
    pub expiration_date: DateTime<Utc>,
    pub is_active: bool,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedCoupon {
    pub message: String,
    pub code: String,
    pub discount_percentage: Percentage,
}

/// A started checkout; `id` is the Stripe session to redirect to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub id: String,
    pub total_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSuccess {
    pub success: bool,
    pub message: String,
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub users: i64,
    pub products: i64,
    pub total_sales: i64,
    pub total_revenue: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub sales: i64,
    pub revenue: Money,
}

/// Admin dashboard payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub analytics_data: AnalyticsSummary,
    pub daily_sales_data: Vec<DailySales>,
}

/// `{"message": ...}` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductList {
    pub products: Vec<Product>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_item_reads_flattened_product() {
        let item: CartItem = serde_json::from_str(
            r#"{
                "id": 3, "name": "Lamp", "description": "Brass", "price": "49.90",
                "image": "https://img.example/lamp.jpg", "category": "home",
                "isFeatured": false,
                "createdAt": "2026-01-02T03:04:05Z", "updatedAt": "2026-01-02T03:04:05Z",
                "quantity": 2
            }"#,
        )
        .unwrap();
        assert_eq!(item.product.id, ProductId::new(3));
        assert_eq!(item.product.price.as_minor(), 4990);
        assert_eq!(item.quantity, 2);
    }

    #[test]
    fn test_profile_reads_cart_lines() {
        let profile: Profile = serde_json::from_str(
            r#"{
                "id": 1, "name": "Ada", "email": "ada@example.com", "role": "customer",
                "createdAt": "2026-01-02T03:04:05Z", "updatedAt": "2026-01-02T03:04:05Z",
                "cartItems": [{"productId": 7, "quantity": 2}]
            }"#,
        )
        .unwrap();
        assert_eq!(profile.user.name, "Ada");
        assert_eq!(
            profile.cart_items,
            vec![CartLine {
                product_id: ProductId::new(7),
                quantity: 2
            }]
        );
    }

    #[test]
    fn test_dashboard_shape() {
        let dashboard: Dashboard = serde_json::from_str(
            r#"{
                "analyticsData": {"users": 4, "products": 9, "totalSales": 2, "totalRevenue": "120.00"},
                "dailySalesData": [{"date": "2026-03-01", "sales": 0, "revenue": "0.00"}]
            }"#,
        )
        .unwrap();
        assert_eq!(dashboard.analytics_data.total_revenue.as_minor(), 12000);
        assert_eq!(dashboard.daily_sales_data.len(), 1);
    }
}
