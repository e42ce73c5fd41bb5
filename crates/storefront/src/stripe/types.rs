//! Stripe request and response types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use mercato_core::{Money, ProductId, UserId};

use super::{FormBody, StripeError};
use crate::models::OrderLine;

/// Metadata key holding the purchasing user's id.
pub const METADATA_USER_ID: &str = "userId";
/// Metadata key holding the coupon code, empty when none was applied.
pub const METADATA_COUPON_CODE: &str = "couponCode";
/// Metadata key holding the JSON snapshot of purchased lines.
pub const METADATA_PRODUCTS: &str = "products";

/// One priced line on a Checkout Session.
#[derive(Debug, Clone)]
pub struct LineItem {
    pub name: String,
    pub image: Option<String>,
    pub unit_amount: Money,
    pub quantity: u32,
}

/// Line snapshot carried through session metadata. Prices are minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataLine {
    pub id: i32,
    pub quantity: u32,
    pub price: i64,
}

impl From<&OrderLine> for MetadataLine {
    fn from(line: &OrderLine) -> Self {
        Self {
            id: line.product_id.as_i32(),
            quantity: line.quantity,
            price: line.price.as_minor(),
        }
    }
}

/// What checkout needs back when the payment succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetadata {
    pub user_id: UserId,
    pub coupon_code: Option<String>,
    pub products: Vec<OrderLine>,
}

impl SessionMetadata {
    fn push_form(&self, form: &mut FormBody) -> Result<(), StripeError> {
        let lines: Vec<MetadataLine> = self.products.iter().map(MetadataLine::from).collect();
        let products =
            serde_json::to_string(&lines).map_err(|e| StripeError::Parse(e.to_string()))?;

        form.push(&["metadata", METADATA_USER_ID], self.user_id.to_string());
        form.push(
            &["metadata", METADATA_COUPON_CODE],
            self.coupon_code.clone().unwrap_or_default(),
        );
        form.push(&["metadata", METADATA_PRODUCTS], products);
        Ok(())
    }

    /// Read metadata written by [`CheckoutSessionRequest::to_form`].
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Parse` if a key is missing or malformed.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, StripeError> {
        let field = |key: &str| {
            map.get(key)
                .ok_or_else(|| StripeError::Parse(format!("session metadata lacks {key}")))
        };

        let user_id = field(METADATA_USER_ID)?
            .parse::<UserId>()
            .map_err(|e| StripeError::Parse(format!("bad userId metadata: {e}")))?;
        let coupon_code = map
            .get(METADATA_COUPON_CODE)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        let lines: Vec<MetadataLine> = serde_json::from_str(field(METADATA_PRODUCTS)?)
            .map_err(|e| StripeError::Parse(format!("bad products metadata: {e}")))?;
        let products = lines
            .into_iter()
            .map(|line| {
                Ok(OrderLine {
                    product_id: ProductId::new(line.id),
                    quantity: line.quantity,
                    price: Money::from_minor(line.price)
                        .map_err(|e| StripeError::Parse(format!("bad line price: {e}")))?,
                })
            })
            .collect::<Result<Vec<_>, StripeError>>()?;

        Ok(Self {
            user_id,
            coupon_code,
            products,
        })
    }
}

/// Parameters of a new Checkout Session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionRequest {
    pub currency: String,
    pub line_items: Vec<LineItem>,
    /// Stripe coupon id applied to the whole session.
    pub coupon_id: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: SessionMetadata,
}

impl CheckoutSessionRequest {
    /// Encode as a Stripe form body.
    ///
    /// # Errors
    ///
    /// Returns `StripeError::Parse` if the metadata cannot be serialized.
    pub fn to_form(&self) -> Result<FormBody, StripeError> {
        let mut form = FormBody::new();
        form.push(&["payment_method_types", "0"], "card");
        form.push(&["mode"], "payment");

        for (i, item) in self.line_items.iter().enumerate() {
            let i = i.to_string();
            form.push(
                &["line_items", &i, "price_data", "currency"],
                self.currency.as_str(),
            );
            form.push(
                &["line_items", &i, "price_data", "product_data", "name"],
                item.name.as_str(),
            );
            if let Some(image) = &item.image {
                form.push(
                    &["line_items", &i, "price_data", "product_data", "images", "0"],
                    image.as_str(),
                );
            }
            form.push(
                &["line_items", &i, "price_data", "unit_amount"],
                item.unit_amount.as_minor().to_string(),
            );
            form.push(&["line_items", &i, "quantity"], item.quantity.to_string());
        }

        if let Some(coupon) = &self.coupon_id {
            form.push(&["discounts", "0", "coupon"], coupon.as_str());
        }

        form.push(&["success_url"], self.success_url.as_str());
        form.push(&["cancel_url"], self.cancel_url.as_str());
        self.metadata.push_form(&mut form)?;
        Ok(form)
    }
}

/// Payment state of a Checkout Session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
    #[serde(other)]
    Unknown,
}

/// The parts of a Checkout Session object we read.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub payment_status: PaymentStatus,
    /// Total after discounts, in minor units.
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// A created Stripe coupon.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeCoupon {
    pub id: String,
}

/// Stripe error envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            currency: "inr".to_string(),
            line_items: vec![
                LineItem {
                    name: "Slim Jeans".to_string(),
                    image: Some("https://img.example/jeans.png".to_string()),
                    unit_amount: Money::from_minor(4_999).unwrap(),
                    quantity: 2,
                },
                LineItem {
                    name: "Socks".to_string(),
                    image: None,
                    unit_amount: Money::from_minor(500).unwrap(),
                    quantity: 1,
                },
            ],
            coupon_id: Some("co_123".to_string()),
            success_url: "http://localhost:5173/purchase-success?session_id={CHECKOUT_SESSION_ID}"
                .to_string(),
            cancel_url: "http://localhost:5173/purchase-cancel".to_string(),
            metadata: SessionMetadata {
                user_id: UserId::new(7),
                coupon_code: Some("GIFTAB12CD".to_string()),
                products: vec![OrderLine {
                    product_id: ProductId::new(3),
                    quantity: 2,
                    price: Money::from_minor(4_999).unwrap(),
                }],
            },
        }
    }

    #[test]
    fn test_checkout_form_fields() {
        let form = request().to_form().unwrap();
        assert_eq!(form.get("mode"), Some("payment"));
        assert_eq!(form.get("line_items[0][price_data][currency]"), Some("inr"));
        assert_eq!(form.get("line_items[0][price_data][unit_amount]"), Some("4999"));
        assert_eq!(
            form.get("line_items[0][price_data][product_data][images][0]"),
            Some("https://img.example/jeans.png")
        );
        assert_eq!(form.get("line_items[1][quantity]"), Some("1"));
        assert_eq!(
            form.get("line_items[1][price_data][product_data][images][0]"),
            None
        );
        assert_eq!(form.get("discounts[0][coupon]"), Some("co_123"));
        assert_eq!(form.get("metadata[userId]"), Some("7"));
        assert_eq!(
            form.get("metadata[products]"),
            Some(r#"[{"id":3,"quantity":2,"price":4999}]"#)
        );
    }

    #[test]
    fn test_metadata_from_session_map() {
        let map: HashMap<String, String> = [
            ("userId", "7"),
            ("couponCode", ""),
            ("products", r#"[{"id":3,"quantity":2,"price":4999}]"#),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let metadata = SessionMetadata::from_map(&map).unwrap();
        assert_eq!(metadata.user_id, UserId::new(7));
        assert_eq!(metadata.coupon_code, None);
        assert_eq!(metadata.products[0].price.as_minor(), 4_999);
    }

    #[test]
    fn test_metadata_without_user_is_rejected() {
        let map = HashMap::from([("products".to_string(), "[]".to_string())]);
        assert!(matches!(
            SessionMetadata::from_map(&map),
            Err(StripeError::Parse(_))
        ));
    }

    #[test]
    fn test_session_deserializes() {
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_test_1",
            "object": "checkout.session",
            "payment_status": "paid",
            "amount_total": 8998,
            "metadata": {"userId": "7"}
        }))
        .unwrap();
        assert!(session.is_paid());
        assert_eq!(session.amount_total, Some(8998));

        let unpaid: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_test_2",
            "payment_status": "something_new",
            "amount_total": null
        }))
        .unwrap();
        assert_eq!(unpaid.payment_status, PaymentStatus::Unknown);
        assert!(unpaid.metadata.is_empty());
    }
}
