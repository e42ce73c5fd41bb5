//! Catalog product types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::{Money, ProductId};

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Unit price.
    pub price: Money,
    /// Image URL supplied by the caller.
    pub image: String,
    pub category: String,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a product.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub image: String,
    pub category: String,
    #[serde(default)]
    pub is_featured: bool,
}

impl NewProduct {
    /// Check that every text field is present.
    ///
    /// `price` is already known to be non-negative because [`Money`] cannot
    /// hold a negative amount.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first empty field.
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("name", &self.name),
            ("description", &self.description),
            ("image", &self.image),
            ("category", &self.category),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(format!("{field} is required"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn body(json: &str) -> NewProduct {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_new_product_parses_major_unit_price() {
        let product = body(
            r#"{"name":"Mug","description":"Stoneware","price":"12.50","image":"https://img/mug.png","category":"kitchen"}"#,
        );
        assert_eq!(product.price.as_minor(), 1250);
        assert!(!product.is_featured);
        assert!(product.validate().is_ok());
    }

    #[test]
    fn test_new_product_requires_fields() {
        let product = body(
            r#"{"name":"  ","description":"d","price":"1","image":"i","category":"c"}"#,
        );
        assert_eq!(product.validate().unwrap_err(), "name is required");
    }

    #[test]
    fn test_negative_price_rejected() {
        let result = serde_json::from_str::<NewProduct>(
            r#"{"name":"n","description":"d","price":"-1","image":"i","category":"c"}"#,
        );
        assert!(result.is_err());
    }
}
