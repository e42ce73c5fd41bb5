//! Stripe REST API client.
//!
//! Only the three calls checkout needs: creating and retrieving Checkout
//! Sessions, and creating single-use percentage coupons. Requests are
//! form-encoded with Stripe's bracketed key syntax
//! (`line_items[0][price_data][currency]`); see [`FormBody`].

mod client;
pub mod types;

pub use client::StripeClient;
pub use types::*;

use thiserror::Error;

/// Errors that can occur when talking to Stripe.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stripe rejected the request.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response or metadata could not be understood.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Ordered `application/x-www-form-urlencoded` pairs using Stripe's nested
/// key syntax.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormBody(Vec<(String, String)>);

impl FormBody {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append `value` under the key formed from `path`.
    pub fn push(&mut self, path: &[&str], value: impl Into<String>) {
        self.0.push((nested_key(path), value.into()));
    }

    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    /// Value of the first pair with this exact key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// `["a", "0", "b"]` becomes `a[0][b]`.
fn nested_key(path: &[&str]) -> String {
    let mut parts = path.iter();
    let mut key = parts.next().map(ToString::to_string).unwrap_or_default();
    for part in parts {
        key.push('[');
        key.push_str(part);
        key.push(']');
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_key() {
        assert_eq!(nested_key(&["mode"]), "mode");
        assert_eq!(
            nested_key(&["line_items", "0", "price_data", "unit_amount"]),
            "line_items[0][price_data][unit_amount]"
        );
        assert_eq!(nested_key(&[]), "");
    }

    #[test]
    fn test_form_body_keeps_order() {
        let mut form = FormBody::new();
        form.push(&["b"], "2");
        form.push(&["a"], "1");
        let keys: Vec<&str> = form.pairs().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(form.get("a"), Some("1"));
        assert_eq!(form.get("c"), None);
    }
}
