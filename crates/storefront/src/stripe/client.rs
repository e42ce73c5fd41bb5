//! Stripe HTTP client.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;

use mercato_core::Percentage;

use super::types::{CheckoutSession, CheckoutSessionRequest, ErrorEnvelope, StripeCoupon};
use super::{FormBody, StripeError};
use crate::config::StripeConfig;

/// Request timeout for Stripe calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    api_base: String,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, StripeError> {
        let mut headers = HeaderMap::new();

        let auth_value = format!("Bearer {}", config.secret_key.expose_secret());
        let mut auth = HeaderValue::from_str(&auth_value)
            .map_err(|e| StripeError::Parse(format!("Invalid API key format: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Create a Checkout Session.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Stripe rejects it.
    #[tracing::instrument(skip(self, request), fields(lines = request.line_items.len()))]
    pub async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeError> {
        let form = request.to_form()?;
        let session: CheckoutSession = self.post("/v1/checkout/sessions", &form).await?;
        tracing::info!(session_id = %session.id, "created checkout session");
        Ok(session)
    }

    /// Fetch a Checkout Session by id.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the session does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, StripeError> {
        let mut url = url::Url::parse(&format!("{}/v1/checkout/sessions", self.api_base))
            .map_err(|e| StripeError::Parse(format!("invalid session url: {e}")))?;
        // percent-encodes the id as a single segment
        url.path_segments_mut()
            .map_err(|()| StripeError::Parse("API base cannot take a path".to_string()))?
            .push(session_id);

        let response = self.client.get(url).send().await?;
        Self::handle_response(response).await
    }

    /// Create a coupon taking `percent` off once.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Stripe rejects it.
    pub async fn create_percent_coupon(
        &self,
        percent: Percentage,
    ) -> Result<StripeCoupon, StripeError> {
        let mut form = FormBody::new();
        form.push(&["percent_off"], percent.get().to_string());
        form.push(&["duration"], "once");
        self.post("/v1/coupons", &form).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &FormBody,
    ) -> Result<T, StripeError> {
        let url = format!("{}{path}", self.api_base);
        let response = self.client.post(&url).form(form.pairs()).send().await?;
        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status.as_u16(), &body));
        }

        response
            .json()
            .await
            .map_err(|e| StripeError::Parse(e.to_string()))
    }

    fn parse_error(status: u16, body: &str) -> StripeError {
        let message = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| {
                let kind = envelope.error.kind.unwrap_or_default();
                envelope.error.message.map(|m| {
                    if kind.is_empty() {
                        m
                    } else {
                        format!("{kind}: {m}")
                    }
                })
            })
            .unwrap_or_else(|| body.to_string());

        StripeError::Api { status, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_reads_envelope() {
        let err = StripeClient::parse_error(
            400,
            r#"{"error":{"message":"No such coupon: 'x'","type":"invalid_request_error"}}"#,
        );
        match err {
            StripeError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid_request_error: No such coupon: 'x'");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_falls_back_to_body() {
        let err = StripeClient::parse_error(502, "bad gateway");
        assert!(matches!(
            err,
            StripeError::Api { status: 502, ref message } if message == "bad gateway"
        ));
    }
}
