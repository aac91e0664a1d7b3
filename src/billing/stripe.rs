/// Minimal payment provider API client
///
/// Only the checkout-session endpoint is used; everything else flows
/// back through webhooks.
use crate::{
    config::BillingConfig,
    error::{HostError, HostResult},
};
use serde::Deserialize;

const API_BASE: &str = "https://api.stripe.com/v1";

pub struct StripeClient {
    http: reqwest::Client,
    secret_key: Option<String>,
    price_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    id: String,
    url: Option<String>,
}

/// Hosted checkout session handed back to the frontend
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRedirect {
    pub session_id: String,
    pub url: String,
}

impl StripeClient {
    pub fn new(config: &BillingConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: config.secret_key.clone(),
            price_id: config.price_id.clone(),
        }
    }

    /// Whether API credentials are present. When not configured,
    /// checkout is unavailable but webhooks can still be tested.
    pub fn is_configured(&self) -> bool {
        self.secret_key.is_some() && self.price_id.is_some()
    }

    /// Create a hosted checkout session for a subscription purchase.
    /// The user id rides along in metadata so the completion webhook
    /// can attribute the purchase.
    pub async fn create_checkout_session(
        &self,
        user_id: &str,
        customer_email: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> HostResult<CheckoutRedirect> {
        let (Some(secret_key), Some(price_id)) = (&self.secret_key, &self.price_id) else {
            return Err(HostError::Upstream("Billing is not configured".to_string()));
        };

        let params = [
            ("mode", "subscription"),
            ("line_items[0][price]", price_id.as_str()),
            ("line_items[0][quantity]", "1"),
            ("customer_email", customer_email),
            ("metadata[userId]", user_id),
            ("success_url", success_url),
            ("cancel_url", cancel_url),
        ];

        let response = self
            .http
            .post(format!("{}/checkout/sessions", API_BASE))
            .bearer_auth(secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| HostError::Upstream(format!("Checkout request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Checkout session creation failed: {} {}", status, body);
            return Err(HostError::Upstream(format!(
                "Payment provider returned {}",
                status
            )));
        }

        let session: CheckoutSession = response
            .json()
            .await
            .map_err(|e| HostError::Upstream(format!("Invalid checkout response: {}", e)))?;

        let url = session
            .url
            .ok_or_else(|| HostError::Upstream("Checkout session has no URL".to_string()))?;

        Ok(CheckoutRedirect {
            session_id: session.id,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_client() {
        let client = StripeClient::new(&crate::config::BillingConfig {
            secret_key: None,
            webhook_secret: None,
            price_id: None,
        });
        assert!(!client.is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_checkout_fails_fast() {
        let client = StripeClient::new(&crate::config::BillingConfig {
            secret_key: None,
            webhook_secret: None,
            price_id: None,
        });

        let err = client
            .create_checkout_session("u1", "a@x.com", "http://s", "http://c")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::HostError::Upstream(_)));
    }
}
