/// Subscription billing
///
/// Checkout session creation against the payment provider's API and
/// the webhook-driven state machine that keeps the local subscription
/// table in step with the provider.

mod manager;
pub mod signature;
mod stripe;

pub use manager::{BillingManager, WebhookOutcome};
pub use stripe::{CheckoutRedirect, StripeClient};

use serde::Deserialize;

/// Webhook event envelope
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// Event-specific object, shape varies by event type
    pub object: serde_json::Value,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
