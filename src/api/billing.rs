/// Billing endpoints: checkout and the provider webhook
use crate::{
    auth::AuthUser,
    billing::{signature, CheckoutRedirect, WebhookEvent, WebhookOutcome},
    context::AppContext,
    error::{HostError, HostResult},
};
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/billing/checkout", post(create_checkout))
        .route("/billing/subscription", get(get_subscription))
        .route("/stripe-webhook", post(webhook))
}

/// POST /billing/checkout
async fn create_checkout(
    State(ctx): State<AppContext>,
    auth: AuthUser,
) -> HostResult<Json<CheckoutRedirect>> {
    let base = &ctx.config.service.public_url;
    let redirect = ctx
        .stripe
        .create_checkout_session(
            &auth.user.id,
            &auth.user.email,
            &format!("{}/billing/success", base),
            &format!("{}/billing/cancel", base),
        )
        .await?;

    Ok(Json(redirect))
}

/// GET /billing/subscription
async fn get_subscription(
    State(ctx): State<AppContext>,
    auth: AuthUser,
) -> HostResult<Json<serde_json::Value>> {
    let sub = ctx.billing.get_for_user(&auth.user.id).await?;

    Ok(Json(match sub {
        Some(sub) => serde_json::json!({
            "plan": sub.plan,
            "status": sub.status,
            "isPremium": sub.is_premium(),
            "currentPeriodEnd": sub.current_period_end,
        }),
        None => serde_json::json!({
            "plan": "FREE",
            "status": "INACTIVE",
            "isPremium": false,
        }),
    }))
}

/// POST /stripe-webhook
///
/// Raw body handler. Signature verification must see the exact bytes
/// the provider signed, so no JSON extractor here.
async fn webhook(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> HostResult<Json<serde_json::Value>> {
    let secret = ctx
        .config
        .billing
        .webhook_secret
        .as_deref()
        .ok_or_else(|| HostError::Upstream("Webhook secret not configured".to_string()))?;

    let header = headers
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| HostError::SignatureInvalid("Missing signature header".to_string()))?;

    signature::verify_signature(header, &body, secret, chrono::Utc::now().timestamp())?;

    let event = WebhookEvent::parse(&body)
        .map_err(|e| HostError::Validation(format!("Invalid webhook payload: {}", e)))?;

    let settings = ctx.settings.get().await?;
    let outcome = ctx.billing.handle_event(&event, &settings).await?;

    crate::metrics::record_webhook_event(&event.event_type, &format!("{:?}", outcome));

    if outcome == WebhookOutcome::Applied {
        ctx.notifier
            .notify_subscription(&event.id, &event.event_type);
    }

    // Always 200 once the signature checks out, or the provider retries
    Ok(Json(serde_json::json!({ "received": true })))
}
