/// Webhook-driven subscription state machine
use crate::{
    billing::WebhookEvent,
    db::models::Subscription,
    error::{HostError, HostResult},
    settings::SiteSettings,
};
use chrono::{TimeZone, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Outcome of processing a webhook event, for logging and tests.
/// Every outcome is acknowledged with 200 so the provider stops
/// retrying; only signature and parse failures reject the delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Subscription state was updated
    Applied,
    /// Event referenced a subscription we do not track
    UnknownSubscription,
    /// Event type is not one we handle
    Ignored,
}

/// Billing service
pub struct BillingManager {
    db: SqlitePool,
}

impl BillingManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Fetch a user's subscription row
    pub async fn get_for_user(&self, user_id: &str) -> HostResult<Option<Subscription>> {
        sqlx::query_as::<_, Subscription>("SELECT * FROM subscription WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await
            .map_err(HostError::Database)
    }

    /// Whether the user currently has premium entitlements
    pub async fn is_premium(&self, user_id: &str) -> HostResult<bool> {
        Ok(self
            .get_for_user(user_id)
            .await?
            .map(|s| s.is_premium())
            .unwrap_or(false))
    }

    /// Apply a verified webhook event.
    ///
    /// Transitions are written as absolute states rather than deltas,
    /// so redelivered events settle on the same row contents.
    pub async fn handle_event(
        &self,
        event: &WebhookEvent,
        settings: &SiteSettings,
    ) -> HostResult<WebhookOutcome> {
        let outcome = match event.event_type.as_str() {
            "checkout.session.completed" => self.on_checkout_completed(event, settings).await?,
            "invoice.payment_succeeded" => self.on_payment_succeeded(event).await?,
            "invoice.payment_failed" => self.on_payment_failed(event).await?,
            "customer.subscription.deleted" => {
                self.on_subscription_deleted(event, settings).await?
            }
            other => {
                tracing::debug!("Ignoring webhook event type {}", other);
                WebhookOutcome::Ignored
            }
        };

        tracing::info!(
            "Webhook {} ({}) -> {:?}",
            event.id,
            event.event_type,
            outcome
        );

        Ok(outcome)
    }

    /// Checkout completed: attribute via metadata.userId, upsert the
    /// subscription to ACTIVE/PREMIUM, and raise the user's quota.
    async fn on_checkout_completed(
        &self,
        event: &WebhookEvent,
        settings: &SiteSettings,
    ) -> HostResult<WebhookOutcome> {
        let object = &event.data.object;

        let Some(user_id) = object
            .pointer("/metadata/userId")
            .and_then(|v| v.as_str())
        else {
            tracing::warn!("Checkout event {} missing metadata.userId", event.id);
            return Ok(WebhookOutcome::Ignored);
        };

        let subscription_id = object.get("subscription").and_then(|v| v.as_str());
        let customer_id = object.get("customer").and_then(|v| v.as_str());

        let user_exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user WHERE id = ?1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await
            .map_err(HostError::Database)?;
        if user_exists == 0 {
            tracing::warn!("Checkout event {} for unknown user {}", event.id, user_id);
            return Ok(WebhookOutcome::UnknownSubscription);
        }

        let mut tx = self.db.begin().await.map_err(HostError::Database)?;

        sqlx::query(
            r#"
            INSERT INTO subscription (id, user_id, plan, status, stripe_customer_id, stripe_subscription_id, created_at)
            VALUES (?1, ?2, 'PREMIUM', 'ACTIVE', ?3, ?4, ?5)
            ON CONFLICT(user_id) DO UPDATE SET
                plan = 'PREMIUM',
                status = 'ACTIVE',
                stripe_customer_id = excluded.stripe_customer_id,
                stripe_subscription_id = excluded.stripe_subscription_id,
                canceled_at = NULL
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(customer_id)
        .bind(subscription_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(HostError::Database)?;

        sqlx::query("UPDATE user SET storage_limit = ?1 WHERE id = ?2")
            .bind(settings.premium_storage_limit)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(HostError::Database)?;

        tx.commit().await.map_err(HostError::Database)?;

        Ok(WebhookOutcome::Applied)
    }

    /// Renewal payment landed: confirm ACTIVE and extend the period end
    async fn on_payment_succeeded(&self, event: &WebhookEvent) -> HostResult<WebhookOutcome> {
        let Some(subscription_id) = external_subscription_id(event) else {
            return Ok(WebhookOutcome::Ignored);
        };

        let period_end = event
            .data
            .object
            .pointer("/lines/data/0/period/end")
            .or_else(|| event.data.object.get("period_end"))
            .and_then(|v| v.as_i64())
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single());

        let price_id = event
            .data
            .object
            .pointer("/lines/data/0/price/id")
            .and_then(|v| v.as_str());

        let result = sqlx::query(
            "UPDATE subscription SET status = 'ACTIVE', current_period_end = ?1,
                    stripe_price_id = COALESCE(?2, stripe_price_id)
             WHERE stripe_subscription_id = ?3",
        )
        .bind(period_end)
        .bind(price_id)
        .bind(&subscription_id)
        .execute(&self.db)
        .await
        .map_err(HostError::Database)?;

        if result.rows_affected() == 0 {
            return Ok(WebhookOutcome::UnknownSubscription);
        }

        Ok(WebhookOutcome::Applied)
    }

    /// Payment failed: mark PAST_DUE. The plan and the user's quota
    /// stay untouched until the provider gives up and cancels.
    async fn on_payment_failed(&self, event: &WebhookEvent) -> HostResult<WebhookOutcome> {
        let Some(subscription_id) = external_subscription_id(event) else {
            return Ok(WebhookOutcome::Ignored);
        };

        let result = sqlx::query(
            "UPDATE subscription SET status = 'PAST_DUE' WHERE stripe_subscription_id = ?1",
        )
        .bind(&subscription_id)
        .execute(&self.db)
        .await
        .map_err(HostError::Database)?;

        if result.rows_affected() == 0 {
            return Ok(WebhookOutcome::UnknownSubscription);
        }

        Ok(WebhookOutcome::Applied)
    }

    /// Subscription ended: CANCELED/FREE and the quota drops back to
    /// the free tier. Existing bytes over the new limit stay stored;
    /// only further uploads are blocked.
    async fn on_subscription_deleted(
        &self,
        event: &WebhookEvent,
        settings: &SiteSettings,
    ) -> HostResult<WebhookOutcome> {
        let Some(subscription_id) = event
            .data
            .object
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
        else {
            return Ok(WebhookOutcome::Ignored);
        };

        let row: Option<(String,)> = sqlx::query_as(
            "SELECT user_id FROM subscription WHERE stripe_subscription_id = ?1",
        )
        .bind(&subscription_id)
        .fetch_optional(&self.db)
        .await
        .map_err(HostError::Database)?;

        let Some((user_id,)) = row else {
            return Ok(WebhookOutcome::UnknownSubscription);
        };

        let mut tx = self.db.begin().await.map_err(HostError::Database)?;

        sqlx::query(
            "UPDATE subscription SET status = 'CANCELED', plan = 'FREE', canceled_at = ?1
             WHERE stripe_subscription_id = ?2",
        )
        .bind(Utc::now())
        .bind(&subscription_id)
        .execute(&mut *tx)
        .await
        .map_err(HostError::Database)?;

        sqlx::query("UPDATE user SET storage_limit = ?1 WHERE id = ?2")
            .bind(settings.free_storage_limit)
            .bind(&user_id)
            .execute(&mut *tx)
            .await
            .map_err(HostError::Database)?;

        tx.commit().await.map_err(HostError::Database)?;

        Ok(WebhookOutcome::Applied)
    }
}

/// Pull the provider's subscription id out of an invoice event
fn external_subscription_id(event: &WebhookEvent) -> Option<String> {
    event
        .data
        .object
        .get("subscription")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Plan, SubscriptionStatus};
    use serde_json::json;

    async fn setup() -> (BillingManager, SqlitePool) {
        let pool = crate::db::test_pool().await;
        (BillingManager::new(pool.clone()), pool)
    }

    async fn seed_user(pool: &SqlitePool, id: &str, limit: i64) {
        sqlx::query(
            "INSERT INTO user (id, name, email, password_hash, role, is_banned, storage_used, storage_limit, created_at)
             VALUES (?1, ?1, ?1 || '@x.com', 'x', 'USER', 0, 0, ?2, ?3)",
        )
        .bind(id)
        .bind(limit)
        .bind(Utc::now())
        .execute(pool)
        .await
        .unwrap();
    }

    fn checkout_event(user_id: &str, sub_id: &str) -> WebhookEvent {
        WebhookEvent {
            id: "evt_1".to_string(),
            event_type: "checkout.session.completed".to_string(),
            data: crate::billing::WebhookEventData {
                object: json!({
                    "subscription": sub_id,
                    "customer": "cus_1",
                    "metadata": { "userId": user_id }
                }),
            },
        }
    }

    fn invoice_event(event_type: &str, sub_id: &str) -> WebhookEvent {
        WebhookEvent {
            id: "evt_2".to_string(),
            event_type: event_type.to_string(),
            data: crate::billing::WebhookEventData {
                object: json!({ "subscription": sub_id }),
            },
        }
    }

    async fn current_sub(mgr: &BillingManager, user_id: &str) -> Subscription {
        mgr.get_for_user(user_id).await.unwrap().unwrap()
    }

    async fn user_limit(pool: &SqlitePool, user_id: &str) -> i64 {
        sqlx::query_scalar("SELECT storage_limit FROM user WHERE id = ?1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_checkout_completed_activates_and_raises_quota() {
        let (mgr, pool) = setup().await;
        let settings = SiteSettings::default();
        seed_user(&pool, "u1", settings.free_storage_limit).await;

        let outcome = mgr
            .handle_event(&checkout_event("u1", "sub_1"), &settings)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Applied);

        let sub = current_sub(&mgr, "u1").await;
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.plan, Plan::Premium);
        assert_eq!(sub.stripe_subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(user_limit(&pool, "u1").await, settings.premium_storage_limit);
        assert!(mgr.is_premium("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_checkout_is_idempotent() {
        let (mgr, pool) = setup().await;
        let settings = SiteSettings::default();
        seed_user(&pool, "u1", settings.free_storage_limit).await;

        let event = checkout_event("u1", "sub_1");
        mgr.handle_event(&event, &settings).await.unwrap();
        mgr.handle_event(&event, &settings).await.unwrap();

        // Still one row per user, still ACTIVE
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscription WHERE user_id = 'u1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(mgr.is_premium("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_payment_failed_marks_past_due_without_downgrade() {
        let (mgr, pool) = setup().await;
        let settings = SiteSettings::default();
        seed_user(&pool, "u1", settings.free_storage_limit).await;

        mgr.handle_event(&checkout_event("u1", "sub_1"), &settings)
            .await
            .unwrap();

        let outcome = mgr
            .handle_event(&invoice_event("invoice.payment_failed", "sub_1"), &settings)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Applied);

        let sub = current_sub(&mgr, "u1").await;
        assert_eq!(sub.status, SubscriptionStatus::PastDue);
        // Plan and quota are untouched while the provider retries
        assert_eq!(sub.plan, Plan::Premium);
        assert_eq!(user_limit(&pool, "u1").await, settings.premium_storage_limit);
        assert!(!mgr.is_premium("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_payment_succeeded_recovers_past_due() {
        let (mgr, pool) = setup().await;
        let settings = SiteSettings::default();
        seed_user(&pool, "u1", settings.free_storage_limit).await;

        mgr.handle_event(&checkout_event("u1", "sub_1"), &settings)
            .await
            .unwrap();
        mgr.handle_event(&invoice_event("invoice.payment_failed", "sub_1"), &settings)
            .await
            .unwrap();
        mgr.handle_event(
            &invoice_event("invoice.payment_succeeded", "sub_1"),
            &settings,
        )
        .await
        .unwrap();

        let sub = current_sub(&mgr, "u1").await;
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(mgr.is_premium("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_subscription_deleted_downgrades() {
        let (mgr, pool) = setup().await;
        let settings = SiteSettings::default();
        seed_user(&pool, "u1", settings.free_storage_limit).await;

        mgr.handle_event(&checkout_event("u1", "sub_1"), &settings)
            .await
            .unwrap();

        let deleted = WebhookEvent {
            id: "evt_3".to_string(),
            event_type: "customer.subscription.deleted".to_string(),
            data: crate::billing::WebhookEventData {
                object: json!({ "id": "sub_1" }),
            },
        };
        let outcome = mgr.handle_event(&deleted, &settings).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Applied);

        let sub = current_sub(&mgr, "u1").await;
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
        assert_eq!(sub.plan, Plan::Free);
        assert!(sub.canceled_at.is_some());
        assert_eq!(user_limit(&pool, "u1").await, settings.free_storage_limit);
    }

    #[tokio::test]
    async fn test_unknown_subscription_is_acknowledged() {
        let (mgr, _pool) = setup().await;
        let settings = SiteSettings::default();

        let outcome = mgr
            .handle_event(&invoice_event("invoice.payment_failed", "sub_x"), &settings)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::UnknownSubscription);
    }

    #[tokio::test]
    async fn test_unhandled_event_type_is_ignored() {
        let (mgr, _pool) = setup().await;
        let settings = SiteSettings::default();

        let event = WebhookEvent {
            id: "evt_4".to_string(),
            event_type: "customer.updated".to_string(),
            data: crate::billing::WebhookEventData {
                object: json!({}),
            },
        };
        let outcome = mgr.handle_event(&event, &settings).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored);
    }
}
