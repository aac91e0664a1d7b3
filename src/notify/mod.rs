/// Event notifications
///
/// Pushes embed-style messages to a chat webhook (Discord-compatible)
/// for operational events: signups, uploads, subscription changes,
/// and moderation actions. Delivery is fire-and-forget; a down
/// webhook never blocks or fails the request that triggered it.
use serde_json::json;
use std::sync::Arc;

const COLOR_GREEN: u32 = 0x22c55e;
const COLOR_BLUE: u32 = 0x3b82f6;
const COLOR_RED: u32 = 0xef4444;
const COLOR_AMBER: u32 = 0xf59e0b;

/// Webhook notifier
#[derive(Clone)]
pub struct Notifier {
    http: reqwest::Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url,
        }
    }

    /// Whether a webhook URL is configured. When not, all sends are no-ops.
    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    pub fn notify_signup(&self, name: &str, email: &str) {
        self.send_embed(
            "New signup",
            &format!("**{}** ({})", name, email),
            COLOR_GREEN,
        );
    }

    pub fn notify_upload(&self, user_name: &str, filename: &str, size: i64) {
        self.send_embed(
            "New upload",
            &format!(
                "**{}** uploaded `{}` ({:.2} MB)",
                user_name,
                filename,
                size as f64 / (1024.0 * 1024.0)
            ),
            COLOR_BLUE,
        );
    }

    pub fn notify_subscription(&self, user_id: &str, event: &str) {
        self.send_embed(
            "Subscription change",
            &format!("User `{}`: {}", user_id, event),
            COLOR_AMBER,
        );
    }

    pub fn notify_moderation(&self, action: &str, target: &str, admin: &str) {
        self.send_embed(
            "Moderation action",
            &format!("**{}** on `{}` by {}", action, target, admin),
            COLOR_RED,
        );
    }

    /// Post an embed in the background. Errors are logged and dropped.
    fn send_embed(&self, title: &str, description: &str, color: u32) {
        let Some(url) = self.webhook_url.clone() else {
            tracing::debug!("Notifier not configured, skipping: {}", title);
            return;
        };

        let body = json!({
            "embeds": [{
                "title": title,
                "description": description,
                "color": color,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }]
        });

        let http = self.http.clone();
        let title = title.to_string();
        tokio::spawn(async move {
            match http.post(&url).json(&body).send().await {
                Ok(response) if !response.status().is_success() => {
                    tracing::warn!(
                        "Webhook notification '{}' rejected: {}",
                        title,
                        response.status()
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Webhook notification '{}' failed: {}", title, e);
                }
            }
        });
    }
}

/// Shared notifier handle
pub type SharedNotifier = Arc<Notifier>;
