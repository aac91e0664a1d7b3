/// Request middleware
use crate::{context::AppContext, error::HostError};
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Maintenance mode gate
///
/// While the settings row has maintenance_mode set, all routes return
/// 503 except health, metrics, login and admin routes (so an admin can
/// still get in and turn it off), and the billing webhook (the
/// provider keeps retrying rejected deliveries).
pub async fn maintenance_gate(
    State(ctx): State<AppContext>,
    req: Request,
    next: Next,
) -> Result<Response, HostError> {
    let path = req.uri().path();

    let exempt = path == "/health"
        || path == "/metrics"
        || path == "/login"
        || path == "/stripe-webhook"
        || path.starts_with("/admin");

    if !exempt {
        let settings = ctx.settings.get().await?;
        if settings.maintenance_mode {
            let message = settings
                .maintenance_message
                .unwrap_or_else(|| "Service is down for maintenance".to_string());

            return Ok((
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                axum::Json(crate::error::ErrorResponse {
                    error: "MaintenanceMode".to_string(),
                    message,
                }),
            )
                .into_response());
        }
    }

    Ok(next.run(req).await)
}

/// Record request count and latency per route
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let started = std::time::Instant::now();

    let response = next.run(req).await;

    crate::metrics::record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn test_extract_bearer_token_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Basic abc123".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);
        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }
}
