/// Authentication extractors and utilities
use crate::{
    account::ValidatedSession,
    api::middleware::extract_bearer_token,
    context::AppContext,
    db::models::User,
    error::HostError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated context, extracts and validates the session from the request
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub session: ValidatedSession,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthUser {
    type Rejection = HostError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| HostError::Authentication("Missing authorization header".to_string()))?;

        let session = state.user_manager.validate_access_token(&token).await?;

        let user = state.user_manager.get_user(&session.user_id).await?;

        // Banned accounts keep their data but lose API access
        if user.is_banned {
            return Err(HostError::Authorization("Account is banned".to_string()));
        }

        Ok(AuthUser { user, session })
    }
}

/// Admin context, requires the ADMIN role on top of a valid session
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user: User,
    pub session: ValidatedSession,
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminUser {
    type Rejection = HostError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser { user, session } = AuthUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            tracing::warn!("Admin route rejected for user {}", user.id);
            return Err(HostError::Authorization("Admin role required".to_string()));
        }

        Ok(AdminUser { user, session })
    }
}
