/// Account endpoints: signup, login, session management, profile
use crate::{
    account::{
        LoginRequest, RefreshRequest, SessionResponse, SignupRequest, SignupResponse, UserProfile,
    },
    auth::AuthUser,
    context::AppContext,
    error::{HostError, HostResult},
};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use validator::Validate;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/user", get(profile))
        .route("/user", delete(delete_account))
}

/// POST /signup
async fn signup(
    State(ctx): State<AppContext>,
    Json(req): Json<SignupRequest>,
) -> HostResult<(StatusCode, Json<SignupResponse>)> {
    req.validate()
        .map_err(|e| HostError::Validation(e.to_string()))?;

    let user = match ctx
        .user_manager
        .signup(&req.name, &req.email, &req.password)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            crate::metrics::record_account_creation(false);
            return Err(e);
        }
    };

    crate::metrics::record_account_creation(true);
    ctx.notifier.notify_signup(&user.name, &user.email);

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user_id: user.id,
            message: "Account created".to_string(),
        }),
    ))
}

/// POST /login
async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> HostResult<Json<SessionResponse>> {
    let (user, session) = ctx.user_manager.login(&req.email, &req.password).await?;

    Ok(Json(SessionResponse {
        user_id: user.id,
        name: user.name,
        email: user.email,
        access_token: session.access_token,
        refresh_token: session.refresh_token,
    }))
}

/// POST /refresh
async fn refresh(
    State(ctx): State<AppContext>,
    Json(req): Json<RefreshRequest>,
) -> HostResult<Json<SessionResponse>> {
    let session = ctx.user_manager.refresh_session(&req.refresh_token).await?;
    let user = ctx.user_manager.get_user(&session.user_id).await?;

    Ok(Json(SessionResponse {
        user_id: user.id,
        name: user.name,
        email: user.email,
        access_token: session.access_token,
        refresh_token: session.refresh_token,
    }))
}

/// POST /logout
async fn logout(
    State(ctx): State<AppContext>,
    auth: AuthUser,
) -> HostResult<Json<serde_json::Value>> {
    ctx.user_manager
        .delete_session(&auth.session.session_id)
        .await?;

    Ok(Json(serde_json::json!({ "message": "Logged out" })))
}

/// GET /user
async fn profile(State(ctx): State<AppContext>, auth: AuthUser) -> HostResult<Json<UserProfile>> {
    let profile = ctx.user_manager.get_profile(&auth.user.id).await?;
    Ok(Json(profile))
}

/// DELETE /user
///
/// Removes stored files first so a crash mid-delete leaves reclaimable
/// rows rather than unreachable bytes.
async fn delete_account(
    State(ctx): State<AppContext>,
    auth: AuthUser,
) -> HostResult<Json<serde_json::Value>> {
    let purged = ctx.asset_store.purge_user_assets(&auth.user.id).await?;
    ctx.user_manager.delete_user(&auth.user.id).await?;

    tracing::info!(
        "Deleted account {} along with {} assets",
        auth.user.id,
        purged
    );

    Ok(Json(serde_json::json!({ "message": "Account deleted" })))
}
