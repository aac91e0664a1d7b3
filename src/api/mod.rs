/// API routes and handlers
pub mod account;
pub mod admin;
pub mod assets;
pub mod billing;
pub mod middleware;
pub mod public;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(account::routes())
        .merge(assets::routes())
        .merge(billing::routes())
        .merge(public::routes())
        .merge(admin::routes())
}
