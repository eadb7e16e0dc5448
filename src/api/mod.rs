/// API routes and handlers
pub mod admin;
pub mod check;
pub mod download;
pub mod health;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(download::routes())
        .merge(check::routes())
        .merge(admin::routes())
        .merge(health::routes())
}
