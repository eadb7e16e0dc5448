/// Health check endpoint
///
/// Reports the server clock and whether the artifact is in place. Does not
/// touch the database.
use crate::context::AppContext;
use axum::{extract::State, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub data_file_exists: bool,
}

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/health", get(health))
}

async fn health(State(ctx): State<AppContext>) -> Json<HealthStatus> {
    let data_file_exists = tokio::fs::try_exists(&ctx.config.storage.data_file)
        .await
        .unwrap_or(false);

    Json(HealthStatus {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        data_file_exists,
    })
}
