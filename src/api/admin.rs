/// Admin API Endpoints
///
/// Every handler takes [`AdminKey`] first, so an invalid key is rejected
/// before the body is parsed or storage is touched.
use crate::{
    auth::AdminKey,
    context::AppContext,
    downloads::{DownloadRecord, RECENT_DOWNLOADS_LIMIT},
    error::{GateError, GateResult},
    license::{self, License, LicenseRegistration},
};
use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build admin API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/api/admin/licenses",
            get(list_licenses).post(save_license),
        )
        .route("/api/admin/licenses/:id", delete(deactivate_license))
        .route("/api/admin/downloads", get(list_downloads))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveLicenseResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeactivateResponse {
    pub success: bool,
}

/// List all licenses, newest first
async fn list_licenses(
    State(ctx): State<AppContext>,
    _admin: AdminKey,
) -> GateResult<Json<Vec<License>>> {
    let licenses = ctx.licenses.list().await?;
    Ok(Json(licenses))
}

/// Create or update the license for a machine (key generator entry point)
async fn save_license(
    State(ctx): State<AppContext>,
    _admin: AdminKey,
    payload: Result<Json<LicenseRegistration>, JsonRejection>,
) -> GateResult<Json<SaveLicenseResponse>> {
    let Json(registration) =
        payload.map_err(|rejection| GateError::Validation(rejection.body_text()))?;

    license::register(&ctx.licenses, registration).await?;

    Ok(Json(SaveLicenseResponse {
        success: true,
        message: "License saved".to_string(),
    }))
}

/// Deactivate a license; unknown ids succeed as well
async fn deactivate_license(
    State(ctx): State<AppContext>,
    _admin: AdminKey,
    id: Result<Path<i64>, PathRejection>,
) -> GateResult<Json<DeactivateResponse>> {
    let Path(id) = id.map_err(|rejection| GateError::Validation(rejection.body_text()))?;

    let matched = ctx.licenses.deactivate(id).await?;
    tracing::info!(license_id = id, matched, "license deactivated");

    Ok(Json(DeactivateResponse { success: true }))
}

/// Recent downloads with the customer of the matching license
async fn list_downloads(
    State(ctx): State<AppContext>,
    _admin: AdminKey,
) -> GateResult<Json<Vec<DownloadRecord>>> {
    let downloads = ctx.downloads.recent(RECENT_DOWNLOADS_LIMIT).await?;
    Ok(Json(downloads))
}
