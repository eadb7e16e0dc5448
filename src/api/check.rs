/// Public license check endpoint
use crate::{
    context::AppContext,
    error::{GateError, GateResult},
    license,
};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build license check routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/check", get(check_license))
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckQuery {
    #[serde(rename = "compId", default)]
    pub comp_id: String,
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_computers: Option<i64>,
    /// Outer `None` omits the field; `Some(None)` renders `null`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Option<String>>,
}

impl From<license::LicenseVerdict> for CheckResponse {
    fn from(verdict: license::LicenseVerdict) -> Self {
        let reason = verdict.reason().map(str::to_string);
        match verdict {
            license::LicenseVerdict::Valid {
                max_computers,
                expires_at,
            } => CheckResponse {
                valid: true,
                reason: None,
                max_computers: Some(max_computers),
                expires_at: Some(expires_at),
            },
            license::LicenseVerdict::Expired | license::LicenseVerdict::NotFound => {
                CheckResponse {
                    valid: false,
                    reason,
                    max_computers: None,
                    expires_at: None,
                }
            }
        }
    }
}

/// Check a machine's license
///
/// Unknown licenses answer 403; expired ones answer 200 with `valid: false`,
/// which existing clients rely on.
async fn check_license(
    State(ctx): State<AppContext>,
    query: Result<Query<CheckQuery>, QueryRejection>,
) -> GateResult<(StatusCode, Json<CheckResponse>)> {
    let Query(query) = query.map_err(|rejection| GateError::Validation(rejection.body_text()))?;
    let verdict = license::validate(&ctx.licenses, &query.comp_id, &query.key).await?;

    let status = match verdict {
        license::LicenseVerdict::NotFound => StatusCode::FORBIDDEN,
        _ => StatusCode::OK,
    };

    Ok((status, Json(verdict.into())))
}
