//! Re-apply the scopes of the settings file on demand.

use std::sync::Arc;

use almanac_compute::BuildReport;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::{api_error, ApiError};
use crate::reload::ReloadError;
use crate::state::AppState;

pub async fn reload(State(state): State<Arc<AppState>>) -> Result<Json<BuildReport>, ApiError> {
    let reloader = state
        .reloader
        .as_ref()
        .ok_or_else(|| api_error(StatusCode::CONFLICT, "server was not started from a settings file"))?;
    match reloader.reload().await {
        Ok(report) => Ok(Json(report)),
        Err(ReloadError::Settings(e)) => Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())),
        Err(ReloadError::Compute(e)) => Err(super::almanac::compute_error(e)),
    }
}
