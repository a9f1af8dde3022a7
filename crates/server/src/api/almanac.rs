//! Bulk export, simulated-date control and refresh metrics.

use std::collections::BTreeMap;
use std::sync::Arc;

use almanac_compute::{CacheStats, ComputeError, DateControl, DateControlReport, ExportedField, SchedulerMetrics};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{api_error, ApiError};
use crate::state::AppState;

pub(super) fn compute_error(e: ComputeError) -> ApiError {
    match e {
        ComputeError::ScopeNotFound(_) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        ComputeError::ShuttingDown => api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
        other => {
            warn!(error = %other, "Request failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

// ── Export ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DataQuery {
    pub scope: Option<String>,
}

#[derive(Serialize)]
pub struct DataResponse {
    /// Effective instant the values were derived for.
    pub timestamp: NaiveDateTime,
    pub data: BTreeMap<String, ExportedField>,
}

pub async fn almanac_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DataQuery>,
) -> Result<Json<DataResponse>, ApiError> {
    let data = state
        .engine
        .export(query.scope.as_deref())
        .map_err(compute_error)?;
    Ok(Json(DataResponse {
        timestamp: state.engine.effective_now(),
        data,
    }))
}

// ── Date control ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateAction {
    NextDay,
    PreviousDay,
    Today,
    SelectDate,
}

#[derive(Debug, Deserialize)]
pub struct DateControlRequest {
    pub action: DateAction,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl DateControlRequest {
    fn into_control(self) -> Result<DateControl, &'static str> {
        Ok(match self.action {
            DateAction::NextDay => DateControl::NextDay,
            DateAction::PreviousDay => DateControl::PreviousDay,
            DateAction::Today => DateControl::Today,
            DateAction::SelectDate => {
                DateControl::SelectDate(self.date.ok_or("select_date requires a date (YYYY-MM-DD)")?)
            }
        })
    }
}

pub async fn date_control(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DateControlRequest>, JsonRejection>,
) -> Result<Json<DateControlReport>, ApiError> {
    let Json(request) = payload.map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))?;
    let control = request
        .into_control()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
    let report = state
        .engine
        .apply_date_control(control)
        .await
        .map_err(compute_error)?;
    Ok(Json(report))
}

// ── Metrics ───────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct MetricsResponse {
    pub scheduler: SchedulerMetrics,
    pub cache: CacheStats,
    pub pending_runs: usize,
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        scheduler: state.engine.metrics(),
        cache: state.engine.cache_stats(),
        pending_runs: state.engine.pending_runs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> DateControlRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn select_date_needs_a_date() {
        assert!(request(r#"{"action":"select_date"}"#).into_control().is_err());
        assert_eq!(
            request(r#"{"action":"select_date","date":"2025-10-06"}"#).into_control(),
            Ok(DateControl::SelectDate(NaiveDate::from_ymd_opt(2025, 10, 6).unwrap()))
        );
    }

    #[test]
    fn date_is_ignored_for_relative_steps() {
        assert_eq!(
            request(r#"{"action":"next_day","date":"2025-10-06"}"#).into_control(),
            Ok(DateControl::NextDay)
        );
    }
}
