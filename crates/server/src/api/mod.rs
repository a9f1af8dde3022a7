//! HTTP handlers.

mod almanac;
mod health;
mod reload;

pub use almanac::{almanac_data, date_control, metrics};
pub use health::health;
pub use reload::reload;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}
