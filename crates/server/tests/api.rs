//! HTTP routes exercised through the router, without a socket.

use std::sync::Arc;

use almanac_core::{ManualClock, SharedClock};
use almanac_server::{build_router, startup, AppState, Settings, SettingsReloader};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

const SETTINGS: &str = r#"
[[scopes]]
id = "home"
name = "家"

[scopes.holidays]
"2024-02-10" = "春节"

[[scopes]]
id = "office"
fields = ["日期", "今日节日"]

[scopes.holidays]
"2024-02-10" = "值班"
"#;

async fn app() -> Router {
    let settings = Settings::from_toml(SETTINGS).unwrap();
    let start = NaiveDate::from_ymd_opt(2024, 2, 10)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    let clock: SharedClock = Arc::new(ManualClock::new(start));
    let engine = startup::build_engine(&settings, clock).await.unwrap();
    engine.refresh_all().await.unwrap();
    build_router(Arc::new(AppState::new(engine)))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read(response).await
}

async fn post(app: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    read(response).await
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn health_lists_scopes() {
    let app = app().await;
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["scopes"], serde_json::json!(["home", "office"]));
    assert!(body["generation"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn data_for_one_scope() {
    let app = app().await;
    let (status, body) = get(&app, "/api/almanac/data?scope=office").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timestamp"], "2024-02-10T09:30:00");

    let data = body["data"].as_object().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data["日期"]["state"], "2024-02-10");
    assert_eq!(data["今日节日"]["state"], "值班");
}

#[tokio::test]
async fn data_without_scope_takes_the_first_value_per_name() {
    let app = app().await;
    let (status, body) = get(&app, "/api/almanac/data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["今日节日"]["state"], "春节");
    assert!(body["data"]["农历"]["attributes"].is_object());
}

#[tokio::test]
async fn unknown_scope_is_not_found() {
    let app = app().await;
    let (status, body) = get(&app, "/api/almanac/data?scope=garage").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("garage"));
}

#[tokio::test]
async fn date_control_moves_the_effective_date() {
    let app = app().await;

    let (status, body) = post(&app, "/api/almanac/date_control", r#"{"action":"next_day"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["effective"].as_str().unwrap().starts_with("2024-02-11"));
    let (_, data) = get(&app, "/api/almanac/data?scope=home").await;
    assert_eq!(data["data"]["日期"]["state"], "2024-02-11");

    let (status, _) = post(
        &app,
        "/api/almanac/date_control",
        r#"{"action":"select_date","date":"2025-10-06"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, data) = get(&app, "/api/almanac/data?scope=home").await;
    assert_eq!(data["data"]["日期"]["state"], "2025-10-06");

    let (status, body) = post(&app, "/api/almanac/date_control", r#"{"action":"today"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["effective"], "2024-02-10T09:30:00");
}

#[tokio::test]
async fn select_date_without_a_date_is_a_bad_request() {
    let app = app().await;
    let (status, body) = post(&app, "/api/almanac/date_control", r#"{"action":"select_date"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("date"));

    let (status, _) = post(&app, "/api/almanac/date_control", r#"{"action":"tomorrow"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn metrics_report_the_startup_refresh() {
    let app = app().await;
    let (status, body) = get(&app, "/api/almanac/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scheduler"]["runs"]["forced"], 1);
    assert_eq!(body["pending_runs"], 0);
}

#[tokio::test]
async fn reload_without_a_settings_file_is_a_conflict() {
    let app = app().await;
    let (status, body) = post(&app, "/api/almanac/reload", "").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("settings file"));
}

#[tokio::test]
async fn reload_applies_the_edited_settings_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("almanac.toml");
    std::fs::write(&path, "[[scopes]]\nid = \"home\"\n").unwrap();

    let start = NaiveDate::from_ymd_opt(2024, 2, 10)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    let clock: SharedClock = Arc::new(ManualClock::new(start));
    let engine = startup::build_engine(&Settings::read(&path).unwrap(), clock)
        .await
        .unwrap();
    let reloader = Arc::new(SettingsReloader::new(&path, Arc::clone(&engine)));
    let app = build_router(Arc::new(AppState::new(engine).with_reloader(reloader)));

    std::fs::write(&path, SETTINGS).unwrap();
    let (status, body) = post(&app, "/api/almanac/reload", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["added"], 2);
    let (_, data) = get(&app, "/api/almanac/data?scope=office").await;
    assert_eq!(data["data"]["今日节日"]["state"], "值班");

    std::fs::write(&path, "[[scopes]\n").unwrap();
    let (status, _) = post(&app, "/api/almanac/reload", "").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (_, health) = get(&app, "/health").await;
    assert_eq!(health["scopes"], serde_json::json!(["home", "office"]));
}
