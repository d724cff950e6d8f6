#![allow(clippy::unwrap_used, clippy::panic, clippy::todo, clippy::missing_panics_doc, clippy::must_use_candidate, missing_debug_implementations, clippy::cast_precision_loss, clippy::clone_on_ref_ptr, clippy::match_same_arms, clippy::items_after_statements, unreachable_pub, clippy::print_stdout, clippy::similar_names)]
use reqwest::StatusCode;
use reqwest::header::CACHE_CONTROL;
use std::time::Duration;
mod common;

#[tokio::test]
async fn test_liveness_report() {
    let app = common::TestApp::spawn().await;

    let resp = app.client.get(app.url("/api/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[CACHE_CONTROL], "no-store");

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["environment"], "development");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["timestamp"].as_str().unwrap().contains('T'));
    assert!(body["uptime"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn test_uptime_never_decreases() {
    let app = common::TestApp::spawn().await;

    let mut previous = 0.0;
    for _ in 0..3 {
        let body: serde_json::Value = app.client.get(app.url("/api/health")).send().await.unwrap().json().await.unwrap();
        let uptime = body["uptime"].as_f64().unwrap();
        assert!(uptime >= previous, "uptime went from {previous} to {uptime}");
        previous = uptime;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_liveness_ignores_provider_outage() {
    let app = common::TestApp::spawn().await;
    app.provider.set_failing(true);

    let resp = app.client.get(app.url("/api/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_livez() {
    let app = common::TestApp::spawn().await;

    let resp = app.client.get(format!("{}/livez", app.mgmt_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_readyz_tracks_provider() {
    let app = common::TestApp::spawn().await;

    let resp = app.client.get(format!("{}/readyz", app.mgmt_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["identityProvider"], "ok");

    app.provider.set_failing(true);

    let resp = app.client.get(format!("{}/readyz", app.mgmt_url)).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["identityProvider"], "error");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = common::TestApp::spawn().await;

    let resp = app.client.get(app.url("/api/health")).send().await.unwrap();
    assert!(resp.headers().get("x-request-id").is_some());
}
