//! Health and metrics endpoint tests.

mod common;

use common::{TestApp, TEST_USER_ID};

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app
        .get("/health", TEST_USER_ID)
        .send()
        .await
        .expect("health request failed");

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("invalid health body");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "forwarding-service");
}

#[tokio::test]
async fn readiness_check_works() {
    let app = TestApp::spawn().await;

    let response = app
        .get("/ready", TEST_USER_ID)
        .send()
        .await
        .expect("readiness request failed");

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn metrics_endpoint_exposes_counters() {
    let app = TestApp::spawn().await;
    app.create_request(TEST_USER_ID).await;

    let response = app
        .get("/metrics", TEST_USER_ID)
        .send()
        .await
        .expect("metrics request failed");

    assert_eq!(response.status(), 200);
    let body = response.text().await.expect("invalid metrics body");
    assert!(body.contains("forwarding_request_operations_total"));
}

#[tokio::test]
async fn missing_user_header_is_unauthorized() {
    let app = TestApp::spawn().await;

    let response = reqwest::Client::new()
        .get(format!("{}/api/requests", app.address))
        .send()
        .await
        .expect("request failed");

    assert_eq!(response.status(), 401);
}
