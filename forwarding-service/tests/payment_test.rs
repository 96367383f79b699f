//! Payment reconciliation integration tests: checkout initiation, gateway
//! outcome processing, the two automatic lifecycle transitions, and
//! duplicate-delivery idempotency.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{dec, TestApp, OTHER_USER_ID, TEST_USER_ID};
use fastybox_core::error::AppError;
use forwarding_service::models::{CreateRequest, PaymentType};
use forwarding_service::services::{
    ForwardingService, MemoryStorage, MockCheckoutGateway, MockNotificationChannel,
    NotificationDispatcher, PaymentService, Storage,
};
use serde_json::json;

#[tokio::test]
async fn checkout_requires_positive_amount() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    let response = app
        .post(&format!("/api/requests/{}/checkout", request_id), TEST_USER_ID)
        .json(&json!({ "amount": "0", "payment_type": "initial" }))
        .send()
        .await
        .expect("checkout failed");
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn checkout_on_foreign_request_is_not_found() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    let response = app
        .post(&format!("/api/requests/{}/checkout", request_id), OTHER_USER_ID)
        .json(&json!({ "amount": "25.00", "payment_type": "initial" }))
        .send()
        .await
        .expect("checkout failed");
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn checkout_creates_pending_payment_with_session_reference() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    let response = app
        .post(&format!("/api/requests/{}/checkout", request_id), TEST_USER_ID)
        .json(&json!({ "amount": "25.00", "payment_type": "initial" }))
        .send()
        .await
        .expect("checkout failed");
    assert_eq!(response.status(), 201);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["payment"]["status"], "pending");
    assert_eq!(body["payment"]["payment_type"], "initial");
    assert!(body["payment"]["transaction_id"]
        .as_str()
        .unwrap()
        .starts_with("cs_test_"));
    assert!(body["redirect_url"].as_str().is_some());
}

#[tokio::test]
async fn gateway_failure_propagates_to_the_caller() {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let notifier = NotificationDispatcher::start(
        Arc::new(MockNotificationChannel::new(false)),
        Duration::from_secs(1),
    );
    let forwarding = Arc::new(ForwardingService::new(storage.clone(), notifier.clone()));
    let payments = PaymentService::new(
        storage.clone(),
        Arc::new(MockCheckoutGateway::new(true)),
        forwarding.clone(),
        notifier,
        "usd".to_string(),
    );

    let request = forwarding
        .create_request(CreateRequest {
            user_id: TEST_USER_ID.to_string(),
            ..Default::default()
        })
        .await
        .expect("create failed");

    let result = payments
        .initiate_checkout(
            request.request_id,
            dec("25.00"),
            PaymentType::Initial,
            TEST_USER_ID,
        )
        .await;

    assert!(matches!(result, Err(AppError::ExternalDependency(_))));
    // No pending payment row is left behind when checkout cannot start.
    let rows = payments.list_payments(request.request_id).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn initial_payment_success_moves_draft_to_awaiting_arrival() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    let checkout: serde_json::Value = app
        .post(&format!("/api/requests/{}/checkout", request_id), TEST_USER_ID)
        .json(&json!({ "amount": "25.00", "payment_type": "initial" }))
        .send()
        .await
        .expect("checkout failed")
        .json()
        .await
        .unwrap();
    let session_ref = checkout["payment"]["transaction_id"].as_str().unwrap();

    let response = app
        .post("/api/webhooks/payments", "gateway")
        .json(&json!({
            "transaction_ref": session_ref,
            "gateway_intent_ref": "pi_0001",
            "outcome": "succeeded"
        }))
        .send()
        .await
        .expect("webhook failed");
    assert_eq!(response.status(), 200);
    let payment: serde_json::Value = response.json().await.unwrap();
    assert_eq!(payment["status"], "succeeded");
    // The session reference is rewritten to the intent id on success.
    assert_eq!(payment["transaction_id"], "pi_0001");

    let detail = app.get_request_detail(TEST_USER_ID, request_id).await;
    assert_eq!(detail["request"]["status"], "awaiting_arrival");
    assert_eq!(dec(detail["total_paid"].as_str().unwrap()), dec("25.00"));

    let history = detail["status_history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1]["status"], "awaiting_arrival");
    assert_eq!(history[1]["created_by"], "System");
}

#[tokio::test]
async fn partial_payment_does_not_advance_awaiting_payment() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    app.put(&format!("/api/requests/{}/final-total", request_id), "admin")
        .header("X-Admin", "true")
        .json(&json!({ "final_total": "100.00" }))
        .send()
        .await
        .expect("final total failed");
    app.patch_admin(&format!("/api/requests/{}/status", request_id))
        .json(&json!({ "status": "awaiting_payment", "notes": "Review complete" }))
        .send()
        .await
        .expect("status failed");

    let checkout: serde_json::Value = app
        .post(&format!("/api/requests/{}/checkout", request_id), TEST_USER_ID)
        .json(&json!({ "amount": "40.00", "payment_type": "complete" }))
        .send()
        .await
        .expect("checkout failed")
        .json()
        .await
        .unwrap();
    let session_ref = checkout["payment"]["transaction_id"].as_str().unwrap();

    app.post("/api/webhooks/payments", "gateway")
        .json(&json!({
            "transaction_ref": session_ref,
            "gateway_intent_ref": "pi_partial",
            "outcome": "succeeded"
        }))
        .send()
        .await
        .expect("webhook failed");

    // $40 of $100 paid: the request stays in awaiting_payment.
    let detail = app.get_request_detail(TEST_USER_ID, request_id).await;
    assert_eq!(detail["request"]["status"], "awaiting_payment");
    assert_eq!(detail["is_paid_in_full"], false);
}

#[tokio::test]
async fn full_payment_moves_awaiting_payment_to_processing() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    app.put(&format!("/api/requests/{}/final-total", request_id), "admin")
        .header("X-Admin", "true")
        .json(&json!({ "final_total": "100.00" }))
        .send()
        .await
        .expect("final total failed");
    app.patch_admin(&format!("/api/requests/{}/status", request_id))
        .json(&json!({ "status": "awaiting_payment", "notes": "Review complete" }))
        .send()
        .await
        .expect("status failed");

    for (amount, intent) in [("40.00", "pi_a"), ("60.00", "pi_b")] {
        let checkout: serde_json::Value = app
            .post(&format!("/api/requests/{}/checkout", request_id), TEST_USER_ID)
            .json(&json!({ "amount": amount, "payment_type": "additional" }))
            .send()
            .await
            .expect("checkout failed")
            .json()
            .await
            .unwrap();
        let session_ref = checkout["payment"]["transaction_id"].as_str().unwrap();
        app.post("/api/webhooks/payments", "gateway")
            .json(&json!({
                "transaction_ref": session_ref,
                "gateway_intent_ref": intent,
                "outcome": "succeeded"
            }))
            .send()
            .await
            .expect("webhook failed");
    }

    let detail = app.get_request_detail(TEST_USER_ID, request_id).await;
    assert_eq!(detail["request"]["status"], "processing");
    assert_eq!(detail["is_paid_in_full"], true);
    assert_eq!(dec(detail["total_paid"].as_str().unwrap()), dec("100.00"));

    // draft -> awaiting_payment -> processing: exactly three rows.
    let statuses: Vec<&str> = detail["status_history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["draft", "awaiting_payment", "processing"]);
}

#[tokio::test]
async fn duplicate_gateway_outcome_is_idempotent() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    let checkout: serde_json::Value = app
        .post(&format!("/api/requests/{}/checkout", request_id), TEST_USER_ID)
        .json(&json!({ "amount": "25.00", "payment_type": "initial" }))
        .send()
        .await
        .expect("checkout failed")
        .json()
        .await
        .unwrap();
    let session_ref = checkout["payment"]["transaction_id"]
        .as_str()
        .unwrap()
        .to_string();

    let event = json!({
        "transaction_ref": session_ref,
        "gateway_intent_ref": "pi_dup",
        "outcome": "succeeded"
    });

    let first = app
        .post("/api/webhooks/payments", "gateway")
        .json(&event)
        .send()
        .await
        .expect("webhook failed");
    assert_eq!(first.status(), 200);

    // The gateway redelivers the same event; the session ref now resolves
    // through the intent fallback and nothing changes.
    let second = app
        .post("/api/webhooks/payments", "gateway")
        .json(&event)
        .send()
        .await
        .expect("webhook failed");
    assert_eq!(second.status(), 200);
    let payment: serde_json::Value = second.json().await.unwrap();
    assert_eq!(payment["status"], "succeeded");

    let detail = app.get_request_detail(TEST_USER_ID, request_id).await;
    assert_eq!(detail["request"]["status"], "awaiting_arrival");
    // No duplicated transition history from the redelivery.
    assert_eq!(detail["status_history"].as_array().unwrap().len(), 2);
    assert_eq!(dec(detail["total_paid"].as_str().unwrap()), dec("25.00"));
}

#[tokio::test]
async fn intent_only_event_uses_direct_status_update() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    let checkout: serde_json::Value = app
        .post(&format!("/api/requests/{}/checkout", request_id), TEST_USER_ID)
        .json(&json!({ "amount": "25.00", "payment_type": "initial" }))
        .send()
        .await
        .expect("checkout failed")
        .json()
        .await
        .unwrap();
    let session_ref = checkout["payment"]["transaction_id"].as_str().unwrap();

    // Intent-level events carry a single reference and no session id.
    let response = app
        .post("/api/webhooks/payments", "gateway")
        .json(&json!({
            "transaction_ref": session_ref,
            "outcome": "failed"
        }))
        .send()
        .await
        .expect("webhook failed");
    assert_eq!(response.status(), 200);
    let payment: serde_json::Value = response.json().await.unwrap();
    assert_eq!(payment["status"], "failed");

    // A failed payment never advances the lifecycle.
    let detail = app.get_request_detail(TEST_USER_ID, request_id).await;
    assert_eq!(detail["request"]["status"], "draft");
    assert_eq!(dec(detail["total_paid"].as_str().unwrap()), dec("0"));
}

#[tokio::test]
async fn unknown_transaction_reference_is_not_found() {
    let app = TestApp::spawn().await;

    let response = app
        .post("/api/webhooks/payments", "gateway")
        .json(&json!({
            "transaction_ref": "cs_missing",
            "gateway_intent_ref": "pi_missing",
            "outcome": "succeeded"
        }))
        .send()
        .await
        .expect("webhook failed");

    // 404 lets the gateway's retry mechanism redeliver or alert.
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn successful_payment_dispatches_confirmation_notification() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    let checkout: serde_json::Value = app
        .post(&format!("/api/requests/{}/checkout", request_id), TEST_USER_ID)
        .json(&json!({ "amount": "25.00", "payment_type": "initial" }))
        .send()
        .await
        .expect("checkout failed")
        .json()
        .await
        .unwrap();
    let session_ref = checkout["payment"]["transaction_id"].as_str().unwrap();

    app.post("/api/webhooks/payments", "gateway")
        .json(&json!({
            "transaction_ref": session_ref,
            "gateway_intent_ref": "pi_notify",
            "outcome": "succeeded"
        }))
        .send()
        .await
        .expect("webhook failed");

    // Dispatch is fire-and-forget; give the worker a beat to drain.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let delivered = app.notifications.delivered().await;
    let names: Vec<&str> = delivered.iter().map(|e| e.name()).collect();
    assert!(names.contains(&"request_created"));
    assert!(names.contains(&"payment_confirmed"));
    assert!(names.contains(&"status_changed"));
}
