//! Concurrency tests: tracking-code uniqueness under contention, and
//! atomicity of item mutations and status updates per request.

mod common;

use std::collections::HashSet;

use common::{dec, TestApp, TEST_USER_ID};
use forwarding_service::models::{CreateItem, CreateRequest, ForwardRequestStatus};

#[tokio::test]
async fn tracking_codes_are_unique_under_concurrent_creation() {
    let app = TestApp::spawn().await;
    let forwarding = app.forwarding();

    let tasks: Vec<_> = (0..100)
        .map(|_| {
            let forwarding = forwarding.clone();
            tokio::spawn(async move {
                forwarding
                    .create_request(CreateRequest {
                        user_id: TEST_USER_ID.to_string(),
                        ..Default::default()
                    })
                    .await
                    .expect("create failed")
                    .tracking_code
            })
        })
        .collect();

    let mut codes = HashSet::new();
    for task in tasks {
        let code = task.await.expect("task panicked");
        assert!(codes.insert(code), "duplicate tracking code allocated");
    }
    assert_eq!(codes.len(), 100);
}

#[tokio::test]
async fn concurrent_item_additions_are_both_reflected_in_the_total() {
    let app = TestApp::spawn().await;
    let forwarding = app.forwarding();

    let request = forwarding
        .create_request(CreateRequest {
            user_id: TEST_USER_ID.to_string(),
            ..Default::default()
        })
        .await
        .expect("create failed");
    let request_id = request.request_id;

    let first = {
        let forwarding = forwarding.clone();
        tokio::spawn(async move {
            forwarding
                .add_item(
                    request_id,
                    TEST_USER_ID,
                    CreateItem {
                        name: "Item A".to_string(),
                        declared_weight: Some(dec("1.5")),
                        declared_value: dec("50"),
                        ..Default::default()
                    },
                )
                .await
        })
    };
    let second = {
        let forwarding = forwarding.clone();
        tokio::spawn(async move {
            forwarding
                .add_item(
                    request_id,
                    TEST_USER_ID,
                    CreateItem {
                        name: "Item B".to_string(),
                        declared_value: dec("10"),
                        ..Default::default()
                    },
                )
                .await
        })
    };

    first.await.unwrap().expect("first add failed");
    second.await.unwrap().expect("second add failed");

    // $23.99 (1.5kg, $50) plus $20.99 (no weight, $10): no lost update.
    let view = forwarding
        .get_request(request_id, TEST_USER_ID, false)
        .await
        .expect("get failed")
        .expect("request missing");
    assert_eq!(view.items.len(), 2);
    assert_eq!(view.request.estimated_total, dec("44.98"));
}

#[tokio::test]
async fn concurrent_status_updates_keep_the_audit_trail_complete() {
    let app = TestApp::spawn().await;
    let forwarding = app.forwarding();

    let request = forwarding
        .create_request(CreateRequest {
            user_id: TEST_USER_ID.to_string(),
            ..Default::default()
        })
        .await
        .expect("create failed");
    let request_id = request.request_id;

    let tasks: Vec<_> = (0..10)
        .map(|i| {
            let forwarding = forwarding.clone();
            tokio::spawn(async move {
                let status = if i % 2 == 0 {
                    ForwardRequestStatus::ReceivedInWarehouse
                } else {
                    ForwardRequestStatus::InReview
                };
                forwarding
                    .update_status(request_id, status, Some(format!("update {}", i)), "admin-1")
                    .await
            })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().expect("update failed"));
    }

    // One creation row plus one row per update, none lost or interleaved.
    let view = forwarding
        .get_request(request_id, TEST_USER_ID, false)
        .await
        .expect("get failed")
        .expect("request missing");
    assert_eq!(view.status_history.len(), 11);

    let ids: Vec<i64> = view.status_history.iter().map(|h| h.history_id).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
}
