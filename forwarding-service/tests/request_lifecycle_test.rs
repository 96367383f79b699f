//! Request lifecycle integration tests: creation, item management with
//! total recalculation, status history, visibility, and deletion.

mod common;

use common::{dec, TestApp, ADMIN_USER_ID, OTHER_USER_ID, TEST_USER_ID};
use serde_json::json;

#[tokio::test]
async fn create_request_allocates_tracking_code_and_draft_history() {
    let app = TestApp::spawn().await;

    let request = app.create_request(TEST_USER_ID).await;
    let tracking_code = request["tracking_code"].as_str().unwrap();

    // FB-YYYYMMDD-NNNNN
    let parts: Vec<&str> = tracking_code.split('-').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "FB");
    assert_eq!(parts[1].len(), 8);
    assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
    assert_eq!(parts[2].len(), 5);
    assert!(parts[2].chars().all(|c| c.is_ascii_digit()));

    assert_eq!(request["status"], "draft");
    assert_eq!(dec(request["estimated_total"].as_str().unwrap()), dec("0"));

    let detail = app
        .get_request_detail(TEST_USER_ID, request["request_id"].as_i64().unwrap())
        .await;
    let history = detail["status_history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["status"], "draft");
    assert_eq!(history[0]["created_by"], TEST_USER_ID);
}

#[tokio::test]
async fn add_item_recomputes_estimated_total() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    // 1.5kg in the 0-2kg band at $15.99; customs max(50 * 16%, $5) = $8.
    app.add_item(TEST_USER_ID, request_id, "1.5", "50").await;

    let detail = app.get_request_detail(TEST_USER_ID, request_id).await;
    assert_eq!(
        dec(detail["request"]["estimated_total"].as_str().unwrap()),
        dec("23.99")
    );
}

#[tokio::test]
async fn item_without_declared_weight_uses_minimum_base_rate() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    let response = app
        .post(&format!("/api/requests/{}/items", request_id), TEST_USER_ID)
        .json(&json!({ "name": "Mystery box", "declared_value": "10" }))
        .send()
        .await
        .expect("add item failed");
    assert_eq!(response.status(), 201);

    // Shipping falls back to the cheapest active base rate ($15.99);
    // customs floors at $5.
    let detail = app.get_request_detail(TEST_USER_ID, request_id).await;
    assert_eq!(
        dec(detail["request"]["estimated_total"].as_str().unwrap()),
        dec("20.99")
    );
}

#[tokio::test]
async fn item_numeric_fields_are_clamped_to_zero() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    let response = app
        .post(&format!("/api/requests/{}/items", request_id), TEST_USER_ID)
        .json(&json!({
            "name": "  Damaged declaration  ",
            "declared_weight": "-3.5",
            "declared_value": "-20"
        }))
        .send()
        .await
        .expect("add item failed");
    assert_eq!(response.status(), 201);

    let item: serde_json::Value = response.json().await.unwrap();
    assert_eq!(item["name"], "Damaged declaration");
    assert_eq!(dec(item["declared_weight"].as_str().unwrap()), dec("0"));
    assert_eq!(dec(item["declared_value"].as_str().unwrap()), dec("0"));
}

#[tokio::test]
async fn remove_item_recomputes_total() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    let item = app.add_item(TEST_USER_ID, request_id, "1.5", "50").await;
    app.add_item(TEST_USER_ID, request_id, "1.0", "10").await;

    let response = app
        .delete(
            &format!(
                "/api/requests/{}/items/{}",
                request_id,
                item["item_id"].as_i64().unwrap()
            ),
            TEST_USER_ID,
        )
        .send()
        .await
        .expect("remove item failed");
    assert_eq!(response.status(), 204);

    // Only the 1kg/$10 item remains: $15.99 + $5.00.
    let detail = app.get_request_detail(TEST_USER_ID, request_id).await;
    assert_eq!(detail["items"].as_array().unwrap().len(), 1);
    assert_eq!(
        dec(detail["request"]["estimated_total"].as_str().unwrap()),
        dec("20.99")
    );
}

#[tokio::test]
async fn remove_nonexistent_item_reports_false_and_leaves_total_unchanged() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();
    app.add_item(TEST_USER_ID, request_id, "1.5", "50").await;

    let removed = app
        .forwarding()
        .remove_item(request_id, TEST_USER_ID, 999_999)
        .await
        .expect("remove_item errored");
    assert!(!removed);

    let detail = app.get_request_detail(TEST_USER_ID, request_id).await;
    assert_eq!(
        dec(detail["request"]["estimated_total"].as_str().unwrap()),
        dec("23.99")
    );
}

#[tokio::test]
async fn foreign_requests_are_invisible() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    // Reads report not-found rather than forbidden, hiding existence.
    let response = app
        .get(&format!("/api/requests/{}", request_id), OTHER_USER_ID)
        .send()
        .await
        .expect("get failed");
    assert_eq!(response.status(), 404);

    // So do writes.
    let response = app
        .post(&format!("/api/requests/{}/items", request_id), OTHER_USER_ID)
        .json(&json!({ "name": "Sneaky item", "declared_value": "1" }))
        .send()
        .await
        .expect("add failed");
    assert_eq!(response.status(), 404);

    // Administrators see any request.
    let response = app
        .get_admin(&format!("/api/requests/{}", request_id))
        .send()
        .await
        .expect("admin get failed");
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn update_status_appends_exactly_one_history_row() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    let response = app
        .patch_admin(&format!("/api/requests/{}/status", request_id))
        .json(&json!({ "status": "received_in_warehouse", "notes": "Package checked in" }))
        .send()
        .await
        .expect("status update failed");
    assert_eq!(response.status(), 204);

    let detail = app.get_request_detail(TEST_USER_ID, request_id).await;
    assert_eq!(detail["request"]["status"], "received_in_warehouse");

    let history = detail["status_history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["status"], "draft");
    assert_eq!(history[1]["status"], "received_in_warehouse");
    assert_eq!(history[1]["created_by"], ADMIN_USER_ID);

    // Append-only and in insertion order.
    let ids: Vec<i64> = history
        .iter()
        .map(|h| h["history_id"].as_i64().unwrap())
        .collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
}

#[tokio::test]
async fn status_updates_require_admin() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    let response = reqwest::Client::new()
        .patch(format!("{}/api/requests/{}/status", app.address, request_id))
        .header("X-User-Id", TEST_USER_ID)
        .json(&json!({ "status": "processing" }))
        .send()
        .await
        .expect("request failed");
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn admin_can_force_any_status() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    // Status is administrator-settable; no transition table is enforced.
    let response = app
        .patch_admin(&format!("/api/requests/{}/status", request_id))
        .json(&json!({ "status": "delivered", "notes": "Force-set by operations" }))
        .send()
        .await
        .expect("status update failed");
    assert_eq!(response.status(), 204);

    let detail = app.get_request_detail(TEST_USER_ID, request_id).await;
    assert_eq!(detail["request"]["status"], "delivered");
}

#[tokio::test]
async fn assign_address_requires_ownership_of_both() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    let response = app
        .post("/api/addresses", TEST_USER_ID)
        .json(&json!({
            "recipient_name": "Maria Lopez",
            "street": "Av. Reforma 123",
            "city": "Guadalajara",
            "state": "Jalisco",
            "postal_code": "44100",
            "country": "MX"
        }))
        .send()
        .await
        .expect("create address failed");
    assert_eq!(response.status(), 201);
    let address: serde_json::Value = response.json().await.unwrap();
    let address_id = address["address_id"].as_i64().unwrap();

    let response = app
        .put(&format!("/api/requests/{}/address", request_id), TEST_USER_ID)
        .json(&json!({ "address_id": address_id }))
        .send()
        .await
        .expect("assign failed");
    assert_eq!(response.status(), 204);

    // Someone else's address is invisible to the owner of the request.
    let assigned = app
        .forwarding()
        .assign_shipping_address(request_id, OTHER_USER_ID, address_id)
        .await
        .expect("assign errored");
    assert!(!assigned);
}

#[tokio::test]
async fn require_documents_parks_request_and_lists_them() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    let response = app
        .post_admin(&format!("/api/requests/{}/documents", request_id))
        .json(&json!({
            "documents": [
                { "document_type": "Invoice", "description": "Purchase invoice" },
                { "document_type": "Identification" }
            ]
        }))
        .send()
        .await
        .expect("require documents failed");
    assert_eq!(response.status(), 204);

    let detail = app.get_request_detail(TEST_USER_ID, request_id).await;
    assert_eq!(detail["request"]["status"], "documents_required");

    // The review flow passes through in_review on the way.
    let statuses: Vec<&str> = detail["status_history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["draft", "in_review", "documents_required"]);

    let response = app
        .get(&format!("/api/requests/{}/documents", request_id), TEST_USER_ID)
        .send()
        .await
        .expect("list documents failed");
    assert_eq!(response.status(), 200);
    let docs: serde_json::Value = response.json().await.unwrap();
    let docs = docs.as_array().unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["is_submitted"], false);

    // Customer satisfies one requirement.
    let response = app
        .put(
            &format!(
                "/api/requests/{}/documents/{}",
                request_id,
                docs[0]["document_id"].as_i64().unwrap()
            ),
            TEST_USER_ID,
        )
        .json(&json!({ "attachment_id": null }))
        .send()
        .await
        .expect("submit document failed");
    assert_eq!(response.status(), 204);
}

#[tokio::test]
async fn delete_request_cascades_and_respects_ownership() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();
    app.add_item(TEST_USER_ID, request_id, "1.5", "50").await;

    // A stranger cannot delete, and learns nothing.
    let response = app
        .delete(&format!("/api/requests/{}", request_id), OTHER_USER_ID)
        .send()
        .await
        .expect("delete failed");
    assert_eq!(response.status(), 404);

    // The owner can.
    let response = app
        .delete(&format!("/api/requests/{}", request_id), TEST_USER_ID)
        .send()
        .await
        .expect("delete failed");
    assert_eq!(response.status(), 204);

    let response = app
        .get_admin(&format!("/api/requests/{}", request_id))
        .send()
        .await
        .expect("get failed");
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn update_request_edits_fields_for_owner_only() {
    let app = TestApp::spawn().await;
    let request = app.create_request(TEST_USER_ID).await;
    let request_id = request["request_id"].as_i64().unwrap();

    let response = app
        .put(&format!("/api/requests/{}", request_id), TEST_USER_ID)
        .json(&json!({
            "notes": "Please consolidate boxes",
            "original_carrier": "UPS",
            "original_tracking_number": "1Z999AA10123456784"
        }))
        .send()
        .await
        .expect("update failed");
    assert_eq!(response.status(), 200);
    let updated: serde_json::Value = response.json().await.unwrap();
    assert_eq!(updated["original_carrier"], "UPS");

    let response = app
        .put(&format!("/api/requests/{}", request_id), OTHER_USER_ID)
        .json(&json!({ "notes": "hijack" }))
        .send()
        .await
        .expect("update failed");
    assert_eq!(response.status(), 404);
}
