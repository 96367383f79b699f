//! Test helper module for forwarding-service integration tests.
//!
//! Spawns the application over the in-memory storage backend with mock
//! boundary collaborators, so tests exercise the full stack without
//! PostgreSQL or a live payment gateway.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use forwarding_service::services::{
    init_metrics, ForwardingService, MemoryStorage, MockCheckoutGateway, MockNotificationChannel,
    NotificationDispatcher, PaymentService, Storage,
};
use forwarding_service::startup::{AppState, Application};
use rust_decimal::Decimal;
use serde_json::{json, Value};

pub const TEST_USER_ID: &str = "user-1111";
pub const OTHER_USER_ID: &str = "user-2222";
pub const ADMIN_USER_ID: &str = "admin-9999";

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub storage: Arc<MemoryStorage>,
    pub notifications: Arc<MockNotificationChannel>,
    pub state: AppState,
    client: reqwest::Client,
}

impl TestApp {
    /// Spawn a new test application on a random port.
    pub async fn spawn() -> Self {
        init_metrics();

        let storage = Arc::new(MemoryStorage::new());
        let notifications = Arc::new(MockNotificationChannel::new(false));
        let notifier =
            NotificationDispatcher::start(notifications.clone(), Duration::from_secs(2));
        let gateway = Arc::new(MockCheckoutGateway::new(false));

        let state = AppState::new(
            storage.clone() as Arc<dyn Storage>,
            gateway,
            notifier,
            "usd".to_string(),
        );

        let app = Application::build_with_state(0, state.clone())
            .await
            .expect("Failed to build test application");
        let port = app.port();

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();
        let address = format!("http://127.0.0.1:{}", port);

        // Wait for the server to accept connections.
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            storage,
            notifications,
            state,
            client,
        }
    }

    /// Service handles for tests that bypass HTTP.
    pub fn forwarding(&self) -> Arc<ForwardingService> {
        self.state.forwarding.clone()
    }

    pub fn payments(&self) -> Arc<PaymentService> {
        self.state.payments.clone()
    }

    pub fn get(&self, path: &str, user: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}{}", self.address, path))
            .header("X-User-Id", user)
    }

    pub fn get_admin(&self, path: &str) -> reqwest::RequestBuilder {
        self.get(path, ADMIN_USER_ID).header("X-Admin", "true")
    }

    pub fn post(&self, path: &str, user: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.address, path))
            .header("X-User-Id", user)
    }

    pub fn post_admin(&self, path: &str) -> reqwest::RequestBuilder {
        self.post(path, ADMIN_USER_ID).header("X-Admin", "true")
    }

    pub fn put(&self, path: &str, user: &str) -> reqwest::RequestBuilder {
        self.client
            .put(format!("{}{}", self.address, path))
            .header("X-User-Id", user)
    }

    pub fn patch_admin(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .patch(format!("{}{}", self.address, path))
            .header("X-User-Id", ADMIN_USER_ID)
            .header("X-Admin", "true")
    }

    pub fn delete(&self, path: &str, user: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(format!("{}{}", self.address, path))
            .header("X-User-Id", user)
    }

    /// Create a request over HTTP and return its JSON body.
    pub async fn create_request(&self, user: &str) -> Value {
        let response = self
            .post("/api/requests", user)
            .json(&json!({ "notes": "integration test request" }))
            .send()
            .await
            .expect("create request failed");
        assert_eq!(response.status(), 201);
        response.json().await.expect("invalid request body")
    }

    /// Add an item over HTTP and return its JSON body.
    pub async fn add_item(&self, user: &str, request_id: i64, weight: &str, value: &str) -> Value {
        let response = self
            .post(&format!("/api/requests/{}/items", request_id), user)
            .json(&json!({
                "name": "Test item",
                "declared_weight": weight,
                "declared_value": value
            }))
            .send()
            .await
            .expect("add item failed");
        assert_eq!(response.status(), 201);
        response.json().await.expect("invalid item body")
    }

    /// Fetch the detailed view of a request.
    pub async fn get_request_detail(&self, user: &str, request_id: i64) -> Value {
        let response = self
            .get(&format!("/api/requests/{}", request_id), user)
            .send()
            .await
            .expect("get request failed");
        assert_eq!(response.status(), 200);
        response.json().await.expect("invalid detail body")
    }
}

pub fn dec(s: &str) -> Decimal {
    s.parse().expect("invalid decimal literal")
}
