//! Application startup and lifecycle management.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use fastybox_core::error::AppError;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ForwardingConfig;
use crate::handlers::{addresses, items, payments, requests};
use crate::services::{
    get_metrics, CheckoutGateway, Database, ForwardingService, GatewayConfig, HttpCheckoutGateway,
    LogNotificationChannel, NotificationDispatcher, PaymentService, Storage,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub forwarding: Arc<ForwardingService>,
    pub payments: Arc<PaymentService>,
}

impl AppState {
    /// Wire the domain services over a storage backend and boundary
    /// collaborators.
    pub fn new(
        storage: Arc<dyn Storage>,
        gateway: Arc<dyn CheckoutGateway>,
        notifier: NotificationDispatcher,
        currency: String,
    ) -> Self {
        let forwarding = Arc::new(ForwardingService::new(storage.clone(), notifier.clone()));
        let payments = Arc::new(PaymentService::new(
            storage.clone(),
            gateway,
            forwarding.clone(),
            notifier,
            currency,
        ));
        Self {
            storage,
            forwarding,
            payments,
        }
    }
}

/// Health check endpoint for liveness probes.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.storage.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "forwarding-service",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "forwarding-service",
                "error": e.to_string()
            })),
        ),
    }
}

/// Readiness check endpoint.
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.storage.health_check().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Prometheus metrics endpoint.
async fn metrics_endpoint() -> impl IntoResponse {
    get_metrics()
}

/// Build the full router over the given state.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_endpoint))
        .route(
            "/api/requests",
            post(requests::create_request).get(requests::list_requests),
        )
        .route("/api/requests/all", get(requests::list_all_requests))
        .route(
            "/api/requests/:id",
            get(requests::get_request)
                .put(requests::update_request)
                .delete(requests::delete_request),
        )
        .route("/api/requests/:id/status", patch(requests::update_status))
        .route("/api/requests/:id/address", put(requests::assign_address))
        .route(
            "/api/requests/:id/final-total",
            put(requests::set_final_total),
        )
        .route(
            "/api/requests/:id/documents",
            post(requests::require_documents).get(requests::list_documents),
        )
        .route(
            "/api/requests/:id/documents/:document_id",
            put(requests::submit_document),
        )
        .route("/api/requests/:id/items", post(items::add_item))
        .route(
            "/api/requests/:id/items/:item_id",
            delete(items::remove_item),
        )
        .route(
            "/api/requests/:id/items/:item_id/attachments",
            post(items::attach_file),
        )
        .route("/api/requests/:id/checkout", post(payments::checkout))
        .route("/api/requests/:id/payments", get(payments::list_payments))
        .route("/api/webhooks/payments", post(payments::payment_webhook))
        .route(
            "/api/addresses",
            post(addresses::create_address).get(addresses::list_addresses),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application against PostgreSQL and the configured gateway.
    pub async fn build(config: ForwardingConfig) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;
        db.run_migrations().await?;

        let notifier = NotificationDispatcher::start(
            Arc::new(LogNotificationChannel),
            config.notifications.delivery_timeout(),
        );

        let gateway = HttpCheckoutGateway::new(GatewayConfig {
            base_url: config.gateway.base_url.clone(),
            api_key: config.gateway.api_key.clone(),
            currency: config.gateway.currency.clone(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: config.gateway.request_timeout(),
        })?;

        let state = AppState::new(
            Arc::new(db),
            Arc::new(gateway),
            notifier,
            config.gateway.currency.clone(),
        );

        Self::build_with_state(config.common.port, state).await
    }

    /// Build the application over a pre-wired state (used by tests to run
    /// against the in-memory backend).
    pub async fn build_with_state(port: u16, state: AppState) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until the process is stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!(port = %self.port, "HTTP server listening");
        axum::serve(self.listener, app(self.state)).await
    }
}
