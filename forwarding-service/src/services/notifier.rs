//! Notification dispatch boundary.
//!
//! Domain operations enqueue events and return immediately; a spawned worker
//! drains the queue and hands each event to the configured channel with a
//! bounded timeout. Delivery failures are logged and counted, never fed back
//! into the triggering operation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fastybox_core::error::AppError;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::services::metrics::record_notification;

/// Event emitted by the lifecycle manager and payment reconciliation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    RequestCreated {
        request_id: i64,
        tracking_code: String,
        user_id: String,
    },
    StatusChanged {
        request_id: i64,
        tracking_code: String,
        user_id: String,
        status: String,
    },
    DocumentsRequired {
        request_id: i64,
        tracking_code: String,
        user_id: String,
        documents: Vec<String>,
    },
    PaymentConfirmed {
        request_id: i64,
        payment_id: i64,
        user_id: String,
        amount: Decimal,
    },
}

impl NotificationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            NotificationEvent::RequestCreated { .. } => "request_created",
            NotificationEvent::StatusChanged { .. } => "status_changed",
            NotificationEvent::DocumentsRequired { .. } => "documents_required",
            NotificationEvent::PaymentConfirmed { .. } => "payment_confirmed",
        }
    }
}

/// Delivery boundary. The real transport (email, push, webhooks) lives in an
/// external system; implementations here adapt to whatever carries the event
/// out of process.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), AppError>;
}

/// Channel that logs events instead of delivering them. Default for
/// deployments where the notification worker is not wired up.
pub struct LogNotificationChannel;

#[async_trait]
impl NotificationChannel for LogNotificationChannel {
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), AppError> {
        info!(
            event = event.name(),
            payload = %serde_json::to_string(event).unwrap_or_default(),
            "Notification event"
        );
        Ok(())
    }
}

/// Recording channel for tests.
pub struct MockNotificationChannel {
    delivered: Mutex<Vec<NotificationEvent>>,
    fail: bool,
}

impl MockNotificationChannel {
    pub fn new(fail: bool) -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            fail,
        }
    }

    pub async fn delivered(&self) -> Vec<NotificationEvent> {
        self.delivered.lock().await.clone()
    }
}

#[async_trait]
impl NotificationChannel for MockNotificationChannel {
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::ExternalDependency(
                "mock delivery failure".to_string(),
            ));
        }
        self.delivered.lock().await.push(event.clone());
        Ok(())
    }
}

/// Fire-and-forget dispatcher backed by an unbounded queue and one worker.
#[derive(Clone)]
pub struct NotificationDispatcher {
    tx: mpsc::UnboundedSender<NotificationEvent>,
}

impl NotificationDispatcher {
    /// Spawn the worker and return the dispatcher handle. The worker drains
    /// the queue until every sender is dropped.
    pub fn start(channel: Arc<dyn NotificationChannel>, delivery_timeout: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<NotificationEvent>();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let name = event.name();
                match tokio::time::timeout(delivery_timeout, channel.deliver(&event)).await {
                    Ok(Ok(())) => record_notification(name, "delivered"),
                    Ok(Err(e)) => {
                        warn!(event = name, error = %e, "Notification delivery failed");
                        record_notification(name, "failed");
                    }
                    Err(_) => {
                        warn!(event = name, timeout = ?delivery_timeout, "Notification delivery timed out");
                        record_notification(name, "timeout");
                    }
                }
            }
        });

        Self { tx }
    }

    /// Enqueue an event. Never blocks and never fails the caller; a closed
    /// queue is logged and dropped.
    pub fn dispatch(&self, event: NotificationEvent) {
        if self.tx.send(event).is_err() {
            warn!("Notification queue closed, event dropped");
        }
    }
}
