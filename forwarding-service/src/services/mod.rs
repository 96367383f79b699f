//! Services module for forwarding-service.

pub mod calculator;
pub mod database;
pub mod forwarding;
pub mod gateway;
pub mod memory;
pub mod metrics;
pub mod notifier;
pub mod payments;
pub mod storage;

pub use database::Database;
pub use forwarding::ForwardingService;
pub use gateway::{
    CheckoutGateway, CheckoutSession, GatewayConfig, HttpCheckoutGateway, MockCheckoutGateway,
};
pub use memory::MemoryStorage;
pub use metrics::{get_metrics, init_metrics};
pub use notifier::{
    LogNotificationChannel, MockNotificationChannel, NotificationChannel, NotificationDispatcher,
    NotificationEvent,
};
pub use payments::{CheckoutInitiated, PaymentService};
pub use storage::Storage;
