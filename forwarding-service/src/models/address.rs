//! Shipping address model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Destination address owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Address {
    pub address_id: i64,
    pub user_id: String,
    pub recipient_name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating an address.
#[derive(Debug, Clone)]
pub struct CreateAddress {
    pub user_id: String,
    pub recipient_name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}
