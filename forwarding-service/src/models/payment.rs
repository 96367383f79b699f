//! Payment model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "processing" => PaymentStatus::Processing,
            "succeeded" => PaymentStatus::Succeeded,
            "failed" => PaymentStatus::Failed,
            "refunded" => PaymentStatus::Refunded,
            _ => PaymentStatus::Pending,
        }
    }
}

/// Payment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Initial,
    Additional,
    Complete,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Initial => "initial",
            PaymentType::Additional => "additional",
            PaymentType::Complete => "complete",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "additional" => PaymentType::Additional,
            "complete" => PaymentType::Complete,
            _ => PaymentType::Initial,
        }
    }
}

/// Outcome reported by the payment gateway for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayOutcome {
    Succeeded,
    Failed,
}

impl GatewayOutcome {
    pub fn as_payment_status(&self) -> PaymentStatus {
        match self {
            GatewayOutcome::Succeeded => PaymentStatus::Succeeded,
            GatewayOutcome::Failed => PaymentStatus::Failed,
        }
    }
}

/// One payment attempt against a forward request.
///
/// Created in `pending` when a checkout session is initiated; moved to
/// `succeeded`/`failed` only by gateway outcome processing.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: i64,
    pub forward_request_id: i64,
    pub user_id: String,
    pub amount: Decimal,
    pub status: String,
    pub payment_type: String,
    pub transaction_id: String,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub modified_utc: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
}

impl Payment {
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::from_string(&self.status)
    }

    pub fn payment_type(&self) -> PaymentType {
        PaymentType::from_string(&self.payment_type)
    }
}

/// Input for recording a pending payment at checkout initiation.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub forward_request_id: i64,
    pub user_id: String,
    pub amount: Decimal,
    pub payment_type: PaymentType,
    pub transaction_id: String,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
}
