//! Forward request model and status machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{ForwardItem, Payment, PaymentStatus};

/// Actor recorded on automated status transitions.
pub const SYSTEM_ACTOR: &str = "System";

/// Forward request status.
///
/// Status is administrator-settable; the service only drives the two
/// payment-triggered transitions itself (Draft -> AwaitingArrival and
/// AwaitingPayment -> Processing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardRequestStatus {
    Draft,
    AwaitingArrival,
    ReceivedInWarehouse,
    InReview,
    DocumentsRequired,
    AwaitingPayment,
    Processing,
    InTransitToMexico,
    Delivered,
    Cancelled,
}

impl ForwardRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForwardRequestStatus::Draft => "draft",
            ForwardRequestStatus::AwaitingArrival => "awaiting_arrival",
            ForwardRequestStatus::ReceivedInWarehouse => "received_in_warehouse",
            ForwardRequestStatus::InReview => "in_review",
            ForwardRequestStatus::DocumentsRequired => "documents_required",
            ForwardRequestStatus::AwaitingPayment => "awaiting_payment",
            ForwardRequestStatus::Processing => "processing",
            ForwardRequestStatus::InTransitToMexico => "in_transit_to_mexico",
            ForwardRequestStatus::Delivered => "delivered",
            ForwardRequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "awaiting_arrival" => ForwardRequestStatus::AwaitingArrival,
            "received_in_warehouse" => ForwardRequestStatus::ReceivedInWarehouse,
            "in_review" => ForwardRequestStatus::InReview,
            "documents_required" => ForwardRequestStatus::DocumentsRequired,
            "awaiting_payment" => ForwardRequestStatus::AwaitingPayment,
            "processing" => ForwardRequestStatus::Processing,
            "in_transit_to_mexico" => ForwardRequestStatus::InTransitToMexico,
            "delivered" => ForwardRequestStatus::Delivered,
            "cancelled" => ForwardRequestStatus::Cancelled,
            _ => ForwardRequestStatus::Draft,
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ForwardRequestStatus::Delivered | ForwardRequestStatus::Cancelled
        )
    }
}

/// Forward request.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ForwardRequest {
    pub request_id: i64,
    pub user_id: String,
    pub tracking_code: String,
    pub status: String,
    pub notes: Option<String>,
    pub shipping_address_id: Option<i64>,
    pub estimated_total: Decimal,
    pub final_total: Decimal,
    pub original_carrier: Option<String>,
    pub original_tracking_number: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl ForwardRequest {
    pub fn status(&self) -> ForwardRequestStatus {
        ForwardRequestStatus::from_string(&self.status)
    }
}

/// Input for creating a forward request.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub user_id: String,
    pub notes: Option<String>,
    pub shipping_address_id: Option<i64>,
    pub original_carrier: Option<String>,
    pub original_tracking_number: Option<String>,
}

/// Owner-editable fields of a request.
#[derive(Debug, Clone, Default)]
pub struct UpdateRequest {
    pub notes: Option<String>,
    pub shipping_address_id: Option<i64>,
    pub original_carrier: Option<String>,
    pub original_tracking_number: Option<String>,
}

/// Status history entry. Append-only; never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RequestStatusHistory {
    pub history_id: i64,
    pub forward_request_id: i64,
    pub status: String,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_utc: DateTime<Utc>,
}

/// Input for appending a status history entry.
#[derive(Debug, Clone)]
pub struct NewStatusEntry {
    pub status: ForwardRequestStatus,
    pub notes: Option<String>,
    pub created_by: String,
}

/// Fully loaded request: items, payments, and history, with the paid totals
/// projected from the payment rows at read time.
#[derive(Debug, Clone, Serialize)]
pub struct ForwardRequestView {
    pub request: ForwardRequest,
    pub items: Vec<ForwardItem>,
    pub payments: Vec<Payment>,
    pub status_history: Vec<RequestStatusHistory>,
}

impl ForwardRequestView {
    /// Sum of succeeded payments. Always recomputed from the payment rows.
    pub fn total_paid(&self) -> Decimal {
        self.payments
            .iter()
            .filter(|p| p.status() == PaymentStatus::Succeeded)
            .map(|p| p.amount)
            .sum()
    }

    pub fn is_paid_in_full(&self) -> bool {
        self.request.final_total > Decimal::ZERO && self.total_paid() >= self.request.final_total
    }
}

/// Filter parameters for listing requests.
#[derive(Debug, Clone, Default)]
pub struct ListRequestsFilter {
    pub status: Option<ForwardRequestStatus>,
    pub page: i64,
    pub page_size: i64,
}
