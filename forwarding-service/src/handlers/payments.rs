//! Payment handlers: checkout initiation and the gateway outcome webhook.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use fastybox_core::error::AppError;

use crate::dtos::{CheckoutDto, WebhookEventDto};
use crate::middleware::AuthContext;
use crate::models::Payment;
use crate::services::CheckoutInitiated;
use crate::startup::AppState;

/// Start a checkout session for an owned request.
pub async fn checkout(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(request_id): Path<i64>,
    Json(payload): Json<CheckoutDto>,
) -> Result<(StatusCode, Json<CheckoutInitiated>), AppError> {
    let initiated = state
        .payments
        .initiate_checkout(request_id, payload.amount, payload.payment_type, &auth.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(initiated)))
}

/// List payments for a request visible to the caller.
pub async fn list_payments(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(request_id): Path<i64>,
) -> Result<Json<Vec<Payment>>, AppError> {
    // Visibility piggybacks on the request lookup rules.
    state
        .forwarding
        .get_request(request_id, &auth.user_id, auth.is_admin)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Request not found")))?;
    let payments = state.payments.list_payments(request_id).await?;
    Ok(Json(payments))
}

/// Gateway outcome callback. Delivered at-least-once by the gateway's retry
/// mechanism; processing is idempotent. A missing payment is a 404 so the
/// gateway re-delivers or alerts instead of the event vanishing.
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookEventDto>,
) -> Result<Json<Payment>, AppError> {
    let payment = match payload.gateway_intent_ref.as_deref() {
        // Session-level events carry both references.
        Some(_) => {
            state
                .payments
                .record_gateway_outcome(
                    &payload.transaction_ref,
                    payload.gateway_intent_ref.as_deref(),
                    payload.outcome,
                )
                .await?
        }
        // Intent-level events carry only the intent reference.
        None => {
            state
                .payments
                .update_payment_status(
                    &payload.transaction_ref,
                    payload.outcome.as_payment_status(),
                )
                .await?
        }
    };
    Ok(Json(payment))
}
