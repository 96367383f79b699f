//! Payment reconciliation.
//!
//! Bridges gateway-reported payment outcomes into the domain: records
//! checkout attempts, applies outcome callbacks (delivered at-least-once,
//! so everything here tolerates duplicates), and drives the two automatic
//! lifecycle transitions when a request becomes payable or fully paid.

use std::collections::HashMap;
use std::sync::Arc;

use fastybox_core::error::AppError;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::models::{
    CreatePayment, ForwardRequest, ForwardRequestStatus, GatewayOutcome, Payment, PaymentStatus,
    PaymentType, SYSTEM_ACTOR,
};
use crate::services::forwarding::ForwardingService;
use crate::services::gateway::CheckoutGateway;
use crate::services::metrics::record_payment_operation;
use crate::services::notifier::{NotificationDispatcher, NotificationEvent};
use crate::services::storage::Storage;

/// Result of initiating a checkout: the pending payment row plus the
/// redirect the customer completes the payment at.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutInitiated {
    pub payment: Payment,
    pub redirect_url: Option<String>,
}

pub struct PaymentService {
    storage: Arc<dyn Storage>,
    gateway: Arc<dyn CheckoutGateway>,
    forwarding: Arc<ForwardingService>,
    notifier: NotificationDispatcher,
    currency: String,
}

impl PaymentService {
    pub fn new(
        storage: Arc<dyn Storage>,
        gateway: Arc<dyn CheckoutGateway>,
        forwarding: Arc<ForwardingService>,
        notifier: NotificationDispatcher,
        currency: String,
    ) -> Self {
        Self {
            storage,
            gateway,
            forwarding,
            notifier,
            currency,
        }
    }

    /// Start a checkout session for an owned request. The only place a
    /// payment row is created; it starts `pending` under the gateway's
    /// session reference.
    #[instrument(skip(self), fields(amount = %amount))]
    pub async fn initiate_checkout(
        &self,
        request_id: i64,
        amount: Decimal,
        payment_type: PaymentType,
        user_id: &str,
    ) -> Result<CheckoutInitiated, AppError> {
        if amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be positive"
            )));
        }

        let request = self
            .storage
            .get_request_for_user(request_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Request not found")))?;

        let description = format!(
            "Payment for shipment #{} - {}",
            request.tracking_code,
            match payment_type {
                PaymentType::Initial => "initial payment",
                PaymentType::Additional => "additional payment",
                PaymentType::Complete => "complete payment",
            }
        );

        let mut metadata = HashMap::new();
        metadata.insert("request_id".to_string(), request_id.to_string());
        metadata.insert("user_id".to_string(), user_id.to_string());
        metadata.insert(
            "payment_type".to_string(),
            payment_type.as_str().to_string(),
        );

        // Checkout cannot proceed without the gateway, so its failure
        // propagates to the caller.
        let session = self
            .gateway
            .create_checkout_session(amount, &self.currency, &description, metadata)
            .await
            .map_err(|e| {
                record_payment_operation("initiate_checkout", "gateway_error");
                e
            })?;

        let payment = self
            .storage
            .insert_payment(&CreatePayment {
                forward_request_id: request_id,
                user_id: user_id.to_string(),
                amount,
                payment_type,
                transaction_id: session.session_id.clone(),
                payment_method: Some("Stripe".to_string()),
                notes: Some(description),
            })
            .await?;

        record_payment_operation("initiate_checkout", "created");
        info!(payment_id = %payment.payment_id, transaction_id = %payment.transaction_id, "Checkout initiated");

        Ok(CheckoutInitiated {
            payment,
            redirect_url: session.redirect_url,
        })
    }

    /// Apply a gateway outcome reported under the checkout-session
    /// reference, falling back to the payment-intent reference. The same
    /// payment is reported under both ids depending on the event type, so
    /// the dual lookup is required for correctness, not convenience.
    #[instrument(skip(self))]
    pub async fn record_gateway_outcome(
        &self,
        transaction_ref: &str,
        gateway_intent_ref: Option<&str>,
        outcome: GatewayOutcome,
    ) -> Result<Payment, AppError> {
        let payment = match self
            .storage
            .find_payment_by_transaction(transaction_ref)
            .await?
        {
            Some(p) => p,
            None => {
                warn!(transaction_ref = %transaction_ref, "No payment under session reference");
                match gateway_intent_ref {
                    Some(intent_ref) => self
                        .storage
                        .find_payment_by_transaction(intent_ref)
                        .await?
                        .ok_or_else(|| {
                            AppError::NotFound(anyhow::anyhow!(
                                "No payment found for transaction {} or intent {}",
                                transaction_ref,
                                intent_ref
                            ))
                        })?,
                    None => {
                        return Err(AppError::NotFound(anyhow::anyhow!(
                            "No payment found for transaction {}",
                            transaction_ref
                        )))
                    }
                }
            }
        };

        let status = outcome.as_payment_status();
        // A succeeded session event carries the intent id the gateway will
        // use for later events; store it so both references resolve.
        let rewrite_ref = match (outcome, gateway_intent_ref) {
            (GatewayOutcome::Succeeded, Some(intent)) if !intent.is_empty() => Some(intent),
            _ => None,
        };

        let payment = self
            .storage
            .set_payment_status(payment.payment_id, status, rewrite_ref, SYSTEM_ACTOR)
            .await?;

        record_payment_operation("record_outcome", status.as_str());

        if status == PaymentStatus::Succeeded {
            self.advance_lifecycle(&payment).await?;
            self.notifier.dispatch(NotificationEvent::PaymentConfirmed {
                request_id: payment.forward_request_id,
                payment_id: payment.payment_id,
                user_id: payment.user_id.clone(),
                amount: payment.amount,
            });
        }

        Ok(payment)
    }

    /// Direct status set for events that only carry the payment-intent
    /// reference, followed by the same fully-paid check.
    #[instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        transaction_ref: &str,
        status: PaymentStatus,
    ) -> Result<Payment, AppError> {
        let payment = self
            .storage
            .find_payment_by_transaction(transaction_ref)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!(
                    "No payment found for transaction {}",
                    transaction_ref
                ))
            })?;

        let payment = self
            .storage
            .set_payment_status(payment.payment_id, status, None, SYSTEM_ACTOR)
            .await?;

        record_payment_operation("update_status", status.as_str());

        if status == PaymentStatus::Succeeded {
            self.advance_if_paid_in_full(payment.forward_request_id).await?;
            self.notifier.dispatch(NotificationEvent::PaymentConfirmed {
                request_id: payment.forward_request_id,
                payment_id: payment.payment_id,
                user_id: payment.user_id.clone(),
                amount: payment.amount,
            });
        }

        Ok(payment)
    }

    #[instrument(skip(self))]
    pub async fn list_payments(&self, request_id: i64) -> Result<Vec<Payment>, AppError> {
        self.storage.list_payments(request_id).await
    }

    /// Drive the two automatic transitions after a succeeded payment.
    /// Re-delivery is harmless: once the request has left the triggering
    /// state the match arms fall through.
    async fn advance_lifecycle(&self, payment: &Payment) -> Result<(), AppError> {
        let request = match self.storage.get_request(payment.forward_request_id).await? {
            Some(r) => r,
            None => return Ok(()),
        };

        match (payment.payment_type(), request.status()) {
            (PaymentType::Initial, ForwardRequestStatus::Draft) => {
                self.forwarding
                    .update_status(
                        request.request_id,
                        ForwardRequestStatus::AwaitingArrival,
                        Some("Initial payment received".to_string()),
                        SYSTEM_ACTOR,
                    )
                    .await?;
            }
            (
                PaymentType::Additional | PaymentType::Complete,
                ForwardRequestStatus::AwaitingPayment,
            ) => {
                self.advance_if_paid_in_full_inner(&request).await?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Fully-paid check against the live payment aggregation.
    async fn advance_if_paid_in_full(&self, request_id: i64) -> Result<(), AppError> {
        let request = match self.storage.get_request(request_id).await? {
            Some(r) => r,
            None => return Ok(()),
        };
        if request.status() != ForwardRequestStatus::AwaitingPayment {
            return Ok(());
        }
        self.advance_if_paid_in_full_inner(&request).await
    }

    async fn advance_if_paid_in_full_inner(
        &self,
        request: &ForwardRequest,
    ) -> Result<(), AppError> {
        let total_paid = self
            .storage
            .sum_succeeded_payments(request.request_id)
            .await?;

        if request.final_total > Decimal::ZERO && total_paid >= request.final_total {
            self.forwarding
                .update_status(
                    request.request_id,
                    ForwardRequestStatus::Processing,
                    Some("Automatically moved to processing after payment completed".to_string()),
                    SYSTEM_ACTOR,
                )
                .await?;
        }
        Ok(())
    }
}
