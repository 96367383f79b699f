//! Storage abstraction for the forwarding domain.
//!
//! Each method is an atomic unit against the backing store: the Postgres
//! implementation wraps multi-row operations in a transaction, the in-memory
//! implementation holds one lock across the whole call. Coordination between
//! calls (read-compute-write sequences) is the service layer's job.

use async_trait::async_trait;
use fastybox_core::error::AppError;
use rust_decimal::Decimal;

use crate::models::{
    Address, Attachment, CreateAddress, CreateItem, CreatePayment, CreateRequest, CustomsRate,
    ForwardItem, ForwardRequest, ForwardRequestView, ListRequestsFilter, NewRequiredDocument,
    NewStatusEntry, Payment, PaymentStatus, RequiredDocument, ShippingRate, UpdateRequest,
};

#[async_trait]
pub trait Storage: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    // =========================================================================
    // Requests
    // =========================================================================

    /// Persist a new request together with its first history entry.
    /// Fails with `Conflict` when the tracking code is already taken.
    async fn insert_request(
        &self,
        input: &CreateRequest,
        tracking_code: &str,
        estimated_total: Decimal,
        history: NewStatusEntry,
    ) -> Result<ForwardRequest, AppError>;

    async fn tracking_code_exists(&self, code: &str) -> Result<bool, AppError>;

    async fn get_request(&self, request_id: i64) -> Result<Option<ForwardRequest>, AppError>;

    async fn get_request_for_user(
        &self,
        request_id: i64,
        user_id: &str,
    ) -> Result<Option<ForwardRequest>, AppError>;

    /// Load a request with items, payments, and chronologically ordered
    /// status history.
    async fn get_request_view(
        &self,
        request_id: i64,
    ) -> Result<Option<ForwardRequestView>, AppError>;

    async fn list_user_requests(
        &self,
        user_id: &str,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<ForwardRequest>, AppError>;

    async fn list_requests(
        &self,
        filter: &ListRequestsFilter,
    ) -> Result<Vec<ForwardRequest>, AppError>;

    async fn update_request_fields(
        &self,
        request_id: i64,
        fields: &UpdateRequest,
    ) -> Result<(), AppError>;

    async fn update_estimated_total(
        &self,
        request_id: i64,
        total: Decimal,
    ) -> Result<(), AppError>;

    async fn set_final_total(
        &self,
        request_id: i64,
        total: Decimal,
        actor: &str,
    ) -> Result<(), AppError>;

    /// Set the request status and append the matching history row as one
    /// atomic unit.
    async fn update_status(&self, request_id: i64, entry: NewStatusEntry)
        -> Result<(), AppError>;

    async fn assign_address(&self, request_id: i64, address_id: i64) -> Result<(), AppError>;

    /// Remove a request and everything it owns: items, attachments,
    /// payments, history, required documents.
    async fn delete_request(&self, request_id: i64, actor: &str) -> Result<(), AppError>;

    // =========================================================================
    // Items
    // =========================================================================

    async fn insert_item(
        &self,
        request_id: i64,
        item: &CreateItem,
    ) -> Result<ForwardItem, AppError>;

    async fn list_items(&self, request_id: i64) -> Result<Vec<ForwardItem>, AppError>;

    /// Delete an item and its attachments. Returns `false` when the item
    /// does not belong to the request.
    async fn delete_item(&self, request_id: i64, item_id: i64) -> Result<bool, AppError>;

    async fn insert_attachment(
        &self,
        item_id: i64,
        file_name: &str,
        storage_path: &str,
        content_type: Option<&str>,
    ) -> Result<Attachment, AppError>;

    // =========================================================================
    // Payments
    // =========================================================================

    async fn insert_payment(&self, input: &CreatePayment) -> Result<Payment, AppError>;

    async fn find_payment_by_transaction(
        &self,
        transaction_ref: &str,
    ) -> Result<Option<Payment>, AppError>;

    /// Set a payment's status, optionally rewriting its transaction id to
    /// the gateway's payment-intent reference.
    async fn set_payment_status(
        &self,
        payment_id: i64,
        status: PaymentStatus,
        transaction_id: Option<&str>,
        modified_by: &str,
    ) -> Result<Payment, AppError>;

    async fn list_payments(&self, request_id: i64) -> Result<Vec<Payment>, AppError>;

    /// Read-side projection of the paid total: sum of succeeded payments.
    async fn sum_succeeded_payments(&self, request_id: i64) -> Result<Decimal, AppError>;

    // =========================================================================
    // Required documents
    // =========================================================================

    async fn insert_required_documents(
        &self,
        request_id: i64,
        docs: &[NewRequiredDocument],
    ) -> Result<Vec<RequiredDocument>, AppError>;

    async fn list_required_documents(
        &self,
        request_id: i64,
    ) -> Result<Vec<RequiredDocument>, AppError>;

    async fn mark_document_submitted(
        &self,
        request_id: i64,
        document_id: i64,
        attachment_id: Option<i64>,
    ) -> Result<bool, AppError>;

    // =========================================================================
    // Addresses
    // =========================================================================

    async fn insert_address(&self, input: &CreateAddress) -> Result<Address, AppError>;

    async fn get_address_for_user(
        &self,
        address_id: i64,
        user_id: &str,
    ) -> Result<Option<Address>, AppError>;

    async fn list_user_addresses(&self, user_id: &str) -> Result<Vec<Address>, AppError>;

    // =========================================================================
    // Rate tables
    // =========================================================================

    async fn shipping_rates(&self) -> Result<Vec<ShippingRate>, AppError>;

    async fn customs_rates(&self) -> Result<Vec<CustomsRate>, AppError>;
}
