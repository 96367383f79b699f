//! Request lifecycle manager.
//!
//! Owns the forward-request state machine: creation with tracking-code
//! allocation, item management with estimated-total recalculation, status
//! transitions with history logging, and cascading deletion. Status is
//! staff-settable; only the two payment-triggered transitions are driven
//! autonomously (by payment reconciliation, which calls back in here).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use fastybox_core::error::AppError;
use rand::Rng;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::models::{
    Attachment, CreateItem, CreateRequest, ForwardItem, ForwardRequest, ForwardRequestStatus,
    ForwardRequestView, ListRequestsFilter, NewRequiredDocument, NewStatusEntry, RequiredDocument,
    UpdateRequest,
};
use crate::services::calculator;
use crate::services::metrics::{record_request_operation, record_status_transition};
use crate::services::notifier::{NotificationDispatcher, NotificationEvent};
use crate::services::storage::Storage;

/// Attempts at generating a unique tracking code before giving up. The
/// suffix space is 90,000 codes per day, so exhaustion means something is
/// badly wrong with the clock or the table.
const TRACKING_CODE_ATTEMPTS: u32 = 10;

pub struct ForwardingService {
    storage: Arc<dyn Storage>,
    notifier: NotificationDispatcher,
    /// Serializes the generate-check-insert sequence across concurrent
    /// creations; the unique index on tracking_code is the cross-process
    /// backstop.
    tracking_lock: Mutex<()>,
    /// Per-request locks serializing status changes and item mutations so
    /// total recalculation never races a concurrent mutation.
    request_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ForwardingService {
    pub fn new(storage: Arc<dyn Storage>, notifier: NotificationDispatcher) -> Self {
        Self {
            storage,
            notifier,
            tracking_lock: Mutex::new(()),
            request_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    async fn request_lock(&self, request_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.request_locks.lock().await;
        locks
            .entry(request_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn generate_tracking_code() -> String {
        let date_code = Utc::now().format("%Y%m%d");
        let suffix: u32 = rand::thread_rng().gen_range(10000..=99999);
        format!("FB-{}-{}", date_code, suffix)
    }

    /// Create a request in `Draft` with a freshly allocated tracking code.
    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn create_request(&self, input: CreateRequest) -> Result<ForwardRequest, AppError> {
        if input.user_id.trim().is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Owner user id is required"
            )));
        }

        let mut input = input;
        input.notes = input
            .notes
            .as_deref()
            .map(|s| s.trim().chars().take(250).collect::<String>())
            .filter(|s| !s.is_empty());

        let shipping_rates = self.storage.shipping_rates().await?;
        let customs_rates = self.storage.customs_rates().await?;
        let estimated_total = calculator::estimated_total(&[], &shipping_rates, &customs_rates);

        let history = NewStatusEntry {
            status: ForwardRequestStatus::Draft,
            notes: Some("Request created".to_string()),
            created_by: input.user_id.clone(),
        };

        // Generation and insertion stay under one lock so two concurrent
        // creations cannot both pass the uniqueness check for one candidate.
        let _guard = self.tracking_lock.lock().await;
        for _ in 0..TRACKING_CODE_ATTEMPTS {
            let code = Self::generate_tracking_code();
            if self.storage.tracking_code_exists(&code).await? {
                continue;
            }
            match self
                .storage
                .insert_request(&input, &code, estimated_total, history.clone())
                .await
            {
                Ok(request) => {
                    record_request_operation("create");
                    self.notifier.dispatch(NotificationEvent::RequestCreated {
                        request_id: request.request_id,
                        tracking_code: request.tracking_code.clone(),
                        user_id: request.user_id.clone(),
                    });
                    info!(request_id = %request.request_id, tracking_code = %request.tracking_code, "Forward request created");
                    return Ok(request);
                }
                Err(AppError::Conflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Conflict(anyhow::anyhow!(
            "Could not allocate a unique tracking code after {} attempts",
            TRACKING_CODE_ATTEMPTS
        )))
    }

    /// Load a request with its items, payments, and history. Regular users
    /// see only their own requests; lookups on foreign requests report
    /// nothing rather than revealing existence.
    #[instrument(skip(self))]
    pub async fn get_request(
        &self,
        request_id: i64,
        requester: &str,
        is_admin: bool,
    ) -> Result<Option<ForwardRequestView>, AppError> {
        let view = self.storage.get_request_view(request_id).await?;
        Ok(view.filter(|v| is_admin || v.request.user_id == requester))
    }

    #[instrument(skip(self))]
    pub async fn list_user_requests(
        &self,
        user_id: &str,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<ForwardRequest>, AppError> {
        self.storage.list_user_requests(user_id, page, page_size).await
    }

    #[instrument(skip(self, filter))]
    pub async fn list_all_requests(
        &self,
        filter: ListRequestsFilter,
    ) -> Result<Vec<ForwardRequest>, AppError> {
        self.storage.list_requests(&filter).await
    }

    /// Owner-scoped update of the editable request fields, with total
    /// recalculation.
    #[instrument(skip(self, fields))]
    pub async fn update_request(
        &self,
        request_id: i64,
        user_id: &str,
        mut fields: UpdateRequest,
    ) -> Result<ForwardRequest, AppError> {
        let lock = self.request_lock(request_id).await;
        let _guard = lock.lock().await;

        if self
            .storage
            .get_request_for_user(request_id, user_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(anyhow::anyhow!("Request not found")));
        }

        fields.notes = fields
            .notes
            .as_deref()
            .map(|s| s.trim().chars().take(250).collect::<String>())
            .filter(|s| !s.is_empty());

        self.storage.update_request_fields(request_id, &fields).await?;
        self.recompute_estimated_total(request_id).await?;
        record_request_operation("update");

        self.storage
            .get_request(request_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Request not found")))
    }

    /// Add an item to an owned request and refresh the estimated total.
    #[instrument(skip(self, item))]
    pub async fn add_item(
        &self,
        request_id: i64,
        user_id: &str,
        item: CreateItem,
    ) -> Result<ForwardItem, AppError> {
        let item = item.sanitized();
        if item.name.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Item name is required"
            )));
        }

        let lock = self.request_lock(request_id).await;
        let _guard = lock.lock().await;

        if self
            .storage
            .get_request_for_user(request_id, user_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(anyhow::anyhow!("Request not found")));
        }

        let created = self.storage.insert_item(request_id, &item).await?;
        self.recompute_estimated_total(request_id).await?;
        record_request_operation("add_item");

        Ok(created)
    }

    /// Remove an item (and its attachments) from an owned request. Missing
    /// request or item reports `false` rather than an error.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        request_id: i64,
        user_id: &str,
        item_id: i64,
    ) -> Result<bool, AppError> {
        let lock = self.request_lock(request_id).await;
        let _guard = lock.lock().await;

        if self
            .storage
            .get_request_for_user(request_id, user_id)
            .await?
            .is_none()
        {
            return Ok(false);
        }

        if !self.storage.delete_item(request_id, item_id).await? {
            return Ok(false);
        }

        self.recompute_estimated_total(request_id).await?;
        record_request_operation("remove_item");
        Ok(true)
    }

    /// Record an attachment reference against an owned item. The bytes are
    /// stored behind the file-storage boundary; only the path lands here.
    #[instrument(skip(self))]
    pub async fn attach_file(
        &self,
        request_id: i64,
        user_id: &str,
        item_id: i64,
        file_name: &str,
        storage_path: &str,
        content_type: Option<&str>,
    ) -> Result<Attachment, AppError> {
        if self
            .storage
            .get_request_for_user(request_id, user_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(anyhow::anyhow!("Request not found")));
        }

        let owned = self
            .storage
            .list_items(request_id)
            .await?
            .iter()
            .any(|i| i.item_id == item_id);
        if !owned {
            return Err(AppError::NotFound(anyhow::anyhow!("Item not found")));
        }

        self.storage
            .insert_attachment(item_id, file_name, storage_path, content_type)
            .await
    }

    /// Set the request status, appending exactly one history row. Returns
    /// `false` when the request does not exist. Transitions are not
    /// validated here: status is administrator-settable by design.
    #[instrument(skip(self, notes))]
    pub async fn update_status(
        &self,
        request_id: i64,
        status: ForwardRequestStatus,
        notes: Option<String>,
        actor: &str,
    ) -> Result<bool, AppError> {
        let lock = self.request_lock(request_id).await;
        let _guard = lock.lock().await;
        self.update_status_locked(request_id, status, notes, actor).await
    }

    /// Status update body, assuming the per-request lock is already held.
    async fn update_status_locked(
        &self,
        request_id: i64,
        status: ForwardRequestStatus,
        notes: Option<String>,
        actor: &str,
    ) -> Result<bool, AppError> {
        let request = match self.storage.get_request(request_id).await? {
            Some(r) => r,
            None => return Ok(false),
        };

        self.storage
            .update_status(
                request_id,
                NewStatusEntry {
                    status,
                    notes,
                    created_by: actor.to_string(),
                },
            )
            .await?;

        record_status_transition(status.as_str());
        self.notifier.dispatch(NotificationEvent::StatusChanged {
            request_id,
            tracking_code: request.tracking_code.clone(),
            user_id: request.user_id.clone(),
            status: status.as_str().to_string(),
        });
        info!(request_id = %request_id, status = status.as_str(), "Request status updated");
        Ok(true)
    }

    /// Record the documents staff need from the customer and park the
    /// request in `DocumentsRequired` (through `InReview`, matching the
    /// review flow).
    #[instrument(skip(self, docs), fields(count = docs.len()))]
    pub async fn require_documents(
        &self,
        request_id: i64,
        docs: Vec<NewRequiredDocument>,
        actor: &str,
    ) -> Result<bool, AppError> {
        if docs.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "At least one document must be specified"
            )));
        }

        let lock = self.request_lock(request_id).await;
        let _guard = lock.lock().await;

        let request = match self.storage.get_request(request_id).await? {
            Some(r) => r,
            None => return Ok(false),
        };

        let created = self
            .storage
            .insert_required_documents(request_id, &docs)
            .await?;

        if request.status() != ForwardRequestStatus::InReview {
            self.update_status_locked(
                request_id,
                ForwardRequestStatus::InReview,
                Some("Review started".to_string()),
                actor,
            )
            .await?;
        }
        self.update_status_locked(
            request_id,
            ForwardRequestStatus::DocumentsRequired,
            Some("Documents requested from customer".to_string()),
            actor,
        )
        .await?;

        self.notifier.dispatch(NotificationEvent::DocumentsRequired {
            request_id,
            tracking_code: request.tracking_code.clone(),
            user_id: request.user_id.clone(),
            documents: created.iter().map(|d| d.document_type.clone()).collect(),
        });
        Ok(true)
    }

    #[instrument(skip(self))]
    pub async fn list_required_documents(
        &self,
        request_id: i64,
        requester: &str,
        is_admin: bool,
    ) -> Result<Vec<RequiredDocument>, AppError> {
        let visible = match self.storage.get_request(request_id).await? {
            Some(r) => is_admin || r.user_id == requester,
            None => false,
        };
        if !visible {
            return Err(AppError::NotFound(anyhow::anyhow!("Request not found")));
        }
        self.storage.list_required_documents(request_id).await
    }

    /// Mark a required document as satisfied, optionally linking the
    /// uploaded attachment.
    #[instrument(skip(self))]
    pub async fn submit_document(
        &self,
        request_id: i64,
        user_id: &str,
        document_id: i64,
        attachment_id: Option<i64>,
    ) -> Result<bool, AppError> {
        if self
            .storage
            .get_request_for_user(request_id, user_id)
            .await?
            .is_none()
        {
            return Ok(false);
        }
        self.storage
            .mark_document_submitted(request_id, document_id, attachment_id)
            .await
    }

    /// Assign a shipping address; both request and address must belong to
    /// the user.
    #[instrument(skip(self))]
    pub async fn assign_shipping_address(
        &self,
        request_id: i64,
        user_id: &str,
        address_id: i64,
    ) -> Result<bool, AppError> {
        if self
            .storage
            .get_request_for_user(request_id, user_id)
            .await?
            .is_none()
        {
            return Ok(false);
        }
        if self
            .storage
            .get_address_for_user(address_id, user_id)
            .await?
            .is_none()
        {
            return Ok(false);
        }
        self.storage.assign_address(request_id, address_id).await?;
        Ok(true)
    }

    /// Set the authoritative amount owed, established by staff review.
    #[instrument(skip(self))]
    pub async fn set_final_total(
        &self,
        request_id: i64,
        amount: Decimal,
        actor: &str,
    ) -> Result<bool, AppError> {
        if amount < Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Final total cannot be negative"
            )));
        }
        if self.storage.get_request(request_id).await?.is_none() {
            return Ok(false);
        }
        self.storage.set_final_total(request_id, amount, actor).await?;
        Ok(true)
    }

    /// Delete a request and everything it owns. Only the owner or an
    /// administrator may do this; anyone else sees the same `false` as a
    /// missing request.
    #[instrument(skip(self))]
    pub async fn delete_request(
        &self,
        request_id: i64,
        actor: &str,
        is_admin: bool,
    ) -> Result<bool, AppError> {
        let lock = self.request_lock(request_id).await;
        let _guard = lock.lock().await;

        let request = match self.storage.get_request(request_id).await? {
            Some(r) => r,
            None => return Ok(false),
        };
        if !is_admin && request.user_id != actor {
            return Ok(false);
        }

        self.storage.delete_request(request_id, actor).await?;
        record_request_operation("delete");
        Ok(true)
    }

    /// Recompute the estimated total from the current items and rate
    /// tables. Callers hold the per-request lock.
    async fn recompute_estimated_total(&self, request_id: i64) -> Result<(), AppError> {
        let items = self.storage.list_items(request_id).await?;
        let shipping_rates = self.storage.shipping_rates().await?;
        let customs_rates = self.storage.customs_rates().await?;
        let total = calculator::estimated_total(&items, &shipping_rates, &customs_rates);
        self.storage.update_estimated_total(request_id, total).await
    }
}
