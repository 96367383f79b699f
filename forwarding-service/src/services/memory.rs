//! In-memory storage backend.
//!
//! Backs unit and integration tests, and local development without a
//! database. One mutex over the whole state makes every `Storage` call
//! atomic; rows are plainly removed on delete (retention policies are a
//! concern of the durable backend).

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use fastybox_core::error::AppError;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::models::{
    seed_customs_rates, seed_shipping_rates, Address, Attachment, CreateAddress, CreateItem,
    CreatePayment, CreateRequest, CustomsRate, ForwardItem, ForwardRequest, ForwardRequestView,
    ListRequestsFilter, NewRequiredDocument, NewStatusEntry, Payment, PaymentStatus,
    RequiredDocument, ShippingRate, UpdateRequest,
};
use crate::services::storage::Storage;

#[derive(Default)]
struct MemoryInner {
    requests: BTreeMap<i64, ForwardRequest>,
    items: BTreeMap<i64, ForwardItem>,
    attachments: BTreeMap<i64, Attachment>,
    payments: BTreeMap<i64, Payment>,
    history: BTreeMap<i64, crate::models::RequestStatusHistory>,
    documents: BTreeMap<i64, RequiredDocument>,
    addresses: BTreeMap<i64, Address>,
    shipping_rates: Vec<ShippingRate>,
    customs_rates: Vec<CustomsRate>,
    next_id: i64,
}

impl MemoryInner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn append_history(&mut self, request_id: i64, entry: &NewStatusEntry) {
        let history_id = self.next_id();
        self.history.insert(
            history_id,
            crate::models::RequestStatusHistory {
                history_id,
                forward_request_id: request_id,
                status: entry.status.as_str().to_string(),
                notes: entry.notes.clone(),
                created_by: entry.created_by.clone(),
                created_utc: Utc::now(),
            },
        );
    }
}

/// In-memory `Storage` implementation seeded with the default rate tables.
pub struct MemoryStorage {
    inner: Mutex<MemoryInner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let inner = MemoryInner {
            shipping_rates: seed_shipping_rates(),
            customs_rates: seed_customs_rates(),
            ..Default::default()
        };
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Replace the rate tables (test hook).
    pub async fn set_rates(&self, shipping: Vec<ShippingRate>, customs: Vec<CustomsRate>) {
        let mut inner = self.inner.lock().await;
        inner.shipping_rates = shipping;
        inner.customs_rates = customs;
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn insert_request(
        &self,
        input: &CreateRequest,
        tracking_code: &str,
        estimated_total: Decimal,
        history: NewStatusEntry,
    ) -> Result<ForwardRequest, AppError> {
        let mut inner = self.inner.lock().await;
        if inner
            .requests
            .values()
            .any(|r| r.tracking_code == tracking_code)
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Tracking code {} already exists",
                tracking_code
            )));
        }

        let request_id = inner.next_id();
        let now = Utc::now();
        let request = ForwardRequest {
            request_id,
            user_id: input.user_id.clone(),
            tracking_code: tracking_code.to_string(),
            status: history.status.as_str().to_string(),
            notes: input.notes.clone(),
            shipping_address_id: input.shipping_address_id,
            estimated_total,
            final_total: Decimal::ZERO,
            original_carrier: input.original_carrier.clone(),
            original_tracking_number: input.original_tracking_number.clone(),
            created_utc: now,
            updated_utc: now,
        };
        inner.requests.insert(request_id, request.clone());
        inner.append_history(request_id, &history);
        Ok(request)
    }

    async fn tracking_code_exists(&self, code: &str) -> Result<bool, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.requests.values().any(|r| r.tracking_code == code))
    }

    async fn get_request(&self, request_id: i64) -> Result<Option<ForwardRequest>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.requests.get(&request_id).cloned())
    }

    async fn get_request_for_user(
        &self,
        request_id: i64,
        user_id: &str,
    ) -> Result<Option<ForwardRequest>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .requests
            .get(&request_id)
            .filter(|r| r.user_id == user_id)
            .cloned())
    }

    async fn get_request_view(
        &self,
        request_id: i64,
    ) -> Result<Option<ForwardRequestView>, AppError> {
        let inner = self.inner.lock().await;
        let request = match inner.requests.get(&request_id) {
            Some(r) => r.clone(),
            None => return Ok(None),
        };
        let items = inner
            .items
            .values()
            .filter(|i| i.forward_request_id == request_id)
            .cloned()
            .collect();
        let payments = inner
            .payments
            .values()
            .filter(|p| p.forward_request_id == request_id)
            .cloned()
            .collect();
        // BTreeMap iteration order is id order, which is insertion order.
        let status_history = inner
            .history
            .values()
            .filter(|h| h.forward_request_id == request_id)
            .cloned()
            .collect();
        Ok(Some(ForwardRequestView {
            request,
            items,
            payments,
            status_history,
        }))
    }

    async fn list_user_requests(
        &self,
        user_id: &str,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<ForwardRequest>, AppError> {
        let inner = self.inner.lock().await;
        let mut requests: Vec<_> = inner
            .requests
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(paginate(requests, page, page_size))
    }

    async fn list_requests(
        &self,
        filter: &ListRequestsFilter,
    ) -> Result<Vec<ForwardRequest>, AppError> {
        let inner = self.inner.lock().await;
        let mut requests: Vec<_> = inner
            .requests
            .values()
            .filter(|r| {
                filter
                    .status
                    .map(|s| r.status == s.as_str())
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(paginate(requests, filter.page, filter.page_size))
    }

    async fn update_request_fields(
        &self,
        request_id: i64,
        fields: &UpdateRequest,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let request = inner
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Request not found")))?;
        request.notes = fields.notes.clone();
        request.shipping_address_id = fields.shipping_address_id;
        request.original_carrier = fields.original_carrier.clone();
        request.original_tracking_number = fields.original_tracking_number.clone();
        request.updated_utc = Utc::now();
        Ok(())
    }

    async fn update_estimated_total(
        &self,
        request_id: i64,
        total: Decimal,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let request = inner
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Request not found")))?;
        request.estimated_total = total;
        request.updated_utc = Utc::now();
        Ok(())
    }

    async fn set_final_total(
        &self,
        request_id: i64,
        total: Decimal,
        _actor: &str,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let request = inner
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Request not found")))?;
        request.final_total = total;
        request.updated_utc = Utc::now();
        Ok(())
    }

    async fn update_status(
        &self,
        request_id: i64,
        entry: NewStatusEntry,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let request = inner
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Request not found")))?;
        request.status = entry.status.as_str().to_string();
        request.updated_utc = Utc::now();
        inner.append_history(request_id, &entry);
        Ok(())
    }

    async fn assign_address(&self, request_id: i64, address_id: i64) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let request = inner
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Request not found")))?;
        request.shipping_address_id = Some(address_id);
        request.updated_utc = Utc::now();
        Ok(())
    }

    async fn delete_request(&self, request_id: i64, _actor: &str) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        if inner.requests.remove(&request_id).is_none() {
            return Err(AppError::NotFound(anyhow::anyhow!("Request not found")));
        }
        let item_ids: Vec<i64> = inner
            .items
            .values()
            .filter(|i| i.forward_request_id == request_id)
            .map(|i| i.item_id)
            .collect();
        for item_id in item_ids {
            inner.items.remove(&item_id);
            inner
                .attachments
                .retain(|_, a| a.forward_item_id != item_id);
        }
        inner
            .payments
            .retain(|_, p| p.forward_request_id != request_id);
        inner
            .history
            .retain(|_, h| h.forward_request_id != request_id);
        inner
            .documents
            .retain(|_, d| d.forward_request_id != request_id);
        Ok(())
    }

    async fn insert_item(
        &self,
        request_id: i64,
        item: &CreateItem,
    ) -> Result<ForwardItem, AppError> {
        let mut inner = self.inner.lock().await;
        if !inner.requests.contains_key(&request_id) {
            return Err(AppError::NotFound(anyhow::anyhow!("Request not found")));
        }
        let item_id = inner.next_id();
        let row = ForwardItem {
            item_id,
            forward_request_id: request_id,
            name: item.name.clone(),
            url: item.url.clone(),
            vendor: item.vendor.clone(),
            declared_weight: item.declared_weight,
            declared_length: item.declared_length,
            declared_width: item.declared_width,
            declared_height: item.declared_height,
            actual_weight: None,
            actual_length: None,
            actual_width: None,
            actual_height: None,
            declared_value: item.declared_value,
            notes: item.notes.clone(),
            created_utc: Utc::now(),
        };
        inner.items.insert(item_id, row.clone());
        Ok(row)
    }

    async fn list_items(&self, request_id: i64) -> Result<Vec<ForwardItem>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .items
            .values()
            .filter(|i| i.forward_request_id == request_id)
            .cloned()
            .collect())
    }

    async fn delete_item(&self, request_id: i64, item_id: i64) -> Result<bool, AppError> {
        let mut inner = self.inner.lock().await;
        let owned = inner
            .items
            .get(&item_id)
            .map(|i| i.forward_request_id == request_id)
            .unwrap_or(false);
        if !owned {
            return Ok(false);
        }
        inner.items.remove(&item_id);
        inner
            .attachments
            .retain(|_, a| a.forward_item_id != item_id);
        Ok(true)
    }

    async fn insert_attachment(
        &self,
        item_id: i64,
        file_name: &str,
        storage_path: &str,
        content_type: Option<&str>,
    ) -> Result<Attachment, AppError> {
        let mut inner = self.inner.lock().await;
        if !inner.items.contains_key(&item_id) {
            return Err(AppError::NotFound(anyhow::anyhow!("Item not found")));
        }
        let attachment_id = inner.next_id();
        let attachment = Attachment {
            attachment_id,
            forward_item_id: item_id,
            file_name: file_name.to_string(),
            storage_path: storage_path.to_string(),
            content_type: content_type.map(|s| s.to_string()),
            created_utc: Utc::now(),
        };
        inner.attachments.insert(attachment_id, attachment.clone());
        Ok(attachment)
    }

    async fn insert_payment(&self, input: &CreatePayment) -> Result<Payment, AppError> {
        let mut inner = self.inner.lock().await;
        if !inner.requests.contains_key(&input.forward_request_id) {
            return Err(AppError::NotFound(anyhow::anyhow!("Request not found")));
        }
        let payment_id = inner.next_id();
        let payment = Payment {
            payment_id,
            forward_request_id: input.forward_request_id,
            user_id: input.user_id.clone(),
            amount: input.amount,
            status: PaymentStatus::Pending.as_str().to_string(),
            payment_type: input.payment_type.as_str().to_string(),
            transaction_id: input.transaction_id.clone(),
            payment_method: input.payment_method.clone(),
            notes: input.notes.clone(),
            created_utc: Utc::now(),
            modified_utc: None,
            modified_by: None,
        };
        inner.payments.insert(payment_id, payment.clone());
        Ok(payment)
    }

    async fn find_payment_by_transaction(
        &self,
        transaction_ref: &str,
    ) -> Result<Option<Payment>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .payments
            .values()
            .find(|p| p.transaction_id == transaction_ref)
            .cloned())
    }

    async fn set_payment_status(
        &self,
        payment_id: i64,
        status: PaymentStatus,
        transaction_id: Option<&str>,
        modified_by: &str,
    ) -> Result<Payment, AppError> {
        let mut inner = self.inner.lock().await;
        let payment = inner
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;
        payment.status = status.as_str().to_string();
        if let Some(txn) = transaction_id {
            payment.transaction_id = txn.to_string();
        }
        payment.modified_utc = Some(Utc::now());
        payment.modified_by = Some(modified_by.to_string());
        Ok(payment.clone())
    }

    async fn list_payments(&self, request_id: i64) -> Result<Vec<Payment>, AppError> {
        let inner = self.inner.lock().await;
        let mut payments: Vec<_> = inner
            .payments
            .values()
            .filter(|p| p.forward_request_id == request_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(payments)
    }

    async fn sum_succeeded_payments(&self, request_id: i64) -> Result<Decimal, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .payments
            .values()
            .filter(|p| {
                p.forward_request_id == request_id
                    && p.status() == PaymentStatus::Succeeded
            })
            .map(|p| p.amount)
            .sum())
    }

    async fn insert_required_documents(
        &self,
        request_id: i64,
        docs: &[NewRequiredDocument],
    ) -> Result<Vec<RequiredDocument>, AppError> {
        let mut inner = self.inner.lock().await;
        if !inner.requests.contains_key(&request_id) {
            return Err(AppError::NotFound(anyhow::anyhow!("Request not found")));
        }
        let mut created = Vec::with_capacity(docs.len());
        for doc in docs {
            let document_id = inner.next_id();
            let row = RequiredDocument {
                document_id,
                forward_request_id: request_id,
                document_type: doc.document_type.clone(),
                description: doc.description.clone(),
                is_submitted: false,
                attachment_id: None,
                created_utc: Utc::now(),
            };
            inner.documents.insert(document_id, row.clone());
            created.push(row);
        }
        Ok(created)
    }

    async fn list_required_documents(
        &self,
        request_id: i64,
    ) -> Result<Vec<RequiredDocument>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .documents
            .values()
            .filter(|d| d.forward_request_id == request_id)
            .cloned()
            .collect())
    }

    async fn mark_document_submitted(
        &self,
        request_id: i64,
        document_id: i64,
        attachment_id: Option<i64>,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.lock().await;
        match inner.documents.get_mut(&document_id) {
            Some(doc) if doc.forward_request_id == request_id => {
                doc.is_submitted = true;
                doc.attachment_id = attachment_id;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_address(&self, input: &CreateAddress) -> Result<Address, AppError> {
        let mut inner = self.inner.lock().await;
        let address_id = inner.next_id();
        let address = Address {
            address_id,
            user_id: input.user_id.clone(),
            recipient_name: input.recipient_name.clone(),
            street: input.street.clone(),
            city: input.city.clone(),
            state: input.state.clone(),
            postal_code: input.postal_code.clone(),
            country: input.country.clone(),
            phone: input.phone.clone(),
            created_utc: Utc::now(),
        };
        inner.addresses.insert(address_id, address.clone());
        Ok(address)
    }

    async fn get_address_for_user(
        &self,
        address_id: i64,
        user_id: &str,
    ) -> Result<Option<Address>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .addresses
            .get(&address_id)
            .filter(|a| a.user_id == user_id)
            .cloned())
    }

    async fn list_user_addresses(&self, user_id: &str) -> Result<Vec<Address>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .addresses
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn shipping_rates(&self) -> Result<Vec<ShippingRate>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.shipping_rates.clone())
    }

    async fn customs_rates(&self) -> Result<Vec<CustomsRate>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.customs_rates.clone())
    }
}

fn paginate<T>(rows: Vec<T>, page: i64, page_size: i64) -> Vec<T> {
    let page = page.max(1);
    let page_size = if page_size <= 0 { 10 } else { page_size };
    rows.into_iter()
        .skip(((page - 1) * page_size) as usize)
        .take(page_size as usize)
        .collect()
}
