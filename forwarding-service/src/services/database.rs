//! PostgreSQL storage backend for forwarding-service.

use async_trait::async_trait;
use chrono::Utc;
use fastybox_core::error::AppError;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

use crate::models::{
    Address, Attachment, CreateAddress, CreateItem, CreatePayment, CreateRequest, CustomsRate,
    ForwardItem, ForwardRequest, ForwardRequestView, ListRequestsFilter, NewRequiredDocument,
    NewStatusEntry, Payment, PaymentStatus, RequiredDocument, ShippingRate, UpdateRequest,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::storage::Storage;

const REQUEST_COLUMNS: &str = "request_id, user_id, tracking_code, status, notes, \
     shipping_address_id, estimated_total, final_total, original_carrier, \
     original_tracking_number, created_utc, updated_utc";

const ITEM_COLUMNS: &str = "item_id, forward_request_id, name, url, vendor, declared_weight, \
     declared_length, declared_width, declared_height, actual_weight, actual_length, \
     actual_width, actual_height, declared_value, notes, created_utc";

const PAYMENT_COLUMNS: &str = "payment_id, forward_request_id, user_id, amount, status, \
     payment_type, transaction_id, payment_method, notes, created_utc, modified_utc, modified_by";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "forwarding-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

fn db_err(context: &str, e: sqlx::Error) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("{}: {}", context, e))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

#[async_trait]
impl Storage for Database {
    /// Check database health.
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("Health check failed", e))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self, input, history), fields(tracking_code = %tracking_code))]
    async fn insert_request(
        &self,
        input: &CreateRequest,
        tracking_code: &str,
        estimated_total: Decimal,
        history: NewStatusEntry,
    ) -> Result<ForwardRequest, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_request"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let request = sqlx::query_as::<_, ForwardRequest>(&format!(
            r#"
            INSERT INTO forward_requests
                (user_id, tracking_code, status, notes, shipping_address_id,
                 estimated_total, original_carrier, original_tracking_number, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $1)
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(&input.user_id)
        .bind(tracking_code)
        .bind(history.status.as_str())
        .bind(&input.notes)
        .bind(input.shipping_address_id)
        .bind(estimated_total)
        .bind(&input.original_carrier)
        .bind(&input.original_tracking_number)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(anyhow::anyhow!(
                    "Tracking code {} already exists",
                    tracking_code
                ))
            } else {
                db_err("Failed to create request", e)
            }
        })?;

        sqlx::query(
            r#"
            INSERT INTO request_status_history (forward_request_id, status, notes, created_by)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(request.request_id)
        .bind(history.status.as_str())
        .bind(&history.notes)
        .bind(&history.created_by)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to append status history", e))?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit request creation", e))?;

        timer.observe_duration();
        info!(request_id = %request.request_id, tracking_code = %request.tracking_code, "Request created");

        Ok(request)
    }

    #[instrument(skip(self))]
    async fn tracking_code_exists(&self, code: &str) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["tracking_code_exists"])
            .start_timer();

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM forward_requests WHERE tracking_code = $1)",
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("Failed to check tracking code", e))?;

        timer.observe_duration();
        Ok(exists)
    }

    #[instrument(skip(self))]
    async fn get_request(&self, request_id: i64) -> Result<Option<ForwardRequest>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_request"])
            .start_timer();

        let request = sqlx::query_as::<_, ForwardRequest>(&format!(
            "SELECT {} FROM forward_requests WHERE request_id = $1 AND NOT is_deleted",
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to get request", e))?;

        timer.observe_duration();
        Ok(request)
    }

    #[instrument(skip(self))]
    async fn get_request_for_user(
        &self,
        request_id: i64,
        user_id: &str,
    ) -> Result<Option<ForwardRequest>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_request_for_user"])
            .start_timer();

        let request = sqlx::query_as::<_, ForwardRequest>(&format!(
            "SELECT {} FROM forward_requests \
             WHERE request_id = $1 AND user_id = $2 AND NOT is_deleted",
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to get request", e))?;

        timer.observe_duration();
        Ok(request)
    }

    #[instrument(skip(self))]
    async fn get_request_view(
        &self,
        request_id: i64,
    ) -> Result<Option<ForwardRequestView>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_request_view"])
            .start_timer();

        let request = match self.get_request(request_id).await? {
            Some(r) => r,
            None => return Ok(None),
        };

        let items = self.list_items(request_id).await?;
        let payments = self.list_payments(request_id).await?;

        let status_history = sqlx::query_as::<_, crate::models::RequestStatusHistory>(
            "SELECT history_id, forward_request_id, status, notes, created_by, created_utc \
             FROM request_status_history WHERE forward_request_id = $1 ORDER BY history_id",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to load status history", e))?;

        timer.observe_duration();
        Ok(Some(ForwardRequestView {
            request,
            items,
            payments,
            status_history,
        }))
    }

    #[instrument(skip(self))]
    async fn list_user_requests(
        &self,
        user_id: &str,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<ForwardRequest>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_user_requests"])
            .start_timer();

        let page = page.max(1);
        let page_size = if page_size <= 0 { 10 } else { page_size };

        let requests = sqlx::query_as::<_, ForwardRequest>(&format!(
            "SELECT {} FROM forward_requests \
             WHERE user_id = $1 AND NOT is_deleted \
             ORDER BY created_utc DESC OFFSET $2 LIMIT $3",
            REQUEST_COLUMNS
        ))
        .bind(user_id)
        .bind((page - 1) * page_size)
        .bind(page_size)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list requests", e))?;

        timer.observe_duration();
        Ok(requests)
    }

    #[instrument(skip(self, filter))]
    async fn list_requests(
        &self,
        filter: &ListRequestsFilter,
    ) -> Result<Vec<ForwardRequest>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_requests"])
            .start_timer();

        let page = filter.page.max(1);
        let page_size = if filter.page_size <= 0 {
            10
        } else {
            filter.page_size
        };

        let requests = sqlx::query_as::<_, ForwardRequest>(&format!(
            "SELECT {} FROM forward_requests \
             WHERE NOT is_deleted AND ($1::TEXT IS NULL OR status = $1) \
             ORDER BY created_utc DESC OFFSET $2 LIMIT $3",
            REQUEST_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind((page - 1) * page_size)
        .bind(page_size)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list requests", e))?;

        timer.observe_duration();
        Ok(requests)
    }

    #[instrument(skip(self, fields))]
    async fn update_request_fields(
        &self,
        request_id: i64,
        fields: &UpdateRequest,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_request_fields"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE forward_requests
            SET notes = $2, shipping_address_id = $3, original_carrier = $4,
                original_tracking_number = $5, updated_utc = NOW()
            WHERE request_id = $1 AND NOT is_deleted
            "#,
        )
        .bind(request_id)
        .bind(&fields.notes)
        .bind(fields.shipping_address_id)
        .bind(&fields.original_carrier)
        .bind(&fields.original_tracking_number)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("Failed to update request", e))?;

        timer.observe_duration();
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Request not found")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_estimated_total(
        &self,
        request_id: i64,
        total: Decimal,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_estimated_total"])
            .start_timer();

        let result = sqlx::query(
            "UPDATE forward_requests SET estimated_total = $2, updated_utc = NOW() \
             WHERE request_id = $1 AND NOT is_deleted",
        )
        .bind(request_id)
        .bind(total)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("Failed to update estimated total", e))?;

        timer.observe_duration();
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Request not found")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_final_total(
        &self,
        request_id: i64,
        total: Decimal,
        actor: &str,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_final_total"])
            .start_timer();

        let result = sqlx::query(
            "UPDATE forward_requests \
             SET final_total = $2, modified_by = $3, updated_utc = NOW() \
             WHERE request_id = $1 AND NOT is_deleted",
        )
        .bind(request_id)
        .bind(total)
        .bind(actor)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("Failed to set final total", e))?;

        timer.observe_duration();
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Request not found")));
        }
        Ok(())
    }

    #[instrument(skip(self, entry), fields(status = entry.status.as_str()))]
    async fn update_status(
        &self,
        request_id: i64,
        entry: NewStatusEntry,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_status"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let result = sqlx::query(
            "UPDATE forward_requests \
             SET status = $2, modified_by = $3, updated_utc = NOW() \
             WHERE request_id = $1 AND NOT is_deleted",
        )
        .bind(request_id)
        .bind(entry.status.as_str())
        .bind(&entry.created_by)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to update status", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Request not found")));
        }

        sqlx::query(
            "INSERT INTO request_status_history (forward_request_id, status, notes, created_by) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(request_id)
        .bind(entry.status.as_str())
        .bind(&entry.notes)
        .bind(&entry.created_by)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to append status history", e))?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit status update", e))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn assign_address(&self, request_id: i64, address_id: i64) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["assign_address"])
            .start_timer();

        let result = sqlx::query(
            "UPDATE forward_requests SET shipping_address_id = $2, updated_utc = NOW() \
             WHERE request_id = $1 AND NOT is_deleted",
        )
        .bind(request_id)
        .bind(address_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("Failed to assign address", e))?;

        timer.observe_duration();
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Request not found")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_request(&self, request_id: i64, actor: &str) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_request"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE forward_requests \
             SET is_deleted = TRUE, deleted_utc = $2, deleted_by = $3 \
             WHERE request_id = $1 AND NOT is_deleted",
        )
        .bind(request_id)
        .bind(now)
        .bind(actor)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to delete request", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Request not found")));
        }

        sqlx::query(
            "UPDATE attachments SET is_deleted = TRUE WHERE forward_item_id IN \
             (SELECT item_id FROM forward_items WHERE forward_request_id = $1)",
        )
        .bind(request_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to delete attachments", e))?;

        sqlx::query("UPDATE forward_items SET is_deleted = TRUE WHERE forward_request_id = $1")
            .bind(request_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("Failed to delete items", e))?;

        sqlx::query("UPDATE payments SET is_deleted = TRUE WHERE forward_request_id = $1")
            .bind(request_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("Failed to delete payments", e))?;

        sqlx::query("UPDATE required_documents SET is_deleted = TRUE WHERE forward_request_id = $1")
            .bind(request_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("Failed to delete required documents", e))?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit request deletion", e))?;

        timer.observe_duration();
        info!(request_id = %request_id, "Request deleted");
        Ok(())
    }

    #[instrument(skip(self, item))]
    async fn insert_item(
        &self,
        request_id: i64,
        item: &CreateItem,
    ) -> Result<ForwardItem, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_item"])
            .start_timer();

        let row = sqlx::query_as::<_, ForwardItem>(&format!(
            r#"
            INSERT INTO forward_items
                (forward_request_id, name, url, vendor, declared_weight, declared_length,
                 declared_width, declared_height, declared_value, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(request_id)
        .bind(&item.name)
        .bind(&item.url)
        .bind(&item.vendor)
        .bind(item.declared_weight)
        .bind(item.declared_length)
        .bind(item.declared_width)
        .bind(item.declared_height)
        .bind(item.declared_value)
        .bind(&item.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("Failed to create item", e))?;

        timer.observe_duration();
        Ok(row)
    }

    #[instrument(skip(self))]
    async fn list_items(&self, request_id: i64) -> Result<Vec<ForwardItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_items"])
            .start_timer();

        let items = sqlx::query_as::<_, ForwardItem>(&format!(
            "SELECT {} FROM forward_items \
             WHERE forward_request_id = $1 AND NOT is_deleted ORDER BY item_id",
            ITEM_COLUMNS
        ))
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list items", e))?;

        timer.observe_duration();
        Ok(items)
    }

    #[instrument(skip(self))]
    async fn delete_item(&self, request_id: i64, item_id: i64) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_item"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let result = sqlx::query(
            "UPDATE forward_items SET is_deleted = TRUE \
             WHERE item_id = $1 AND forward_request_id = $2 AND NOT is_deleted",
        )
        .bind(item_id)
        .bind(request_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_err("Failed to delete item", e))?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("UPDATE attachments SET is_deleted = TRUE WHERE forward_item_id = $1")
            .bind(item_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("Failed to delete attachments", e))?;

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit item deletion", e))?;

        timer.observe_duration();
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn insert_attachment(
        &self,
        item_id: i64,
        file_name: &str,
        storage_path: &str,
        content_type: Option<&str>,
    ) -> Result<Attachment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_attachment"])
            .start_timer();

        let attachment = sqlx::query_as::<_, Attachment>(
            r#"
            INSERT INTO attachments (forward_item_id, file_name, storage_path, content_type)
            VALUES ($1, $2, $3, $4)
            RETURNING attachment_id, forward_item_id, file_name, storage_path, content_type, created_utc
            "#,
        )
        .bind(item_id)
        .bind(file_name)
        .bind(storage_path)
        .bind(content_type)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("Failed to create attachment", e))?;

        timer.observe_duration();
        Ok(attachment)
    }

    #[instrument(skip(self, input), fields(request_id = %input.forward_request_id))]
    async fn insert_payment(&self, input: &CreatePayment) -> Result<Payment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_payment"])
            .start_timer();

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments
                (forward_request_id, user_id, amount, status, payment_type,
                 transaction_id, payment_method, notes)
            VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(input.forward_request_id)
        .bind(&input.user_id)
        .bind(input.amount)
        .bind(input.payment_type.as_str())
        .bind(&input.transaction_id)
        .bind(&input.payment_method)
        .bind(&input.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(anyhow::anyhow!(
                    "Transaction {} already recorded",
                    input.transaction_id
                ))
            } else {
                db_err("Failed to create payment", e)
            }
        })?;

        timer.observe_duration();
        info!(payment_id = %payment.payment_id, "Payment recorded");
        Ok(payment)
    }

    #[instrument(skip(self))]
    async fn find_payment_by_transaction(
        &self,
        transaction_ref: &str,
    ) -> Result<Option<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_payment_by_transaction"])
            .start_timer();

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments WHERE transaction_id = $1 AND NOT is_deleted",
            PAYMENT_COLUMNS
        ))
        .bind(transaction_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to find payment", e))?;

        timer.observe_duration();
        Ok(payment)
    }

    #[instrument(skip(self))]
    async fn set_payment_status(
        &self,
        payment_id: i64,
        status: PaymentStatus,
        transaction_id: Option<&str>,
        modified_by: &str,
    ) -> Result<Payment, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_payment_status"])
            .start_timer();

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET status = $2,
                transaction_id = COALESCE($3, transaction_id),
                modified_utc = NOW(),
                modified_by = $4
            WHERE payment_id = $1 AND NOT is_deleted
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(payment_id)
        .bind(status.as_str())
        .bind(transaction_id)
        .bind(modified_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to update payment status", e))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

        timer.observe_duration();
        Ok(payment)
    }

    #[instrument(skip(self))]
    async fn list_payments(&self, request_id: i64) -> Result<Vec<Payment>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {} FROM payments \
             WHERE forward_request_id = $1 AND NOT is_deleted ORDER BY created_utc DESC",
            PAYMENT_COLUMNS
        ))
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list payments", e))?;

        timer.observe_duration();
        Ok(payments)
    }

    #[instrument(skip(self))]
    async fn sum_succeeded_payments(&self, request_id: i64) -> Result<Decimal, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["sum_succeeded_payments"])
            .start_timer();

        let total: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM payments \
             WHERE forward_request_id = $1 AND status = 'succeeded' AND NOT is_deleted",
        )
        .bind(request_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("Failed to sum payments", e))?;

        timer.observe_duration();
        Ok(total)
    }

    #[instrument(skip(self, docs), fields(count = docs.len()))]
    async fn insert_required_documents(
        &self,
        request_id: i64,
        docs: &[NewRequiredDocument],
    ) -> Result<Vec<RequiredDocument>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_required_documents"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;

        let mut created = Vec::with_capacity(docs.len());
        for doc in docs {
            let row = sqlx::query_as::<_, RequiredDocument>(
                r#"
                INSERT INTO required_documents (forward_request_id, document_type, description)
                VALUES ($1, $2, $3)
                RETURNING document_id, forward_request_id, document_type, description,
                          is_submitted, attachment_id, created_utc
                "#,
            )
            .bind(request_id)
            .bind(&doc.document_type)
            .bind(&doc.description)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| db_err("Failed to create required document", e))?;
            created.push(row);
        }

        tx.commit()
            .await
            .map_err(|e| db_err("Failed to commit required documents", e))?;

        timer.observe_duration();
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn list_required_documents(
        &self,
        request_id: i64,
    ) -> Result<Vec<RequiredDocument>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_required_documents"])
            .start_timer();

        let docs = sqlx::query_as::<_, RequiredDocument>(
            "SELECT document_id, forward_request_id, document_type, description, \
             is_submitted, attachment_id, created_utc \
             FROM required_documents \
             WHERE forward_request_id = $1 AND NOT is_deleted ORDER BY document_id",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list required documents", e))?;

        timer.observe_duration();
        Ok(docs)
    }

    #[instrument(skip(self))]
    async fn mark_document_submitted(
        &self,
        request_id: i64,
        document_id: i64,
        attachment_id: Option<i64>,
    ) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["mark_document_submitted"])
            .start_timer();

        let result = sqlx::query(
            "UPDATE required_documents SET is_submitted = TRUE, attachment_id = $3 \
             WHERE document_id = $1 AND forward_request_id = $2 AND NOT is_deleted",
        )
        .bind(document_id)
        .bind(request_id)
        .bind(attachment_id)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("Failed to mark document submitted", e))?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    async fn insert_address(&self, input: &CreateAddress) -> Result<Address, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_address"])
            .start_timer();

        let address = sqlx::query_as::<_, Address>(
            r#"
            INSERT INTO addresses
                (user_id, recipient_name, street, city, state, postal_code, country, phone)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING address_id, user_id, recipient_name, street, city, state,
                      postal_code, country, phone, created_utc
            "#,
        )
        .bind(&input.user_id)
        .bind(&input.recipient_name)
        .bind(&input.street)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.country)
        .bind(&input.phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("Failed to create address", e))?;

        timer.observe_duration();
        Ok(address)
    }

    #[instrument(skip(self))]
    async fn get_address_for_user(
        &self,
        address_id: i64,
        user_id: &str,
    ) -> Result<Option<Address>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_address_for_user"])
            .start_timer();

        let address = sqlx::query_as::<_, Address>(
            "SELECT address_id, user_id, recipient_name, street, city, state, \
             postal_code, country, phone, created_utc \
             FROM addresses WHERE address_id = $1 AND user_id = $2 AND NOT is_deleted",
        )
        .bind(address_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("Failed to get address", e))?;

        timer.observe_duration();
        Ok(address)
    }

    #[instrument(skip(self))]
    async fn list_user_addresses(&self, user_id: &str) -> Result<Vec<Address>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_user_addresses"])
            .start_timer();

        let addresses = sqlx::query_as::<_, Address>(
            "SELECT address_id, user_id, recipient_name, street, city, state, \
             postal_code, country, phone, created_utc \
             FROM addresses WHERE user_id = $1 AND NOT is_deleted ORDER BY address_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to list addresses", e))?;

        timer.observe_duration();
        Ok(addresses)
    }

    #[instrument(skip(self))]
    async fn shipping_rates(&self) -> Result<Vec<ShippingRate>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["shipping_rates"])
            .start_timer();

        let rates = sqlx::query_as::<_, ShippingRate>(
            "SELECT rate_id, name, min_weight, max_weight, base_rate, additional_per_kg, \
             is_active FROM shipping_rates ORDER BY min_weight",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to load shipping rates", e))?;

        timer.observe_duration();
        Ok(rates)
    }

    #[instrument(skip(self))]
    async fn customs_rates(&self) -> Result<Vec<CustomsRate>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["customs_rates"])
            .start_timer();

        let rates = sqlx::query_as::<_, CustomsRate>(
            "SELECT rate_id, name, category, rate_percentage, minimum_fee, is_active \
             FROM customs_rates ORDER BY rate_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("Failed to load customs rates", e))?;

        timer.observe_duration();
        Ok(rates)
    }
}
