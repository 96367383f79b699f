//! Required document model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Document requested from the customer before a request can proceed to
/// payment (invoice, identification, import permit).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RequiredDocument {
    pub document_id: i64,
    pub forward_request_id: i64,
    pub document_type: String,
    pub description: Option<String>,
    pub is_submitted: bool,
    pub attachment_id: Option<i64>,
    pub created_utc: DateTime<Utc>,
}

/// Input for recording a required document.
#[derive(Debug, Clone)]
pub struct NewRequiredDocument {
    pub document_type: String,
    pub description: Option<String>,
}
