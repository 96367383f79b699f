//! Forward item handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use fastybox_core::error::AppError;
use validator::Validate;

use crate::dtos::{AttachFileDto, CreateItemDto};
use crate::middleware::AuthContext;
use crate::models::{Attachment, ForwardItem};
use crate::startup::AppState;

/// Add an item to an owned request.
pub async fn add_item(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(request_id): Path<i64>,
    Json(payload): Json<CreateItemDto>,
) -> Result<(StatusCode, Json<ForwardItem>), AppError> {
    payload.validate()?;
    let item = state
        .forwarding
        .add_item(request_id, &auth.user_id, payload.into())
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Remove an item from an owned request.
pub async fn remove_item(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((request_id, item_id)): Path<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    let removed = state
        .forwarding
        .remove_item(request_id, &auth.user_id, item_id)
        .await?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!(
            "Request or item not found"
        )))
    }
}

/// Record an attachment reference for an item. Upload happens at the
/// file-storage boundary; this links the stored path.
pub async fn attach_file(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((request_id, item_id)): Path<(i64, i64)>,
    Json(payload): Json<AttachFileDto>,
) -> Result<(StatusCode, Json<Attachment>), AppError> {
    payload.validate()?;
    let attachment = state
        .forwarding
        .attach_file(
            request_id,
            &auth.user_id,
            item_id,
            &payload.file_name,
            &payload.storage_path,
            payload.content_type.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(attachment)))
}
