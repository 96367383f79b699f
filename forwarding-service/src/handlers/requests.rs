//! Forward request handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use fastybox_core::error::AppError;
use serde::Deserialize;
use validator::Validate;

use crate::dtos::{
    AssignAddressDto, CreateRequestDto, RequestDetailResponse, RequireDocumentsDto,
    SetFinalTotalDto, SubmitDocumentDto, UpdateRequestDto, UpdateStatusDto,
};
use crate::middleware::AuthContext;
use crate::models::{ForwardRequest, ForwardRequestStatus, ListRequestsFilter, RequiredDocument};
use crate::startup::AppState;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub status: Option<ForwardRequestStatus>,
}

/// Create a new forward request in draft.
pub async fn create_request(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<CreateRequestDto>,
) -> Result<(StatusCode, Json<ForwardRequest>), AppError> {
    payload.validate()?;
    let request = state
        .forwarding
        .create_request(payload.into_model(&auth.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// List the caller's requests.
pub async fn list_requests(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<ForwardRequest>>, AppError> {
    let requests = state
        .forwarding
        .list_user_requests(
            &auth.user_id,
            query.page.unwrap_or(1),
            query.page_size.unwrap_or(10),
        )
        .await?;
    Ok(Json(requests))
}

/// List every request, optionally filtered by status. Administrators only.
pub async fn list_all_requests(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<ForwardRequest>>, AppError> {
    auth.require_admin()?;
    let requests = state
        .forwarding
        .list_all_requests(ListRequestsFilter {
            status: query.status,
            page: query.page.unwrap_or(1),
            page_size: query.page_size.unwrap_or(10),
        })
        .await?;
    Ok(Json(requests))
}

/// Fetch one request with items, payments, and history.
pub async fn get_request(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(request_id): Path<i64>,
) -> Result<Json<RequestDetailResponse>, AppError> {
    let view = state
        .forwarding
        .get_request(request_id, &auth.user_id, auth.is_admin)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Request not found")))?;
    Ok(Json(RequestDetailResponse::from(view)))
}

/// Update the owner-editable fields of a request.
pub async fn update_request(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(request_id): Path<i64>,
    Json(payload): Json<UpdateRequestDto>,
) -> Result<Json<ForwardRequest>, AppError> {
    payload.validate()?;
    let request = state
        .forwarding
        .update_request(request_id, &auth.user_id, payload.into())
        .await?;
    Ok(Json(request))
}

/// Delete a request (owner or administrator).
pub async fn delete_request(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(request_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let deleted = state
        .forwarding
        .delete_request(request_id, &auth.user_id, auth.is_admin)
        .await?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Request not found")))
    }
}

/// Set the request status. Administrators only; transitions are not
/// restricted beyond that.
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(request_id): Path<i64>,
    Json(payload): Json<UpdateStatusDto>,
) -> Result<StatusCode, AppError> {
    auth.require_admin()?;
    let updated = state
        .forwarding
        .update_status(request_id, payload.status, payload.notes, &auth.user_id)
        .await?;
    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Request not found")))
    }
}

/// Assign one of the caller's addresses as the shipping destination.
pub async fn assign_address(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(request_id): Path<i64>,
    Json(payload): Json<AssignAddressDto>,
) -> Result<StatusCode, AppError> {
    let assigned = state
        .forwarding
        .assign_shipping_address(request_id, &auth.user_id, payload.address_id)
        .await?;
    if assigned {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!(
            "Request or address not found"
        )))
    }
}

/// Record the documents required from the customer. Administrators only.
pub async fn require_documents(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(request_id): Path<i64>,
    Json(payload): Json<RequireDocumentsDto>,
) -> Result<StatusCode, AppError> {
    auth.require_admin()?;
    payload.validate()?;
    let updated = state
        .forwarding
        .require_documents(request_id, payload.into_models(), &auth.user_id)
        .await?;
    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Request not found")))
    }
}

/// List the documents requested for a request.
pub async fn list_documents(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(request_id): Path<i64>,
) -> Result<Json<Vec<RequiredDocument>>, AppError> {
    let docs = state
        .forwarding
        .list_required_documents(request_id, &auth.user_id, auth.is_admin)
        .await?;
    Ok(Json(docs))
}

/// Mark a requested document as submitted.
pub async fn submit_document(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((request_id, document_id)): Path<(i64, i64)>,
    Json(payload): Json<SubmitDocumentDto>,
) -> Result<StatusCode, AppError> {
    let updated = state
        .forwarding
        .submit_document(request_id, &auth.user_id, document_id, payload.attachment_id)
        .await?;
    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!(
            "Request or document not found"
        )))
    }
}

/// Set the authoritative amount owed after staff review. Administrators only.
pub async fn set_final_total(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(request_id): Path<i64>,
    Json(payload): Json<SetFinalTotalDto>,
) -> Result<StatusCode, AppError> {
    auth.require_admin()?;
    let updated = state
        .forwarding
        .set_final_total(request_id, payload.final_total, &auth.user_id)
        .await?;
    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Request not found")))
    }
}
