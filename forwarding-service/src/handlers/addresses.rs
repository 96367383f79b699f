//! Address handlers.

use axum::{extract::State, http::StatusCode, Json};
use fastybox_core::error::AppError;
use validator::Validate;

use crate::dtos::CreateAddressDto;
use crate::middleware::AuthContext;
use crate::models::Address;
use crate::startup::AppState;

/// Create an address owned by the caller.
pub async fn create_address(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(payload): Json<CreateAddressDto>,
) -> Result<(StatusCode, Json<Address>), AppError> {
    payload.validate()?;
    let address = state
        .storage
        .insert_address(&payload.into_model(&auth.user_id))
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// List the caller's addresses.
pub async fn list_addresses(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<Vec<Address>>, AppError> {
    let addresses = state.storage.list_user_addresses(&auth.user_id).await?;
    Ok(Json(addresses))
}
