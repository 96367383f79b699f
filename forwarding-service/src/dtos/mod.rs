//! Request/response DTOs for the HTTP surface.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{
    CreateAddress, CreateItem, CreateRequest, ForwardItem, ForwardRequest, ForwardRequestStatus,
    ForwardRequestView, GatewayOutcome, NewRequiredDocument, Payment, PaymentType,
    RequestStatusHistory, UpdateRequest,
};

#[derive(Debug, Deserialize, Validate, Default)]
pub struct CreateRequestDto {
    #[validate(length(max = 250))]
    pub notes: Option<String>,
    pub shipping_address_id: Option<i64>,
    #[validate(length(max = 100))]
    pub original_carrier: Option<String>,
    #[validate(length(max = 100))]
    pub original_tracking_number: Option<String>,
}

impl CreateRequestDto {
    pub fn into_model(self, user_id: &str) -> CreateRequest {
        CreateRequest {
            user_id: user_id.to_string(),
            notes: self.notes,
            shipping_address_id: self.shipping_address_id,
            original_carrier: self.original_carrier,
            original_tracking_number: self.original_tracking_number,
        }
    }
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateRequestDto {
    #[validate(length(max = 250))]
    pub notes: Option<String>,
    pub shipping_address_id: Option<i64>,
    #[validate(length(max = 100))]
    pub original_carrier: Option<String>,
    #[validate(length(max = 100))]
    pub original_tracking_number: Option<String>,
}

impl From<UpdateRequestDto> for UpdateRequest {
    fn from(dto: UpdateRequestDto) -> Self {
        UpdateRequest {
            notes: dto.notes,
            shipping_address_id: dto.shipping_address_id,
            original_carrier: dto.original_carrier,
            original_tracking_number: dto.original_tracking_number,
        }
    }
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct CreateItemDto {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 500))]
    pub url: Option<String>,
    #[validate(length(max = 150))]
    pub vendor: Option<String>,
    pub declared_weight: Option<Decimal>,
    pub declared_length: Option<Decimal>,
    pub declared_width: Option<Decimal>,
    pub declared_height: Option<Decimal>,
    pub declared_value: Decimal,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

impl From<CreateItemDto> for CreateItem {
    fn from(dto: CreateItemDto) -> Self {
        CreateItem {
            name: dto.name,
            url: dto.url,
            vendor: dto.vendor,
            declared_weight: dto.declared_weight,
            declared_length: dto.declared_length,
            declared_width: dto.declared_width,
            declared_height: dto.declared_height,
            declared_value: dto.declared_value,
            notes: dto.notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusDto {
    pub status: ForwardRequestStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignAddressDto {
    pub address_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SetFinalTotalDto {
    pub final_total: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RequireDocumentDto {
    #[validate(length(min = 1, max = 100))]
    pub document_type: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RequireDocumentsDto {
    #[validate(nested)]
    pub documents: Vec<RequireDocumentDto>,
}

impl RequireDocumentsDto {
    pub fn into_models(self) -> Vec<NewRequiredDocument> {
        self.documents
            .into_iter()
            .map(|d| NewRequiredDocument {
                document_type: d.document_type,
                description: d.description,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitDocumentDto {
    pub attachment_id: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AttachFileDto {
    #[validate(length(min = 1, max = 250))]
    pub file_name: String,
    #[validate(length(min = 1, max = 500))]
    pub storage_path: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutDto {
    pub amount: Decimal,
    pub payment_type: PaymentType,
}

/// Gateway outcome callback body. Events reported against a checkout
/// session carry both references; intent-level events carry only the
/// intent reference as `transaction_ref`.
#[derive(Debug, Deserialize)]
pub struct WebhookEventDto {
    pub transaction_ref: String,
    pub gateway_intent_ref: Option<String>,
    pub outcome: GatewayOutcome,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAddressDto {
    #[validate(length(min = 1, max = 150))]
    pub recipient_name: String,
    #[validate(length(min = 1, max = 250))]
    pub street: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 100))]
    pub country: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
}

impl CreateAddressDto {
    pub fn into_model(self, user_id: &str) -> CreateAddress {
        CreateAddress {
            user_id: user_id.to_string(),
            recipient_name: self.recipient_name,
            street: self.street,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            country: self.country,
            phone: self.phone,
        }
    }
}

/// Detailed request response: the row plus owned collections and the
/// payment projection computed at read time.
#[derive(Debug, Serialize)]
pub struct RequestDetailResponse {
    pub request: ForwardRequest,
    pub items: Vec<ForwardItem>,
    pub payments: Vec<Payment>,
    pub status_history: Vec<RequestStatusHistory>,
    pub total_paid: Decimal,
    pub is_paid_in_full: bool,
}

impl From<ForwardRequestView> for RequestDetailResponse {
    fn from(view: ForwardRequestView) -> Self {
        let total_paid = view.total_paid();
        let is_paid_in_full = view.is_paid_in_full();
        Self {
            request: view.request,
            items: view.items,
            payments: view.payments,
            status_history: view.status_history,
            total_paid,
            is_paid_in_full,
        }
    }
}
