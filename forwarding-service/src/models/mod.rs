//! Domain models for forwarding-service.

mod address;
mod document;
mod item;
mod payment;
mod rate;
mod request;

pub use address::{Address, CreateAddress};
pub use document::{NewRequiredDocument, RequiredDocument};
pub use item::{Attachment, CreateItem, ForwardItem};
pub use payment::{CreatePayment, GatewayOutcome, Payment, PaymentStatus, PaymentType};
pub use rate::{
    default_customs_rate, default_minimum_base_rate, default_shipping_rate, seed_customs_rates,
    seed_shipping_rates, CustomsRate, ShippingRate, GENERAL_CATEGORY,
};
pub use request::{
    CreateRequest, ForwardRequest, ForwardRequestStatus, ForwardRequestView, ListRequestsFilter,
    NewStatusEntry, RequestStatusHistory, UpdateRequest, SYSTEM_ACTOR,
};
