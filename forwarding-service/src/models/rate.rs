//! Shipping and customs rate tables.
//!
//! Read-mostly reference data; the service never writes rates.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Weight band with an associated shipping rate. Weights in kilograms,
/// bounds inclusive.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShippingRate {
    pub rate_id: i64,
    pub name: String,
    pub min_weight: Decimal,
    pub max_weight: Decimal,
    pub base_rate: Decimal,
    pub additional_per_kg: Decimal,
    pub is_active: bool,
}

/// Customs rate for a declared-value category.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomsRate {
    pub rate_id: i64,
    pub name: String,
    pub category: String,
    pub rate_percentage: Decimal,
    pub minimum_fee: Decimal,
    pub is_active: bool,
}

/// Category used when an item declares none.
pub const GENERAL_CATEGORY: &str = "General";

/// Fallback shipping band used when no rates are configured at all.
pub fn default_shipping_rate() -> ShippingRate {
    ShippingRate {
        rate_id: 0,
        name: "Default".to_string(),
        min_weight: Decimal::ZERO,
        max_weight: Decimal::new(100, 0),
        base_rate: Decimal::new(3999, 2),
        additional_per_kg: Decimal::new(250, 2),
        is_active: true,
    }
}

/// Fallback base rate for items with no declared weight when the rate table
/// is empty.
pub fn default_minimum_base_rate() -> Decimal {
    Decimal::new(1599, 2)
}

/// Fallback customs rate (16%, $5 minimum) used when no rates are configured.
pub fn default_customs_rate() -> CustomsRate {
    CustomsRate {
        rate_id: 0,
        name: "Default".to_string(),
        category: GENERAL_CATEGORY.to_string(),
        rate_percentage: Decimal::new(16, 2),
        minimum_fee: Decimal::new(500, 2),
        is_active: true,
    }
}

/// Shipping bands seeded on first run.
pub fn seed_shipping_rates() -> Vec<ShippingRate> {
    vec![
        ShippingRate {
            rate_id: 1,
            name: "Light".to_string(),
            min_weight: Decimal::ZERO,
            max_weight: Decimal::new(2, 0),
            base_rate: Decimal::new(1599, 2),
            additional_per_kg: Decimal::ZERO,
            is_active: true,
        },
        ShippingRate {
            rate_id: 2,
            name: "Medium".to_string(),
            min_weight: Decimal::new(201, 2),
            max_weight: Decimal::new(5, 0),
            base_rate: Decimal::new(2599, 2),
            additional_per_kg: Decimal::new(250, 2),
            is_active: true,
        },
        ShippingRate {
            rate_id: 3,
            name: "Heavy".to_string(),
            min_weight: Decimal::new(501, 2),
            max_weight: Decimal::new(10, 0),
            base_rate: Decimal::new(3999, 2),
            additional_per_kg: Decimal::new(375, 2),
            is_active: true,
        },
        ShippingRate {
            rate_id: 4,
            name: "Extra heavy".to_string(),
            min_weight: Decimal::new(1001, 2),
            max_weight: Decimal::new(50, 0),
            base_rate: Decimal::new(5999, 2),
            additional_per_kg: Decimal::new(500, 2),
            is_active: true,
        },
    ]
}

/// Customs categories seeded on first run.
pub fn seed_customs_rates() -> Vec<CustomsRate> {
    vec![
        CustomsRate {
            rate_id: 1,
            name: "Standard".to_string(),
            category: GENERAL_CATEGORY.to_string(),
            rate_percentage: Decimal::new(16, 2),
            minimum_fee: Decimal::new(500, 2),
            is_active: true,
        },
        CustomsRate {
            rate_id: 2,
            name: "Medication".to_string(),
            category: "Salud".to_string(),
            rate_percentage: Decimal::new(8, 2),
            minimum_fee: Decimal::new(250, 2),
            is_active: true,
        },
        CustomsRate {
            rate_id: 3,
            name: "Electronics".to_string(),
            category: "Tecnologia".to_string(),
            rate_percentage: Decimal::new(19, 2),
            minimum_fee: Decimal::new(1000, 2),
            is_active: true,
        },
    ]
}
