//! Shipping and customs fee calculation.
//!
//! Pure functions over item attributes and the rate tables; callers persist
//! the returned totals.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{
    default_customs_rate, default_minimum_base_rate, default_shipping_rate, CustomsRate,
    ForwardItem, ShippingRate, GENERAL_CATEGORY,
};

/// Select the active band covering `weight`. Falls back to the active band
/// with the highest `max_weight`, then to the hard-coded default band.
pub fn applicable_shipping_rate(weight: Decimal, rates: &[ShippingRate]) -> ShippingRate {
    if let Some(rate) = rates
        .iter()
        .find(|r| r.is_active && weight >= r.min_weight && weight <= r.max_weight)
    {
        return rate.clone();
    }

    rates
        .iter()
        .filter(|r| r.is_active)
        .max_by_key(|r| r.max_weight)
        .cloned()
        .unwrap_or_else(default_shipping_rate)
}

/// Select the active customs rate for `category`, falling back to the active
/// "General" rate, then to the hard-coded default.
pub fn applicable_customs_rate(category: &str, rates: &[CustomsRate]) -> CustomsRate {
    if let Some(rate) = rates.iter().find(|r| r.is_active && r.category == category) {
        return rate.clone();
    }

    rates
        .iter()
        .find(|r| r.is_active && r.category == GENERAL_CATEGORY)
        .cloned()
        .unwrap_or_else(default_customs_rate)
}

/// Shipping cost for one item.
///
/// An item with no declared weight is estimated at the minimum active base
/// rate; the band rate otherwise: `base_rate + max(0, w - min_weight) * additional_per_kg`.
pub fn shipping_cost(item: &ForwardItem, rates: &[ShippingRate]) -> Decimal {
    let weight = match item.declared_weight {
        Some(w) => w,
        None => {
            return rates
                .iter()
                .filter(|r| r.is_active)
                .map(|r| r.base_rate)
                .min()
                .unwrap_or_else(default_minimum_base_rate);
        }
    };

    let rate = applicable_shipping_rate(weight, rates);
    let additional_weight = (weight - rate.min_weight).max(Decimal::ZERO);
    rate.base_rate + additional_weight * rate.additional_per_kg
}

/// Customs fee for one item: `max(declared_value * rate, minimum_fee)` for
/// the "General" category.
pub fn customs_fee(item: &ForwardItem, rates: &[CustomsRate]) -> Decimal {
    customs_fee_for_category(item, rates, GENERAL_CATEGORY)
}

/// Customs fee for one item in an explicit category.
pub fn customs_fee_for_category(
    item: &ForwardItem,
    rates: &[CustomsRate],
    category: &str,
) -> Decimal {
    let rate = applicable_customs_rate(category, rates);
    let fee = item.declared_value * rate.rate_percentage;
    fee.max(rate.minimum_fee)
}

/// Estimated total for a set of items: shipping plus customs per item,
/// summed exactly, rounded once at the aggregate to two decimal places
/// (half away from zero). An empty set yields zero.
pub fn estimated_total(
    items: &[ForwardItem],
    shipping_rates: &[ShippingRate],
    customs_rates: &[CustomsRate],
) -> Decimal {
    let total: Decimal = items
        .iter()
        .map(|item| shipping_cost(item, shipping_rates) + customs_fee(item, customs_rates))
        .sum();

    total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{seed_customs_rates, seed_shipping_rates};
    use chrono::Utc;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn item(weight: Option<&str>, value: &str) -> ForwardItem {
        ForwardItem {
            item_id: 0,
            forward_request_id: 0,
            name: "test item".to_string(),
            url: None,
            vendor: None,
            declared_weight: weight.map(dec),
            declared_length: None,
            declared_width: None,
            declared_height: None,
            actual_weight: None,
            actual_length: None,
            actual_width: None,
            actual_height: None,
            declared_value: dec(value),
            notes: None,
            created_utc: Utc::now(),
        }
    }

    fn band(id: i64, min: &str, max: &str, base: &str, per_kg: &str, active: bool) -> ShippingRate {
        ShippingRate {
            rate_id: id,
            name: format!("band-{}", id),
            min_weight: dec(min),
            max_weight: dec(max),
            base_rate: dec(base),
            additional_per_kg: dec(per_kg),
            is_active: active,
        }
    }

    fn customs(category: &str, pct: &str, min_fee: &str, active: bool) -> CustomsRate {
        CustomsRate {
            rate_id: 0,
            name: category.to_string(),
            category: category.to_string(),
            rate_percentage: dec(pct),
            minimum_fee: dec(min_fee),
            is_active: active,
        }
    }

    #[test]
    fn cost_at_band_min_weight_equals_base_rate() {
        let rates = seed_shipping_rates();
        // Each band's min weight pays exactly its base rate.
        assert_eq!(shipping_cost(&item(Some("2.01"), "1"), &rates), dec("25.99"));
        assert_eq!(shipping_cost(&item(Some("5.01"), "1"), &rates), dec("39.99"));
    }

    #[test]
    fn cost_is_non_decreasing_within_a_band() {
        let rates = seed_shipping_rates();
        let mut previous = Decimal::ZERO;
        for w in ["2.01", "3", "4", "5"] {
            let cost = shipping_cost(&item(Some(w), "1"), &rates);
            assert!(cost >= previous);
            previous = cost;
        }
    }

    #[test]
    fn missing_weight_falls_back_to_minimum_active_base_rate() {
        let rates = vec![
            band(1, "0", "2", "20.00", "0", true),
            band(2, "2.01", "5", "12.50", "1", true),
            band(3, "5.01", "10", "9.99", "1", false),
        ];
        // Inactive bands are ignored when picking the minimum.
        assert_eq!(shipping_cost(&item(None, "1"), &rates), dec("12.50"));
    }

    #[test]
    fn missing_weight_with_empty_table_uses_default_minimum() {
        assert_eq!(shipping_cost(&item(None, "1"), &[]), dec("15.99"));
    }

    #[test]
    fn unmatched_weight_falls_back_to_highest_band() {
        let rates = seed_shipping_rates();
        // 75kg exceeds every band; the extra-heavy band applies.
        let cost = shipping_cost(&item(Some("75"), "1"), &rates);
        assert_eq!(cost, dec("59.99") + (dec("75") - dec("10.01")) * dec("5.00"));
    }

    #[test]
    fn no_active_bands_uses_hardcoded_default() {
        let rates = vec![band(1, "0", "2", "15.99", "0", false)];
        let cost = shipping_cost(&item(Some("4"), "1"), &rates);
        assert_eq!(cost, dec("39.99") + dec("4") * dec("2.50"));
    }

    #[test]
    fn customs_fee_respects_minimum() {
        let rates = seed_customs_rates();
        // 16% of $10 is $1.60, below the $5 floor.
        assert_eq!(customs_fee(&item(None, "10"), &rates), dec("5.00"));
        // 16% of $100 is above the floor.
        assert_eq!(customs_fee(&item(None, "100"), &rates), dec("16.00"));
    }

    #[test]
    fn customs_fee_unknown_category_falls_back_to_general() {
        let rates = seed_customs_rates();
        let fee = customs_fee_for_category(&item(None, "100"), &rates, "Juguetes");
        assert_eq!(fee, dec("16.00"));
    }

    #[test]
    fn customs_fee_empty_table_uses_default() {
        assert_eq!(customs_fee(&item(None, "100"), &[]), dec("16.00"));
        assert_eq!(customs_fee(&item(None, "1"), &[]), dec("5.00"));
    }

    #[test]
    fn estimated_total_of_empty_request_is_zero() {
        assert_eq!(
            estimated_total(&[], &seed_shipping_rates(), &seed_customs_rates()),
            Decimal::ZERO
        );
    }

    #[test]
    fn estimated_total_rounds_once_at_the_aggregate() {
        // Each item costs exactly 1.005 (shipping 1.00 + customs floor 0.005).
        // Per-item rounding would give 1.01 * 3 = 3.03; a single aggregate
        // rounding of 3.015 gives 3.02 (half away from zero).
        let shipping = vec![band(1, "0", "100", "1.00", "0", true)];
        let customs = vec![customs("General", "0", "0.005", true)];
        let items = vec![
            item(Some("1"), "0"),
            item(Some("1"), "0"),
            item(Some("1"), "0"),
        ];
        assert_eq!(estimated_total(&items, &shipping, &customs), dec("3.02"));
    }

    #[test]
    fn estimated_total_single_item_scenario() {
        // 1.5kg item valued at $50 with the seeded tables: shipping lands in
        // the 0-2kg band at $15.99, customs is max($8.00, $5.00).
        let items = vec![item(Some("1.5"), "50")];
        let total = estimated_total(&items, &seed_shipping_rates(), &seed_customs_rates());
        assert_eq!(total, dec("23.99"));
    }
}
