//! Forward item model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One declared package content line.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ForwardItem {
    pub item_id: i64,
    pub forward_request_id: i64,
    pub name: String,
    pub url: Option<String>,
    pub vendor: Option<String>,
    pub declared_weight: Option<Decimal>,
    pub declared_length: Option<Decimal>,
    pub declared_width: Option<Decimal>,
    pub declared_height: Option<Decimal>,
    pub actual_weight: Option<Decimal>,
    pub actual_length: Option<Decimal>,
    pub actual_width: Option<Decimal>,
    pub actual_height: Option<Decimal>,
    pub declared_value: Decimal,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Attachment reference owned by an item (invoice, photo). The bytes live
/// behind the file-storage boundary; only the path is recorded here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attachment {
    pub attachment_id: i64,
    pub forward_item_id: i64,
    pub file_name: String,
    pub storage_path: String,
    pub content_type: Option<String>,
    pub created_utc: DateTime<Utc>,
}

/// Input for adding an item to a request.
#[derive(Debug, Clone, Default)]
pub struct CreateItem {
    pub name: String,
    pub url: Option<String>,
    pub vendor: Option<String>,
    pub declared_weight: Option<Decimal>,
    pub declared_length: Option<Decimal>,
    pub declared_width: Option<Decimal>,
    pub declared_height: Option<Decimal>,
    pub declared_value: Decimal,
    pub notes: Option<String>,
}

impl CreateItem {
    /// Sanitize before persistence: trim and length-cap strings, clamp
    /// numeric fields to >= 0. Sanitization lives here rather than in the
    /// database layer.
    pub fn sanitized(mut self) -> Self {
        self.name = trim_cap(&self.name, 200);
        self.url = self.url.as_deref().map(|s| trim_cap(s, 500)).filter(|s| !s.is_empty());
        self.vendor = self
            .vendor
            .as_deref()
            .map(|s| trim_cap(s, 150))
            .filter(|s| !s.is_empty());
        self.notes = self
            .notes
            .as_deref()
            .map(|s| trim_cap(s, 500))
            .filter(|s| !s.is_empty());
        self.declared_weight = clamp_non_negative(self.declared_weight);
        self.declared_length = clamp_non_negative(self.declared_length);
        self.declared_width = clamp_non_negative(self.declared_width);
        self.declared_height = clamp_non_negative(self.declared_height);
        if self.declared_value < Decimal::ZERO {
            self.declared_value = Decimal::ZERO;
        }
        self
    }
}

fn trim_cap(s: &str, max: usize) -> String {
    let trimmed = s.trim();
    trimmed.chars().take(max).collect()
}

fn clamp_non_negative(value: Option<Decimal>) -> Option<Decimal> {
    value.map(|v| if v < Decimal::ZERO { Decimal::ZERO } else { v })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn sanitized_clamps_negative_dimensions_to_zero() {
        let item = CreateItem {
            name: "  Headphones  ".to_string(),
            declared_weight: Some(Decimal::from_str("-1.5").unwrap()),
            declared_value: Decimal::from_str("-10").unwrap(),
            ..Default::default()
        }
        .sanitized();

        assert_eq!(item.name, "Headphones");
        assert_eq!(item.declared_weight, Some(Decimal::ZERO));
        assert_eq!(item.declared_value, Decimal::ZERO);
    }

    #[test]
    fn sanitized_caps_string_lengths() {
        let item = CreateItem {
            name: "x".repeat(500),
            url: Some("y".repeat(1000)),
            declared_value: Decimal::ONE,
            ..Default::default()
        }
        .sanitized();

        assert_eq!(item.name.len(), 200);
        assert_eq!(item.url.unwrap().len(), 500);
    }

    #[test]
    fn sanitized_drops_blank_optional_strings() {
        let item = CreateItem {
            name: "Book".to_string(),
            vendor: Some("   ".to_string()),
            declared_value: Decimal::ONE,
            ..Default::default()
        }
        .sanitized();

        assert!(item.vendor.is_none());
    }
}
