//! Expense receipt record produced by receipt extractors.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A structured expense receipt.
///
/// Unknown fields are rejected so that a record carrying keys outside this
/// schema stays an [`ExtractedData::Other`](super::ExtractedData::Other)
/// value instead of losing them. Money is carried as JSON numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Receipt {
    /// Name of the store.
    pub store_name: String,

    /// Address of the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_address: Option<String>,

    /// Company/tax registration number of the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_registration_number: Option<String>,

    /// Country code (ISO 3166-1 alpha-2).
    pub country: String,

    /// Language code (ISO 639-1).
    pub language: String,

    /// Time of purchase, serialized as a unix timestamp.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,

    /// Receipt identifier printed on the document.
    pub receipt_number: String,

    /// Purchased items.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ReceiptItem>,

    /// Amount before discount and tax.
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub subtotal: Option<Decimal>,

    /// Discount applied to the whole receipt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<Discount>,

    /// Tax breakdown by rate.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tax: Vec<TaxBreakdown>,

    /// Total amount paid.
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,

    /// Currency code (ISO 4217).
    pub currency: String,

    /// How the receipt was paid.
    pub payment_method: PaymentMethod,

    /// Anything else the extractor found worth keeping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// A single purchased item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReceiptItem {
    /// Item description.
    pub item_name: String,

    /// Quantity purchased.
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,

    /// Total price for this line.
    #[serde(with = "rust_decimal::serde::float")]
    pub item_total_price: Decimal,
}

/// Discount on a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Discount {
    /// Discount amount.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    /// What the discount was for.
    pub description: String,
}

/// Tax amount at one rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaxBreakdown {
    /// Tax rate in percent.
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,

    /// Tax amount.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

/// Payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash.
    Cash,
    /// Debit or credit card.
    Card,
    /// Phone/wallet payment.
    Mobile,
    /// Bank transfer.
    Transfer,
    /// Voucher or gift card.
    Voucher,
    /// Other method with description.
    Other(String),
}

impl PaymentMethod {
    /// Parse payment method from free text.
    pub fn from_str(s: &str) -> Self {
        let s = s.trim().to_lowercase();

        if s.contains("cash") {
            PaymentMethod::Cash
        } else if s.contains("apple pay") || s.contains("google pay") || s.contains("mobile") {
            PaymentMethod::Mobile
        } else if s.contains("card")
            || s.contains("visa")
            || s.contains("mastercard")
            || s.contains("amex")
            || s.contains("debit")
            || s.contains("credit")
        {
            PaymentMethod::Card
        } else if s.contains("transfer") || s.contains("bank") {
            PaymentMethod::Transfer
        } else if s.contains("voucher") || s.contains("gift") {
            PaymentMethod::Voucher
        } else {
            PaymentMethod::Other(s)
        }
    }
}

impl Receipt {
    /// Validate the receipt data and return any issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.store_name.trim().is_empty() {
            issues.push("Missing store name".to_string());
        }

        if self.receipt_number.trim().is_empty() {
            issues.push("Missing receipt number".to_string());
        }

        if self.currency.len() != 3 {
            issues.push(format!("Currency '{}' is not an ISO 4217 code", self.currency));
        }

        if self.total <= Decimal::ZERO {
            issues.push("Total is not positive".to_string());
        }

        let tolerance = Decimal::new(1, 2);

        if let Some(subtotal) = self.subtotal {
            if !self.items.is_empty() {
                let items_sum: Decimal = self.items.iter().map(|i| i.item_total_price).sum();
                if (items_sum - subtotal).abs() > tolerance {
                    issues.push(format!(
                        "Item total ({}) differs from subtotal ({})",
                        items_sum, subtotal
                    ));
                }
            }

            let discount = self
                .discount
                .as_ref()
                .map(|d| d.amount)
                .unwrap_or(Decimal::ZERO);
            let tax: Decimal = self.tax.iter().map(|t| t.amount).sum();
            let expected = subtotal - discount + tax;

            // Prices that already include tax are also accepted.
            if (expected - self.total).abs() > tolerance
                && (subtotal - discount - self.total).abs() > tolerance
            {
                issues.push(format!(
                    "Subtotal, discount and tax ({}) do not add up to total ({})",
                    expected, self.total
                ));
            }
        }

        issues
    }
}
