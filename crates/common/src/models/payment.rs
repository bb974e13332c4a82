//! Payment records

use crate::db::collections;
use crate::errors::{AppError, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Stored lowercase; accepted in any casing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    #[default]
    Rent,
    Deposit,
    Other,
}

impl<'de> Deserialize<'de> for PaymentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PaymentType::parse(&raw)
            .ok_or_else(|| serde::de::Error::unknown_variant(&raw, &["rent", "deposit", "security deposit", "other"]))
    }
}

impl PaymentType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "rent" => Some(PaymentType::Rent),
            "deposit" | "security deposit" => Some(PaymentType::Deposit),
            "other" => Some(PaymentType::Other),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentType::Rent => "Rent",
            PaymentType::Deposit => "Security Deposit",
            PaymentType::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub tenant_id: String,
    pub property_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_name: Option<String>,
    pub amount: f64,
    #[serde(rename = "type", default)]
    pub payment_type: PaymentType,
    pub date: NaiveDate,
    /// "Month Year" labels the payment covers
    #[serde(default)]
    pub months: Vec<String>,
    pub receipt_number: u64,
    /// Tenant balance immediately after this payment was applied
    pub balance_after_payment: f64,
    #[serde(default)]
    pub tenant_name: String,
    #[serde(default)]
    pub property_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub const COLLECTION: &'static str = collections::PAYMENTS;

    /// Whether the payment date falls in the given calendar month
    pub fn is_in_month(&self, year: i32, month: u32) -> bool {
        self.date.year() == year && self.date.month() == month
    }
}

/// Ingress payload for recording a payment
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordPayment {
    #[validate(length(min = 1, message = "Please select a tenant."))]
    pub tenant_id: String,

    #[validate(range(exclusive_min = 0.0, message = "Amount must be a positive number."))]
    pub amount: f64,

    #[serde(rename = "type", default)]
    pub payment_type: PaymentType,

    pub date: NaiveDate,

    #[serde(default)]
    pub months: Vec<String>,

    /// Client-chosen key making retries of the same submission safe
    #[validate(length(min = 1, max = 128))]
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl RecordPayment {
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        check_amount(self.amount)?;
        check_months(&self.months)
    }
}

/// Edit payload; absent fields keep their stored values
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdate {
    #[validate(length(min = 1))]
    pub tenant_id: Option<String>,

    #[validate(range(exclusive_min = 0.0, message = "Amount must be a positive number."))]
    pub amount: Option<f64>,

    #[serde(rename = "type")]
    pub payment_type: Option<PaymentType>,

    pub date: Option<NaiveDate>,

    pub months: Option<Vec<String>>,
}

impl PaymentUpdate {
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        if let Some(amount) = self.amount {
            check_amount(amount)?;
        }
        if let Some(months) = &self.months {
            check_months(months)?;
        }
        Ok(())
    }
}

fn check_amount(amount: f64) -> Result<()> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(AppError::validation("amount", "Amount must be a positive number."))
    }
}

fn check_months(months: &[String]) -> Result<()> {
    if months.is_empty() {
        return Err(AppError::validation("months", "Please select at least one month."));
    }
    for label in months {
        if parse_month_label(label).is_none() {
            return Err(AppError::validation(
                "months",
                format!("'{}' is not a month such as 'January 2025'.", label),
            ));
        }
    }
    Ok(())
}

/// Parse a "Month Year" label such as "March 2025"
pub fn parse_month_label(label: &str) -> Option<(i32, u32)> {
    let date = NaiveDate::parse_from_str(&format!("1 {}", label.trim()), "%d %B %Y").ok()?;
    Some((date.year(), date.month()))
}

/// Render a "Month Year" label
pub fn month_label(year: i32, month: u32) -> Option<String> {
    NaiveDate::from_ymd_opt(year, month, 1).map(|d| d.format("%B %Y").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(amount: f64) -> RecordPayment {
        RecordPayment {
            tenant_id: "t1".into(),
            amount,
            payment_type: PaymentType::Rent,
            date: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
            months: vec!["March 2025".into()],
            idempotency_key: None,
        }
    }

    #[test]
    fn test_amount_must_be_positive() {
        assert!(record(200000.0).check().is_ok());
        assert!(record(0.0).check().is_err());
        assert!(record(-5.0).check().is_err());
        assert!(record(f64::INFINITY).check().is_err());
    }

    #[test]
    fn test_month_labels() {
        assert_eq!(parse_month_label("March 2025"), Some((2025, 3)));
        assert_eq!(parse_month_label("  december 2024 "), Some((2024, 12)));
        assert_eq!(parse_month_label("Smarch 2025"), None);
        assert_eq!(month_label(2025, 1).as_deref(), Some("January 2025"));

        let mut bad = record(10.0);
        bad.months = vec!["2025-03".into()];
        assert!(bad.check().is_err());
    }

    #[test]
    fn test_payment_type_accepts_display_casing() {
        let input: RecordPayment = serde_json::from_value(json!({
            "tenantId": "t1",
            "amount": 200000,
            "type": "Rent",
            "date": "2025-03-02"
        }))
        .unwrap();
        assert_eq!(input.payment_type, PaymentType::Rent);
        assert!(input.months.is_empty());

        let deposit: PaymentType = serde_json::from_value(json!("Deposit")).unwrap();
        assert_eq!(deposit, PaymentType::Deposit);
        assert_eq!(serde_json::to_value(deposit).unwrap(), json!("deposit"));

        for raw in ["rEnT", " RENT ", "rent"] {
            let parsed: PaymentType = serde_json::from_value(json!(raw)).unwrap();
            assert_eq!(parsed, PaymentType::Rent);
        }
        let deposit: PaymentType = serde_json::from_value(json!("SECURITY deposit")).unwrap();
        assert_eq!(deposit, PaymentType::Deposit);
        assert!(serde_json::from_value::<PaymentType>(json!("rental")).is_err());
    }

    #[test]
    fn test_at_least_one_month_required() {
        let mut input = record(10.0);
        input.months.clear();
        let err = input.check().unwrap_err();
        assert!(err.to_string().contains("at least one month"));

        let update = PaymentUpdate {
            months: Some(Vec::new()),
            ..PaymentUpdate::default()
        };
        assert!(update.check().is_err());
        assert!(PaymentUpdate::default().check().is_ok());
    }
}
