//! Tenant records

use super::{validate_not_blank, validate_phone};
use crate::db::collections;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_day: Option<u8>,
    pub property_id: String,
    pub unit_name: String,
    /// Snapshot of the property name when the tenant was created
    #[serde(default)]
    pub property_name: String,
    /// Positive means the tenant owes money
    #[serde(default)]
    pub balance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Tenant {
    pub const COLLECTION: &'static str = collections::TENANTS;

    pub fn is_overdue(&self) -> bool {
        self.balance > 0.0
    }
}

/// Create payload for a tenant. The property name is resolved server-side.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewTenant {
    #[validate(
        length(min = 1, max = 200, message = "Tenant name is required."),
        custom(function = "validate_not_blank")
    )]
    pub name: String,

    #[validate(custom(function = "validate_phone"))]
    pub phone: String,

    #[validate(email)]
    #[serde(default)]
    pub email: Option<String>,

    #[validate(range(min = 1, max = 31))]
    pub due_day: u8,

    #[validate(length(min = 1, message = "Property selection is required."))]
    pub property_id: String,

    #[validate(length(min = 1, message = "Unit selection is required."))]
    pub unit_name: String,
}

/// Partial update of a tenant. Giving `propertyId` and/or `unitName` moves
/// the tenant; a blank `email` clears it.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TenantUpdate {
    #[validate(length(min = 1, max = 200), custom(function = "validate_not_blank"))]
    pub name: Option<String>,

    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(range(min = 1, max = 31))]
    pub due_day: Option<u8>,

    #[validate(length(min = 1, message = "Property selection is required."))]
    pub property_id: Option<String>,

    #[validate(length(min = 1, message = "Unit selection is required."))]
    pub unit_name: Option<String>,
}

impl TenantUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.due_day.is_none()
            && self.property_id.is_none()
            && self.unit_name.is_none()
    }

    pub fn moves(&self) -> bool {
        self.property_id.is_some() || self.unit_name.is_some()
    }
}

/// Form clients send `""` for "no email"
pub(crate) fn blank_email_as_none(email: Option<String>) -> Option<String> {
    email.filter(|e| !e.trim().is_empty()).map(|e| e.trim().to_string())
}
