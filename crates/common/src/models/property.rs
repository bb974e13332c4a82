//! Property records

use super::validate_not_blank;
use crate::db::collections;
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub units: Vec<Unit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Property {
    pub const COLLECTION: &'static str = collections::PROPERTIES;

    pub fn unit_names(&self) -> impl Iterator<Item = &str> {
        self.units.iter().map(|u| u.name.as_str())
    }

    pub fn has_unit(&self, name: &str) -> bool {
        self.unit_names().any(|n| n == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UnitInput {
    #[validate(length(min = 1, max = 100), custom(function = "validate_not_blank"))]
    pub name: String,
}

/// Create/replace payload for a property
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PropertyInput {
    #[validate(
        length(min = 1, max = 200, message = "Property name is required."),
        custom(function = "validate_not_blank")
    )]
    pub name: String,

    #[validate(
        length(min = 1, max = 500, message = "Address is required."),
        custom(function = "validate_not_blank")
    )]
    pub address: String,

    #[validate(length(min = 1, message = "At least one unit is required."))]
    pub units: Vec<UnitInput>,
}

impl PropertyInput {
    /// Run field rules plus per-unit rules and unit-name uniqueness
    pub fn check(&self) -> Result<()> {
        self.validate()?;

        let mut seen = HashSet::new();
        for unit in &self.units {
            unit.validate()?;
            let name = unit.name.trim();
            if !seen.insert(name.to_string()) {
                return Err(AppError::validation(
                    "units",
                    format!("Unit name '{}' is used more than once.", name),
                ));
            }
        }
        Ok(())
    }

    /// Trimmed unit list in input order
    pub fn units(&self) -> Vec<Unit> {
        self.units
            .iter()
            .map(|u| Unit {
                name: u.name.trim().to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(units: &[&str]) -> PropertyInput {
        PropertyInput {
            name: "Acme Apartments".into(),
            address: "Plot 4, Kampala Road".into(),
            units: units.iter().map(|n| UnitInput { name: n.to_string() }).collect(),
        }
    }

    #[test]
    fn test_valid_property() {
        assert!(input(&["A1", "A2"]).check().is_ok());
    }

    #[test]
    fn test_requires_a_unit() {
        let err = input(&[]).check().unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_rejects_duplicate_unit_names() {
        let err = input(&["A1", " A1 "]).check().unwrap_err();
        assert!(err.to_string().contains("A1"));
    }

    #[test]
    fn test_unit_count_rule_reports_value() {
        let errors = input(&[]).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("units"));
    }

    #[test]
    fn test_rejects_blank_unit() {
        assert!(input(&["A1", "   "]).check().is_err());
    }
}
