//! Monthly payment reports and dashboard statistics

use crate::auth::Caller;
use crate::db::{DocumentStore, Query};
use crate::errors::{AppError, Result};
use crate::models::{month_label, Payment, PaymentType, Property, Tenant};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;

/// Number of months in the dashboard revenue series
pub const REVENUE_MONTHS: u32 = 6;

/// Number of payments shown as recent activity
pub const RECENT_PAYMENTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeTotal {
    pub payment_type: PaymentType,
    pub count: usize,
    pub total: f64,
}

/// Payments dated within one calendar month
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    pub year: i32,
    pub month: u32,
    pub label: String,
    pub payments: Vec<Payment>,
    /// Only types that occur, in rent/deposit/other order
    pub by_type: Vec<TypeTotal>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VacantUnit {
    pub property_id: String,
    pub property_name: String,
    pub unit_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRevenue {
    pub year: i32,
    pub month: u32,
    pub label: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_revenue: f64,
    /// Percentage of units with a tenant
    pub occupancy_rate: f64,
    /// Sum of positive tenant balances
    pub overdue_balances: f64,
    pub recent_payments: Vec<Payment>,
    pub overdue_tenants: Vec<Tenant>,
    pub vacant_units: Vec<VacantUnit>,
    /// Oldest month first, ending with the current month
    pub revenue_by_month: Vec<MonthRevenue>,
}

pub async fn monthly_report(store: &dyn DocumentStore, caller: &Caller, year: i32, month: u32) -> Result<MonthlyReport> {
    let label = month_label(year, month).ok_or_else(|| AppError::validation("month", "Month must be between 1 and 12."))?;

    let mut payments: Vec<Payment> = user_records::<Payment>(store, caller, Payment::COLLECTION)
        .await?
        .into_iter()
        .filter(|p| p.is_in_month(year, month))
        .collect();
    payments.sort_by(|a, b| a.date.cmp(&b.date).then(a.receipt_number.cmp(&b.receipt_number)));

    let by_type: Vec<TypeTotal> = [PaymentType::Rent, PaymentType::Deposit, PaymentType::Other]
        .into_iter()
        .filter_map(|payment_type| {
            let matching: Vec<&Payment> = payments.iter().filter(|p| p.payment_type == payment_type).collect();
            (!matching.is_empty()).then(|| TypeTotal {
                payment_type,
                count: matching.len(),
                total: matching.iter().map(|p| p.amount).sum(),
            })
        })
        .collect();
    let total = payments.iter().map(|p| p.amount).sum();

    Ok(MonthlyReport {
        year,
        month,
        label,
        payments,
        by_type,
        total,
    })
}

/// Portfolio statistics as of `today`
pub async fn dashboard(store: &dyn DocumentStore, caller: &Caller, today: NaiveDate) -> Result<Dashboard> {
    let properties: Vec<Property> = user_records(store, caller, Property::COLLECTION).await?;
    let tenants: Vec<Tenant> = user_records(store, caller, Tenant::COLLECTION).await?;
    let mut payments: Vec<Payment> = user_records(store, caller, Payment::COLLECTION).await?;

    let total_revenue = payments.iter().map(|p| p.amount).sum();

    let occupied: HashSet<(&str, &str)> = tenants
        .iter()
        .map(|t| (t.property_id.as_str(), t.unit_name.as_str()))
        .collect();

    let mut total_units = 0usize;
    let mut occupied_units = 0usize;
    let mut vacant_units = Vec::new();
    for property in &properties {
        for unit in property.unit_names() {
            total_units += 1;
            if occupied.contains(&(property.id.as_str(), unit)) {
                occupied_units += 1;
            } else {
                vacant_units.push(VacantUnit {
                    property_id: property.id.clone(),
                    property_name: property.name.clone(),
                    unit_name: unit.to_string(),
                });
            }
        }
    }
    let occupancy_rate = if total_units > 0 {
        occupied_units as f64 / total_units as f64 * 100.0
    } else {
        0.0
    };

    let overdue_tenants: Vec<Tenant> = tenants.into_iter().filter(Tenant::is_overdue).collect();
    let overdue_balances = overdue_tenants.iter().map(|t| t.balance).sum();

    let revenue_by_month = revenue_series(&payments, today);

    payments.sort_by(|a, b| b.date.cmp(&a.date).then(b.receipt_number.cmp(&a.receipt_number)));
    payments.truncate(RECENT_PAYMENTS);

    Ok(Dashboard {
        total_revenue,
        occupancy_rate,
        overdue_balances,
        recent_payments: payments,
        overdue_tenants,
        vacant_units,
        revenue_by_month,
    })
}

/// Revenue for the last `REVENUE_MONTHS` calendar months including the
/// month of `today`
fn revenue_series(payments: &[Payment], today: NaiveDate) -> Vec<MonthRevenue> {
    let current = today.year() * 12 + today.month0() as i32;

    (0..REVENUE_MONTHS as i32)
        .rev()
        .map(|back| {
            let index = current - back;
            let (year, month) = (index.div_euclid(12), index.rem_euclid(12) as u32 + 1);
            MonthRevenue {
                year,
                month,
                label: month_label(year, month).unwrap_or_default(),
                revenue: payments
                    .iter()
                    .filter(|p| p.is_in_month(year, month))
                    .map(|p| p.amount)
                    .sum(),
            }
        })
        .collect()
}

async fn user_records<T: serde::de::DeserializeOwned>(
    store: &dyn DocumentStore,
    caller: &Caller,
    collection: &str,
) -> Result<Vec<T>> {
    store
        .query(collection, &Query::new().where_eq("userId", caller.user_id.as_str()))
        .await?
        .iter()
        .map(|doc| doc.decode())
        .collect()
}
