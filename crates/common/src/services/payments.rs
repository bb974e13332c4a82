//! Payment recording and editing
//!
//! A payment is one inserted document plus one atomic increment of the
//! tenant's balance. The two writes are not transactional: if the increment
//! fails after the insert, the caller gets `PartialFailure` naming the
//! payment that was written.

use super::{fetch_owned, properties::get_property, tenants::get_tenant};
use crate::auth::{scoped_idempotency_key, Caller};
use crate::db::{to_fields, Direction, DocumentStore, Query};
use crate::errors::{AppError, Result};
use crate::models::{Payment, PaymentUpdate, RecordPayment, Tenant};
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};

/// Optional filters for listing payments
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFilter {
    pub tenant_id: Option<String>,
    pub property_id: Option<String>,
}

/// Record a payment against a tenant and decrement the tenant's balance
pub async fn record_payment(store: &dyn DocumentStore, caller: &Caller, input: RecordPayment) -> Result<Payment> {
    input.check()?;

    let scoped_key = input
        .idempotency_key
        .as_deref()
        .map(|key| scoped_idempotency_key(&caller.user_id, key));

    if let Some(key) = &scoped_key {
        if let Some(existing) = find_by_idempotency_key(store, caller, key).await? {
            info!(
                payment_id = %existing.id,
                receipt_number = existing.receipt_number,
                "Payment already recorded for idempotency key"
            );
            return Ok(existing);
        }
    }

    let tenant = get_tenant(store, caller, &input.tenant_id).await?;
    let property = get_property(store, caller, &tenant.property_id).await?;
    let receipt_number = next_receipt_number(store, caller).await?;

    let now = Utc::now();
    let mut payment = Payment {
        id: String::new(),
        user_id: caller.user_id.clone(),
        tenant_id: tenant.id.clone(),
        property_id: property.id.clone(),
        unit_name: Some(tenant.unit_name.clone()),
        amount: input.amount,
        payment_type: input.payment_type,
        date: input.date,
        months: input.months.iter().map(|m| m.trim().to_string()).collect(),
        receipt_number,
        balance_after_payment: tenant.balance - input.amount,
        tenant_name: tenant.name.clone(),
        property_name: property.name.clone(),
        idempotency_key: scoped_key,
        created_at: now,
        updated_at: None,
    };

    payment.id = store.insert(Payment::COLLECTION, to_fields(&payment)?).await?;

    if let Err(e) = store
        .increment(Tenant::COLLECTION, &tenant.id, "balance", -input.amount)
        .await
    {
        crate::metrics::record_partial_failure("record_payment");
        error!(
            payment_id = %payment.id,
            tenant_id = %tenant.id,
            amount = input.amount,
            error = %e,
            "Payment written but tenant balance was not adjusted"
        );
        return Err(AppError::PartialFailure {
            operation: "record_payment".to_string(),
            completed: format!("payment {} written", payment.id),
            detail: format!("balance of tenant {} not adjusted: {}", tenant.id, e),
        });
    }

    crate::metrics::record_payment(payment.amount, payment.payment_type.label());
    info!(
        request_id = %caller.request_id,
        payment_id = %payment.id,
        tenant_id = %tenant.id,
        receipt_number = payment.receipt_number,
        amount = payment.amount,
        balance_after = payment.balance_after_payment,
        "Payment recorded"
    );

    Ok(payment)
}

/// Edit a payment and reconcile the balances it affected.
///
/// Same tenant: the balance moves by `old - new`. Reassigned tenant: the
/// previous tenant gets the old amount back and the new tenant is charged
/// the new amount. Receipt number and `balanceAfterPayment` keep their
/// original values.
pub async fn update_payment(
    store: &dyn DocumentStore,
    caller: &Caller,
    payment_id: &str,
    input: PaymentUpdate,
) -> Result<Payment> {
    input.check()?;

    let previous = get_payment(store, caller, payment_id).await?;
    let mut payment = previous.clone();

    let reassigned = input
        .tenant_id
        .as_deref()
        .is_some_and(|tenant_id| tenant_id != previous.tenant_id);

    if reassigned {
        let tenant_id = input.tenant_id.as_deref().unwrap_or_default();
        let tenant = get_tenant(store, caller, tenant_id).await?;
        let property = get_property(store, caller, &tenant.property_id).await?;
        payment.tenant_id = tenant.id;
        payment.tenant_name = tenant.name;
        payment.unit_name = Some(tenant.unit_name);
        payment.property_id = property.id;
        payment.property_name = property.name;
    }

    if let Some(amount) = input.amount {
        payment.amount = amount;
    }
    if let Some(payment_type) = input.payment_type {
        payment.payment_type = payment_type;
    }
    if let Some(date) = input.date {
        payment.date = date;
    }
    if let Some(months) = input.months {
        payment.months = months.iter().map(|m| m.trim().to_string()).collect();
    }
    payment.updated_at = Some(Utc::now());

    store
        .update(Payment::COLLECTION, &payment.id, to_fields(&payment)?)
        .await?;

    let adjustments: Vec<(&str, f64)> = if reassigned {
        vec![
            (previous.tenant_id.as_str(), previous.amount),
            (payment.tenant_id.as_str(), -payment.amount),
        ]
    } else if previous.amount != payment.amount {
        vec![(payment.tenant_id.as_str(), previous.amount - payment.amount)]
    } else {
        Vec::new()
    };

    let mut applied = Vec::new();
    for (tenant_id, delta) in adjustments {
        if let Err(e) = store.increment(Tenant::COLLECTION, tenant_id, "balance", delta).await {
            crate::metrics::record_partial_failure("update_payment");
            error!(
                payment_id = %payment.id,
                tenant_id = tenant_id,
                delta = delta,
                error = %e,
                "Payment edited but balance reconciliation failed"
            );

            let mut completed = vec![format!("payment {} updated", payment.id)];
            completed.extend(applied);
            return Err(AppError::PartialFailure {
                operation: "update_payment".to_string(),
                completed: completed.join(", "),
                detail: format!("balance of tenant {} not adjusted by {}: {}", tenant_id, delta, e),
            });
        }
        applied.push(format!("tenant {} adjusted by {}", tenant_id, delta));
    }

    info!(
        request_id = %caller.request_id,
        payment_id = %payment.id,
        reassigned = reassigned,
        old_amount = previous.amount,
        new_amount = payment.amount,
        "Payment updated"
    );

    Ok(payment)
}

pub async fn get_payment(store: &dyn DocumentStore, caller: &Caller, payment_id: &str) -> Result<Payment> {
    match fetch_owned(store, Payment::COLLECTION, payment_id, caller).await? {
        Some(doc) => doc.decode(),
        None => {
            warn!(payment_id = payment_id, user_id = %caller.user_id, "Payment not found");
            Err(AppError::PaymentNotFound {
                id: payment_id.to_string(),
            })
        }
    }
}

/// The caller's payments, newest receipt first
pub async fn list_payments(store: &dyn DocumentStore, caller: &Caller, filter: &PaymentFilter) -> Result<Vec<Payment>> {
    let mut query = Query::new().where_eq("userId", caller.user_id.as_str());
    if let Some(tenant_id) = &filter.tenant_id {
        query = query.where_eq("tenantId", tenant_id.as_str());
    }
    if let Some(property_id) = &filter.property_id {
        query = query.where_eq("propertyId", property_id.as_str());
    }
    let query = query.order_by("receiptNumber", Direction::Desc);

    store
        .query(Payment::COLLECTION, &query)
        .await?
        .iter()
        .map(|doc| doc.decode())
        .collect()
}

/// Highest receipt number of the user plus one. Two concurrent payments
/// can read the same maximum and share a number.
async fn next_receipt_number(store: &dyn DocumentStore, caller: &Caller) -> Result<u64> {
    let query = Query::new()
        .where_eq("userId", caller.user_id.as_str())
        .order_by("receiptNumber", Direction::Desc)
        .limit(1);

    let top = store.query(Payment::COLLECTION, &query).await?;
    Ok(top
        .first()
        .map(|doc| doc.number("receiptNumber").max(0.0) as u64 + 1)
        .unwrap_or(1))
}

async fn find_by_idempotency_key(store: &dyn DocumentStore, caller: &Caller, key: &str) -> Result<Option<Payment>> {
    let query = Query::new()
        .where_eq("userId", caller.user_id.as_str())
        .where_eq("idempotencyKey", key)
        .limit(1);

    store
        .query(Payment::COLLECTION, &query)
        .await?
        .first()
        .map(|doc| doc.decode())
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Fault, MemoryStore};
    use crate::models::{NewTenant, PaymentType, PropertyInput, UnitInput};
    use crate::services::{properties, tenants};
    use chrono::NaiveDate;

    async fn seed(store: &MemoryStore, caller: &Caller, balance: f64) -> Tenant {
        let property = properties::create_property(
            store,
            caller,
            PropertyInput {
                name: "Acme Apartments".into(),
                address: "Plot 4, Kampala Road".into(),
                units: vec![UnitInput { name: "A1".into() }, UnitInput { name: "A2".into() }],
            },
        )
        .await
        .unwrap();

        let tenant = tenants::create_tenant(
            store,
            caller,
            NewTenant {
                name: "Jane Namata".into(),
                phone: "0772123456".into(),
                email: None,
                due_day: 5,
                property_id: property.id.clone(),
                unit_name: "A1".into(),
            },
        )
        .await
        .unwrap();

        if balance != 0.0 {
            store
                .increment(Tenant::COLLECTION, &tenant.id, "balance", balance)
                .await
                .unwrap();
        }
        tenants::get_tenant(store, caller, &tenant.id).await.unwrap()
    }

    fn record(tenant_id: &str, amount: f64) -> RecordPayment {
        RecordPayment {
            tenant_id: tenant_id.to_string(),
            amount,
            payment_type: PaymentType::Rent,
            date: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
            months: vec!["March 2025".into()],
            idempotency_key: None,
        }
    }

    async fn balance(store: &MemoryStore, caller: &Caller, tenant_id: &str) -> f64 {
        tenants::get_tenant(store, caller, tenant_id).await.unwrap().balance
    }

    #[tokio::test]
    async fn test_payment_decrements_balance() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let tenant = seed(&store, &caller, 500000.0).await;

        let payment = record_payment(&store, &caller, record(&tenant.id, 200000.0)).await.unwrap();

        assert_eq!(payment.balance_after_payment, 300000.0);
        assert_eq!(balance(&store, &caller, &tenant.id).await, 300000.0);
        assert_eq!(payment.receipt_number, 1);
        assert_eq!(payment.tenant_name, "Jane Namata");
        assert_eq!(payment.property_name, "Acme Apartments");
        assert_eq!(payment.unit_name.as_deref(), Some("A1"));

        let stored = get_payment(&store, &caller, &payment.id).await.unwrap();
        assert_eq!(stored, payment);
    }

    #[tokio::test]
    async fn test_sequential_payments_sum_and_receipts_increase() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let tenant = seed(&store, &caller, 1000.0).await;

        let amounts = [100.0, 250.5, 49.5, 600.0];
        let mut receipts = Vec::new();
        for amount in amounts {
            let payment = record_payment(&store, &caller, record(&tenant.id, amount)).await.unwrap();
            receipts.push(payment.receipt_number);
        }

        assert_eq!(receipts, vec![1, 2, 3, 4]);
        let expected = 1000.0 - amounts.iter().sum::<f64>();
        assert!((balance(&store, &caller, &tenant.id).await - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_receipt_numbers_are_per_user() {
        let store = MemoryStore::new();
        let alice = Caller::new("alice");
        let bob = Caller::new("bob");
        let t_alice = seed(&store, &alice, 0.0).await;
        let t_bob = seed(&store, &bob, 0.0).await;

        record_payment(&store, &alice, record(&t_alice.id, 10.0)).await.unwrap();
        record_payment(&store, &alice, record(&t_alice.id, 10.0)).await.unwrap();
        let first_bob = record_payment(&store, &bob, record(&t_bob.id, 10.0)).await.unwrap();

        assert_eq!(first_bob.receipt_number, 1);
    }

    #[tokio::test]
    async fn test_invalid_amount_writes_nothing() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let tenant = seed(&store, &caller, 100.0).await;
        let before = store.stats();

        let err = record_payment(&store, &caller, record(&tenant.id, 0.0)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(store.stats(), before);
    }

    #[tokio::test]
    async fn test_payment_without_months_rejected() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let tenant = seed(&store, &caller, 100.0).await;
        let before = store.stats();

        let mut input = record(&tenant.id, 50.0);
        input.months.clear();
        let err = record_payment(&store, &caller, input).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { field: Some(ref f), .. } if f == "months"));
        assert_eq!(store.stats(), before);
        assert_eq!(balance(&store, &caller, &tenant.id).await, 100.0);
    }

    #[tokio::test]
    async fn test_unknown_or_foreign_tenant() {
        let store = MemoryStore::new();
        let owner = Caller::new("u1");
        let tenant = seed(&store, &owner, 100.0).await;
        let before = store.stats();

        let err = record_payment(&store, &owner, record("missing", 10.0)).await.unwrap_err();
        assert!(matches!(err, AppError::TenantNotFound { .. }));

        let stranger = Caller::new("u2");
        let err = record_payment(&store, &stranger, record(&tenant.id, 10.0)).await.unwrap_err();
        assert!(matches!(err, AppError::TenantNotFound { .. }));

        assert_eq!(store.stats(), before);
        assert_eq!(balance(&store, &owner, &tenant.id).await, 100.0);
    }

    #[tokio::test]
    async fn test_idempotent_retry_increments_once() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let tenant = seed(&store, &caller, 500.0).await;

        let mut input = record(&tenant.id, 200.0);
        input.idempotency_key = Some("form-submit-1".into());

        let first = record_payment(&store, &caller, input.clone()).await.unwrap();
        let second = record_payment(&store, &caller, input).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(balance(&store, &caller, &tenant.id).await, 300.0);
        assert_eq!(store.count(Payment::COLLECTION).await, 1);
    }

    #[tokio::test]
    async fn test_increment_failure_is_partial() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let tenant = seed(&store, &caller, 500.0).await;
        store.inject_fault(Fault::Increment);

        let err = record_payment(&store, &caller, record(&tenant.id, 200.0)).await.unwrap_err();
        match err {
            AppError::PartialFailure { operation, completed, .. } => {
                assert_eq!(operation, "record_payment");
                assert!(completed.starts_with("payment "));
            }
            other => panic!("unexpected error: {other}"),
        }

        // The payment stays written; the balance is untouched
        assert_eq!(store.count(Payment::COLLECTION).await, 1);
        assert_eq!(balance(&store, &caller, &tenant.id).await, 500.0);
    }

    #[tokio::test]
    async fn test_update_same_tenant_reconciles_difference() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let tenant = seed(&store, &caller, 500.0).await;
        let payment = record_payment(&store, &caller, record(&tenant.id, 200.0)).await.unwrap();

        let updated = update_payment(
            &store,
            &caller,
            &payment.id,
            PaymentUpdate {
                amount: Some(150.0),
                ..PaymentUpdate::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.amount, 150.0);
        assert_eq!(updated.receipt_number, payment.receipt_number);
        assert_eq!(updated.balance_after_payment, payment.balance_after_payment);
        assert!(updated.updated_at.is_some());
        assert_eq!(balance(&store, &caller, &tenant.id).await, 350.0);
    }

    #[tokio::test]
    async fn test_update_reassigns_tenant() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let first = seed(&store, &caller, 500.0).await;
        let second = tenants::create_tenant(
            &store,
            &caller,
            NewTenant {
                name: "Paul Okello".into(),
                phone: "0701234567".into(),
                email: None,
                due_day: 1,
                property_id: first.property_id.clone(),
                unit_name: "A2".into(),
            },
        )
        .await
        .unwrap();

        let payment = record_payment(&store, &caller, record(&first.id, 200.0)).await.unwrap();
        let updated = update_payment(
            &store,
            &caller,
            &payment.id,
            PaymentUpdate {
                tenant_id: Some(second.id.clone()),
                amount: Some(120.0),
                ..PaymentUpdate::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.tenant_name, "Paul Okello");
        assert_eq!(updated.unit_name.as_deref(), Some("A2"));
        assert_eq!(balance(&store, &caller, &first.id).await, 500.0);
        assert_eq!(balance(&store, &caller, &second.id).await, -120.0);
    }

    #[tokio::test]
    async fn test_update_increment_failure_is_partial() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let tenant = seed(&store, &caller, 500.0).await;
        let payment = record_payment(&store, &caller, record(&tenant.id, 200.0)).await.unwrap();
        store.inject_fault(Fault::Increment);

        let err = update_payment(
            &store,
            &caller,
            &payment.id,
            PaymentUpdate {
                amount: Some(100.0),
                ..PaymentUpdate::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::PartialFailure { .. }));
        let stored = get_payment(&store, &caller, &payment.id).await.unwrap();
        assert_eq!(stored.amount, 100.0);
        assert_eq!(balance(&store, &caller, &tenant.id).await, 300.0);
    }

    #[tokio::test]
    async fn test_list_payments_filters_by_tenant() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let tenant = seed(&store, &caller, 0.0).await;
        record_payment(&store, &caller, record(&tenant.id, 10.0)).await.unwrap();
        record_payment(&store, &caller, record(&tenant.id, 20.0)).await.unwrap();

        let all = list_payments(&store, &caller, &PaymentFilter::default()).await.unwrap();
        assert_eq!(all.iter().map(|p| p.receipt_number).collect::<Vec<_>>(), vec![2, 1]);

        let none = list_payments(
            &store,
            &caller,
            &PaymentFilter {
                tenant_id: Some("other".into()),
                property_id: None,
            },
        )
        .await
        .unwrap();
        assert!(none.is_empty());

        let foreign = list_payments(&store, &Caller::new("u2"), &PaymentFilter::default()).await.unwrap();
        assert!(foreign.is_empty());
    }
}
