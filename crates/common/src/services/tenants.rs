//! Tenant management

use super::{commit_in_batches, fetch_owned, properties::get_property, CascadeReport};
use crate::auth::Caller;
use crate::db::{to_fields, Direction, DocumentStore, Fields, Query, WriteOp};
use crate::errors::{AppError, Result};
use crate::models::{blank_email_as_none, NewTenant, Payment, Property, Tenant, TenantUpdate};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use validator::Validate;

/// Optional filters for listing tenants
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantFilter {
    pub property_id: Option<String>,
}

/// Add a tenant to a vacant unit of one of the caller's properties.
///
/// Occupancy is read before the insert; two concurrent requests for the
/// same unit can both succeed.
pub async fn create_tenant(store: &dyn DocumentStore, caller: &Caller, mut input: NewTenant) -> Result<Tenant> {
    input.email = blank_email_as_none(input.email);
    input.validate()?;

    let property = get_property(store, caller, &input.property_id).await?;
    let unit_name = input.unit_name.trim().to_string();
    ensure_vacant(store, caller, &property, &unit_name, None).await?;

    let mut tenant = Tenant {
        id: String::new(),
        user_id: caller.user_id.clone(),
        name: input.name.trim().to_string(),
        phone: input.phone,
        email: input.email,
        due_day: Some(input.due_day),
        property_id: property.id,
        unit_name,
        property_name: property.name,
        balance: 0.0,
        created_at: Some(Utc::now()),
    };

    tenant.id = store.insert(Tenant::COLLECTION, to_fields(&tenant)?).await?;

    info!(
        request_id = %caller.request_id,
        tenant_id = %tenant.id,
        property_id = %tenant.property_id,
        unit = %tenant.unit_name,
        "Tenant created"
    );

    Ok(tenant)
}

/// Fails unless `unit_name` is a unit of `property` with no tenant other
/// than `except`
async fn ensure_vacant(
    store: &dyn DocumentStore,
    caller: &Caller,
    property: &Property,
    unit_name: &str,
    except: Option<&str>,
) -> Result<()> {
    if !property.has_unit(unit_name) {
        return Err(AppError::validation(
            "unitName",
            format!("Unit '{}' does not exist in {}.", unit_name, property.name),
        ));
    }

    let occupants = store
        .query(
            Tenant::COLLECTION,
            &Query::new()
                .where_eq("userId", caller.user_id.as_str())
                .where_eq("propertyId", property.id.as_str())
                .where_eq("unitName", unit_name)
                .limit(2),
        )
        .await?;

    if occupants.iter().any(|doc| Some(doc.id.as_str()) != except) {
        warn!(property_id = %property.id, unit = unit_name, "Unit already occupied");
        return Err(AppError::UnitOccupied {
            property_id: property.id.clone(),
            unit_name: unit_name.to_string(),
        });
    }
    Ok(())
}

pub async fn get_tenant(store: &dyn DocumentStore, caller: &Caller, tenant_id: &str) -> Result<Tenant> {
    match fetch_owned(store, Tenant::COLLECTION, tenant_id, caller).await? {
        Some(doc) => doc.decode(),
        None => {
            warn!(tenant_id = tenant_id, user_id = %caller.user_id, "Tenant not found");
            Err(AppError::TenantNotFound {
                id: tenant_id.to_string(),
            })
        }
    }
}

/// The caller's tenants ordered by name
pub async fn list_tenants(store: &dyn DocumentStore, caller: &Caller, filter: &TenantFilter) -> Result<Vec<Tenant>> {
    let mut query = Query::new().where_eq("userId", caller.user_id.as_str());
    if let Some(property_id) = &filter.property_id {
        query = query.where_eq("propertyId", property_id.as_str());
    }
    let query = query.order_by("name", Direction::Asc);

    store
        .query(Tenant::COLLECTION, &query)
        .await?
        .iter()
        .map(|doc| doc.decode())
        .collect()
}

/// Update contact details and optionally move the tenant to another unit.
///
/// A move checks the target unit like `create_tenant` does and refreshes
/// the `propertyName` snapshot. The balance is never touched here.
pub async fn update_tenant(
    store: &dyn DocumentStore,
    caller: &Caller,
    tenant_id: &str,
    mut input: TenantUpdate,
) -> Result<Tenant> {
    let clear_email = input.email.as_deref().is_some_and(|e| e.trim().is_empty());
    input.email = blank_email_as_none(input.email);
    input.validate()?;
    if input.is_empty() && !clear_email {
        return Err(AppError::Validation {
            message: "Nothing to update.".to_string(),
            field: None,
        });
    }

    let mut tenant = get_tenant(store, caller, tenant_id).await?;
    let mut fields = Fields::new();

    if input.moves() {
        let property_id = input.property_id.take().unwrap_or_else(|| tenant.property_id.clone());
        let unit_name = input
            .unit_name
            .take()
            .map(|u| u.trim().to_string())
            .unwrap_or_else(|| tenant.unit_name.clone());

        if property_id != tenant.property_id || unit_name != tenant.unit_name {
            let property = get_property(store, caller, &property_id).await?;
            ensure_vacant(store, caller, &property, &unit_name, Some(tenant_id)).await?;

            info!(
                tenant_id = tenant_id,
                from_property = %tenant.property_id,
                from_unit = %tenant.unit_name,
                to_property = %property.id,
                to_unit = %unit_name,
                "Moving tenant"
            );
            tenant.property_id = property.id;
            tenant.property_name = property.name;
            tenant.unit_name = unit_name;
            fields.insert("propertyId".into(), Value::String(tenant.property_id.clone()));
            fields.insert("propertyName".into(), Value::String(tenant.property_name.clone()));
            fields.insert("unitName".into(), Value::String(tenant.unit_name.clone()));
        }
    }

    if let Some(name) = input.name {
        tenant.name = name.trim().to_string();
        fields.insert("name".into(), Value::String(tenant.name.clone()));
    }
    if let Some(phone) = input.phone {
        tenant.phone = phone;
        fields.insert("phone".into(), Value::String(tenant.phone.clone()));
    }
    if let Some(email) = input.email {
        tenant.email = Some(email.clone());
        fields.insert("email".into(), Value::String(email));
    } else if clear_email {
        tenant.email = None;
        fields.insert("email".into(), Value::Null);
    }
    if let Some(due_day) = input.due_day {
        tenant.due_day = Some(due_day);
        fields.insert("dueDay".into(), Value::from(due_day));
    }

    if !fields.is_empty() {
        store.update(Tenant::COLLECTION, tenant_id, fields).await?;
    }

    info!(request_id = %caller.request_id, tenant_id = tenant_id, "Tenant updated");
    Ok(tenant)
}

/// Delete a tenant and all of its payments
pub async fn delete_tenant(store: &dyn DocumentStore, caller: &Caller, tenant_id: &str) -> Result<CascadeReport> {
    let tenant = get_tenant(store, caller, tenant_id).await?;

    let payment_ids: Vec<String> = store
        .query(
            Payment::COLLECTION,
            &Query::new()
                .where_eq("tenantId", tenant.id.as_str())
                .where_eq("userId", caller.user_id.as_str()),
        )
        .await?
        .into_iter()
        .map(|doc| doc.id)
        .collect();

    let mut ops: Vec<WriteOp> = payment_ids
        .iter()
        .map(|id| WriteOp::Delete {
            collection: Payment::COLLECTION.to_string(),
            id: id.clone(),
        })
        .collect();
    ops.push(WriteOp::Delete {
        collection: Tenant::COLLECTION.to_string(),
        id: tenant.id.clone(),
    });

    let documents = ops.len();
    let batches = commit_in_batches(store, "delete_tenant", ops).await?;

    crate::metrics::record_cascade("tenant", documents);
    info!(
        request_id = %caller.request_id,
        tenant_id = %tenant.id,
        payments = payment_ids.len(),
        "Tenant deleted with payments"
    );

    Ok(CascadeReport {
        batches,
        tenants_deleted: 1,
        payments_deleted: payment_ids.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::{PaymentType, PropertyInput, RecordPayment, UnitInput};
    use crate::services::{payments, properties};
    use chrono::NaiveDate;

    async fn property(store: &MemoryStore, caller: &Caller) -> Property {
        properties::create_property(
            store,
            caller,
            PropertyInput {
                name: "Acme Apartments".into(),
                address: "Plot 4, Kampala Road".into(),
                units: vec![UnitInput { name: "A1".into() }, UnitInput { name: "A2".into() }],
            },
        )
        .await
        .unwrap()
    }

    fn new_tenant(property_id: &str, unit: &str) -> NewTenant {
        NewTenant {
            name: " Jane Namata ".into(),
            phone: "0772123456".into(),
            email: Some("jane@example.com".into()),
            due_day: 5,
            property_id: property_id.to_string(),
            unit_name: unit.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_snapshots_property_and_starts_at_zero() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let property = property(&store, &caller).await;

        let tenant = create_tenant(&store, &caller, new_tenant(&property.id, "A1")).await.unwrap();
        assert_eq!(tenant.name, "Jane Namata");
        assert_eq!(tenant.balance, 0.0);
        assert_eq!(tenant.property_name, "Acme Apartments");
        assert_eq!(get_tenant(&store, &caller, &tenant.id).await.unwrap(), tenant);
    }

    #[tokio::test]
    async fn test_occupied_unit_rejected() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let property = property(&store, &caller).await;
        create_tenant(&store, &caller, new_tenant(&property.id, "A1")).await.unwrap();

        let err = create_tenant(&store, &caller, new_tenant(&property.id, "A1")).await.unwrap_err();
        assert!(matches!(err, AppError::UnitOccupied { .. }));
        assert_eq!(store.count(Tenant::COLLECTION).await, 1);
    }

    #[tokio::test]
    async fn test_unknown_unit_and_foreign_property() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let property = property(&store, &caller).await;

        let err = create_tenant(&store, &caller, new_tenant(&property.id, "Z9")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = create_tenant(&store, &Caller::new("u2"), new_tenant(&property.id, "A1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PropertyNotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_contact_details() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let property = property(&store, &caller).await;
        let tenant = create_tenant(&store, &caller, new_tenant(&property.id, "A1")).await.unwrap();

        let updated = update_tenant(
            &store,
            &caller,
            &tenant.id,
            TenantUpdate {
                phone: Some("0701234567".into()),
                due_day: Some(28),
                ..TenantUpdate::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.phone, "0701234567");

        let stored = get_tenant(&store, &caller, &tenant.id).await.unwrap();
        assert_eq!(stored.due_day, Some(28));
        assert_eq!(stored.name, "Jane Namata");

        let err = update_tenant(&store, &caller, &tenant.id, TenantUpdate::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_blank_email_means_no_email() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let property = property(&store, &caller).await;

        let mut input = new_tenant(&property.id, "A1");
        input.email = Some(String::new());
        let tenant = create_tenant(&store, &caller, input).await.unwrap();
        assert_eq!(tenant.email, None);

        let tenant_json: NewTenant = serde_json::from_value(serde_json::json!({
            "name": "Paul",
            "phone": "0772123456",
            "email": "",
            "dueDay": 1,
            "propertyId": property.id,
            "unitName": "A2"
        }))
        .unwrap();
        assert!(create_tenant(&store, &caller, tenant_json).await.is_ok());

        let mut bad = new_tenant(&property.id, "A2");
        bad.email = Some("not-an-email".into());
        assert!(create_tenant(&store, &caller, bad).await.is_err());
    }

    #[tokio::test]
    async fn test_update_clears_email() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let property = property(&store, &caller).await;
        let tenant = create_tenant(&store, &caller, new_tenant(&property.id, "A1")).await.unwrap();

        let update = TenantUpdate {
            email: Some(" ".into()),
            ..TenantUpdate::default()
        };
        let updated = update_tenant(&store, &caller, &tenant.id, update).await.unwrap();
        assert_eq!(updated.email, None);
        assert_eq!(get_tenant(&store, &caller, &tenant.id).await.unwrap().email, None);
    }

    #[tokio::test]
    async fn test_move_to_vacant_unit() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let first = property(&store, &caller).await;
        let second = properties::create_property(
            &store,
            &caller,
            PropertyInput {
                name: "Baker Court".into(),
                address: "Plot 9".into(),
                units: vec![UnitInput { name: "B1".into() }],
            },
        )
        .await
        .unwrap();
        let tenant = create_tenant(&store, &caller, new_tenant(&first.id, "A1")).await.unwrap();

        let moved = update_tenant(
            &store,
            &caller,
            &tenant.id,
            TenantUpdate {
                property_id: Some(second.id.clone()),
                unit_name: Some("B1".into()),
                ..TenantUpdate::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(moved.property_name, "Baker Court");

        let stored = get_tenant(&store, &caller, &tenant.id).await.unwrap();
        assert_eq!(stored.property_id, second.id);
        assert_eq!(stored.unit_name, "B1");
        assert_eq!(stored.property_name, "Baker Court");
        assert_eq!(stored.balance, 0.0);

        // A1 is free again
        create_tenant(&store, &caller, new_tenant(&first.id, "A1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_move_to_occupied_or_unknown_unit_rejected() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let property = property(&store, &caller).await;
        let jane = create_tenant(&store, &caller, new_tenant(&property.id, "A1")).await.unwrap();
        create_tenant(&store, &caller, new_tenant(&property.id, "A2")).await.unwrap();

        let to = |unit: &str| TenantUpdate {
            unit_name: Some(unit.to_string()),
            ..TenantUpdate::default()
        };

        let err = update_tenant(&store, &caller, &jane.id, to("A2")).await.unwrap_err();
        assert!(matches!(err, AppError::UnitOccupied { .. }));

        let err = update_tenant(&store, &caller, &jane.id, to("Z9")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        // Staying in the current unit is not a conflict
        update_tenant(&store, &caller, &jane.id, to("A1")).await.unwrap();

        let foreign = properties::create_property(
            &store,
            &Caller::new("u2"),
            PropertyInput {
                name: "Elsewhere".into(),
                address: "Plot 1".into(),
                units: vec![UnitInput { name: "C1".into() }],
            },
        )
        .await
        .unwrap();
        let err = update_tenant(
            &store,
            &caller,
            &jane.id,
            TenantUpdate {
                property_id: Some(foreign.id),
                unit_name: Some("C1".into()),
                ..TenantUpdate::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::PropertyNotFound { .. }));
        assert_eq!(get_tenant(&store, &caller, &jane.id).await.unwrap().unit_name, "A1");
    }

    #[tokio::test]
    async fn test_delete_removes_payments() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let property = property(&store, &caller).await;
        let tenant = create_tenant(&store, &caller, new_tenant(&property.id, "A1")).await.unwrap();
        for amount in [100.0, 200.0] {
            payments::record_payment(
                &store,
                &caller,
                RecordPayment {
                    tenant_id: tenant.id.clone(),
                    amount,
                    payment_type: PaymentType::Rent,
                    date: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
                    months: vec!["March 2025".into()],
                    idempotency_key: None,
                },
            )
            .await
            .unwrap();
        }

        let report = delete_tenant(&store, &caller, &tenant.id).await.unwrap();
        assert_eq!(report.payments_deleted, 2);
        assert_eq!(store.count(Payment::COLLECTION).await, 0);
        assert_eq!(store.count(Tenant::COLLECTION).await, 0);

        // The unit is free again
        create_tenant(&store, &caller, new_tenant(&property.id, "A1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_by_property() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let property = property(&store, &caller).await;
        create_tenant(&store, &caller, new_tenant(&property.id, "A1")).await.unwrap();

        let all = list_tenants(&store, &caller, &TenantFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);

        let other = list_tenants(
            &store,
            &caller,
            &TenantFilter {
                property_id: Some("elsewhere".into()),
            },
        )
        .await
        .unwrap();
        assert!(other.is_empty());
    }
}
