//! Property management and the property deletion cascade

use super::{commit_in_batches, fetch_owned, query_in_chunks, CascadeReport};
use crate::auth::Caller;
use crate::db::{to_fields, Direction, DocumentStore, Fields, Query, WriteOp};
use crate::errors::{AppError, Result};
use crate::models::{Payment, Property, PropertyInput, Tenant};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

/// A unit with its current tenant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupiedUnit {
    pub unit_name: String,
    pub tenant_id: String,
    pub tenant_name: String,
}

/// Occupancy of every unit of a property, in unit order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitOccupancy {
    pub property_id: String,
    pub occupied: Vec<OccupiedUnit>,
    pub vacant: Vec<String>,
}

pub async fn create_property(store: &dyn DocumentStore, caller: &Caller, input: PropertyInput) -> Result<Property> {
    input.check()?;

    let mut property = Property {
        id: String::new(),
        user_id: caller.user_id.clone(),
        name: input.name.trim().to_string(),
        address: input.address.trim().to_string(),
        units: input.units(),
        created_at: Some(Utc::now()),
    };

    property.id = store.insert(Property::COLLECTION, to_fields(&property)?).await?;

    info!(
        request_id = %caller.request_id,
        property_id = %property.id,
        units = property.units.len(),
        "Property created"
    );

    Ok(property)
}

pub async fn get_property(store: &dyn DocumentStore, caller: &Caller, property_id: &str) -> Result<Property> {
    match fetch_owned(store, Property::COLLECTION, property_id, caller).await? {
        Some(doc) => doc.decode(),
        None => {
            warn!(property_id = property_id, user_id = %caller.user_id, "Property not found");
            Err(AppError::PropertyNotFound {
                id: property_id.to_string(),
            })
        }
    }
}

/// The caller's properties ordered by name
pub async fn list_properties(store: &dyn DocumentStore, caller: &Caller) -> Result<Vec<Property>> {
    let query = Query::new()
        .where_eq("userId", caller.user_id.as_str())
        .order_by("name", Direction::Asc);

    store
        .query(Property::COLLECTION, &query)
        .await?
        .iter()
        .map(|doc| doc.decode())
        .collect()
}

/// Replace name, address and units. A unit that still has a tenant cannot
/// be removed. Tenant `propertyName` snapshots are left as they are.
pub async fn update_property(
    store: &dyn DocumentStore,
    caller: &Caller,
    property_id: &str,
    input: PropertyInput,
) -> Result<Property> {
    input.check()?;

    let mut property = get_property(store, caller, property_id).await?;
    let units = input.units();

    for tenant in tenants_of(store, caller, property_id).await? {
        if !units.iter().any(|u| u.name == tenant.unit_name) {
            return Err(AppError::UnitOccupied {
                property_id: property_id.to_string(),
                unit_name: tenant.unit_name,
            });
        }
    }

    property.name = input.name.trim().to_string();
    property.address = input.address.trim().to_string();
    property.units = units;

    let mut fields = Fields::new();
    fields.insert("name".into(), Value::String(property.name.clone()));
    fields.insert("address".into(), Value::String(property.address.clone()));
    fields.insert("units".into(), serde_json::to_value(&property.units)?);
    store.update(Property::COLLECTION, property_id, fields).await?;

    info!(request_id = %caller.request_id, property_id = property_id, "Property updated");
    Ok(property)
}

/// Delete a property together with its tenants and their payments.
///
/// Payments are found with `IN` queries over chunks of tenant ids. Deletes
/// are committed payments first, then tenants, then the property, in
/// batches no larger than the store allows. A failure after the first
/// batch leaves the earlier batches applied and returns `PartialFailure`.
pub async fn delete_property(store: &dyn DocumentStore, caller: &Caller, property_id: &str) -> Result<CascadeReport> {
    let property = get_property(store, caller, property_id).await?;

    let tenant_ids: Vec<String> = store
        .query(
            Tenant::COLLECTION,
            &Query::new()
                .where_eq("propertyId", property.id.as_str())
                .where_eq("userId", caller.user_id.as_str()),
        )
        .await?
        .into_iter()
        .map(|doc| doc.id)
        .collect();

    let payment_ids: Vec<String> = query_in_chunks(
        store,
        Payment::COLLECTION,
        &Query::new().where_eq("userId", caller.user_id.as_str()),
        "tenantId",
        &tenant_ids,
    )
    .await?
    .into_iter()
    .map(|doc| doc.id)
    .collect();

    let mut ops = Vec::with_capacity(payment_ids.len() + tenant_ids.len() + 1);
    ops.extend(payment_ids.iter().map(|id| WriteOp::Delete {
        collection: Payment::COLLECTION.to_string(),
        id: id.clone(),
    }));
    ops.extend(tenant_ids.iter().map(|id| WriteOp::Delete {
        collection: Tenant::COLLECTION.to_string(),
        id: id.clone(),
    }));
    ops.push(WriteOp::Delete {
        collection: Property::COLLECTION.to_string(),
        id: property.id.clone(),
    });

    let documents = ops.len();
    let batches = commit_in_batches(store, "delete_property", ops).await?;

    crate::metrics::record_cascade("property", documents);
    info!(
        request_id = %caller.request_id,
        property_id = %property.id,
        tenants = tenant_ids.len(),
        payments = payment_ids.len(),
        batches = batches,
        "Property deleted with dependents"
    );

    Ok(CascadeReport {
        batches,
        tenants_deleted: tenant_ids.len(),
        payments_deleted: payment_ids.len(),
    })
}

/// Which units of a property are taken and by whom
pub async fn unit_occupancy(store: &dyn DocumentStore, caller: &Caller, property_id: &str) -> Result<UnitOccupancy> {
    let property = get_property(store, caller, property_id).await?;
    let tenants = tenants_of(store, caller, property_id).await?;

    let mut occupied = Vec::new();
    let mut vacant = Vec::new();
    for unit in property.unit_names() {
        match tenants.iter().find(|t| t.unit_name == unit) {
            Some(tenant) => occupied.push(OccupiedUnit {
                unit_name: unit.to_string(),
                tenant_id: tenant.id.clone(),
                tenant_name: tenant.name.clone(),
            }),
            None => vacant.push(unit.to_string()),
        }
    }

    Ok(UnitOccupancy {
        property_id: property.id,
        occupied,
        vacant,
    })
}

async fn tenants_of(store: &dyn DocumentStore, caller: &Caller, property_id: &str) -> Result<Vec<Tenant>> {
    let query = Query::new()
        .where_eq("propertyId", property_id)
        .where_eq("userId", caller.user_id.as_str());

    store
        .query(Tenant::COLLECTION, &query)
        .await?
        .iter()
        .map(|doc| doc.decode())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Fault, MemoryStore, StoreLimits};
    use crate::models::{NewTenant, PaymentType, RecordPayment, UnitInput};
    use crate::services::{payments, tenants};
    use chrono::NaiveDate;

    fn input(units: &[&str]) -> PropertyInput {
        PropertyInput {
            name: "Acme Apartments".into(),
            address: "Plot 4, Kampala Road".into(),
            units: units.iter().map(|n| UnitInput { name: n.to_string() }).collect(),
        }
    }

    fn unit_names(count: usize) -> Vec<String> {
        (1..=count).map(|i| format!("U{}", i)).collect()
    }

    async fn add_tenant(store: &MemoryStore, caller: &Caller, property_id: &str, unit: &str) -> Tenant {
        tenants::create_tenant(
            store,
            caller,
            NewTenant {
                name: format!("Tenant {}", unit),
                phone: "0772123456".into(),
                email: None,
                due_day: 5,
                property_id: property_id.to_string(),
                unit_name: unit.to_string(),
            },
        )
        .await
        .unwrap()
    }

    async fn pay(store: &MemoryStore, caller: &Caller, tenant_id: &str) {
        payments::record_payment(
            store,
            caller,
            RecordPayment {
                tenant_id: tenant_id.to_string(),
                amount: 100.0,
                payment_type: PaymentType::Rent,
                date: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
                months: vec!["March 2025".into()],
                idempotency_key: None,
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");

        let mut second = input(&["B1"]);
        second.name = "Bella Court".into();
        create_property(&store, &caller, second).await.unwrap();
        create_property(&store, &caller, input(&[" A1 ", "A2"])).await.unwrap();
        create_property(&store, &Caller::new("u2"), input(&["X"])).await.unwrap();

        let listed = list_properties(&store, &caller).await.unwrap();
        assert_eq!(
            listed.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["Acme Apartments", "Bella Court"]
        );
        assert_eq!(listed[0].unit_names().collect::<Vec<_>>(), vec!["A1", "A2"]);
    }

    #[tokio::test]
    async fn test_delete_without_tenants_deletes_one_document() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let property = create_property(&store, &caller, input(&["A1"])).await.unwrap();

        let report = delete_property(&store, &caller, &property.id).await.unwrap();

        assert_eq!(
            report,
            CascadeReport {
                batches: 1,
                tenants_deleted: 0,
                payments_deleted: 0
            }
        );
        assert_eq!(store.stats().deletes, 1);
        assert_eq!(store.count(Property::COLLECTION).await, 0);
    }

    #[tokio::test]
    async fn test_cascade_removes_tenants_and_payments_only() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let p1 = create_property(&store, &caller, input(&["A1", "A2"])).await.unwrap();
        let p2 = create_property(&store, &caller, input(&["B1"])).await.unwrap();

        let t1 = add_tenant(&store, &caller, &p1.id, "A1").await;
        let t2 = add_tenant(&store, &caller, &p1.id, "A2").await;
        let keep = add_tenant(&store, &caller, &p2.id, "B1").await;
        pay(&store, &caller, &t1.id).await;
        pay(&store, &caller, &t2.id).await;
        pay(&store, &caller, &keep.id).await;

        let report = delete_property(&store, &caller, &p1.id).await.unwrap();
        assert_eq!(report.tenants_deleted, 2);
        assert_eq!(report.payments_deleted, 2);

        assert!(matches!(
            get_property(&store, &caller, &p1.id).await,
            Err(AppError::PropertyNotFound { .. })
        ));
        assert!(tenants::get_tenant(&store, &caller, &t1.id).await.is_err());
        assert!(tenants::get_tenant(&store, &caller, &t2.id).await.is_err());

        assert_eq!(store.count(Property::COLLECTION).await, 1);
        assert_eq!(store.count(Tenant::COLLECTION).await, 1);
        assert_eq!(store.count(Payment::COLLECTION).await, 1);
        let remaining = payments::list_payments(&store, &caller, &Default::default()).await.unwrap();
        assert_eq!(remaining[0].tenant_id, keep.id);
    }

    #[tokio::test]
    async fn test_cascade_chunks_in_queries_and_batches() {
        let store = MemoryStore::with_limits(StoreLimits {
            max_batch_ops: 10,
            max_in_list: 3,
        });
        let caller = Caller::new("u1");
        let names = unit_names(7);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let property = create_property(&store, &caller, input(&refs)).await.unwrap();

        for unit in &names {
            let tenant = add_tenant(&store, &caller, &property.id, unit).await;
            pay(&store, &caller, &tenant.id).await;
        }

        // 7 payments + 7 tenants + 1 property = 15 deletes
        let report = delete_property(&store, &caller, &property.id).await.unwrap();
        assert_eq!(report.batches, 2);
        assert_eq!(report.tenants_deleted, 7);
        assert_eq!(report.payments_deleted, 7);
        assert_eq!(store.stats().commits, 2);
        assert_eq!(store.count(Tenant::COLLECTION).await, 0);
        assert_eq!(store.count(Payment::COLLECTION).await, 0);
        assert_eq!(store.count(Property::COLLECTION).await, 0);
    }

    #[tokio::test]
    async fn test_cascade_partial_failure_keeps_property() {
        let store = MemoryStore::with_limits(StoreLimits {
            max_batch_ops: 2,
            max_in_list: 30,
        });
        let caller = Caller::new("u1");
        let property = create_property(&store, &caller, input(&["A1", "A2"])).await.unwrap();
        add_tenant(&store, &caller, &property.id, "A1").await;
        add_tenant(&store, &caller, &property.id, "A2").await;
        store.inject_fault(Fault::Commit { skip: 1 });

        let err = delete_property(&store, &caller, &property.id).await.unwrap_err();
        assert!(matches!(err, AppError::PartialFailure { .. }));

        // Tenants went in the first batch; the property is deleted last
        assert_eq!(store.count(Tenant::COLLECTION).await, 0);
        assert_eq!(store.count(Property::COLLECTION).await, 1);
    }

    #[tokio::test]
    async fn test_foreign_property_is_not_found() {
        let store = MemoryStore::new();
        let property = create_property(&store, &Caller::new("u1"), input(&["A1"])).await.unwrap();

        let err = delete_property(&store, &Caller::new("u2"), &property.id).await.unwrap_err();
        assert!(matches!(err, AppError::PropertyNotFound { .. }));
        assert_eq!(store.count(Property::COLLECTION).await, 1);
    }

    #[tokio::test]
    async fn test_update_cannot_drop_occupied_unit() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let property = create_property(&store, &caller, input(&["A1", "A2"])).await.unwrap();
        add_tenant(&store, &caller, &property.id, "A1").await;

        let err = update_property(&store, &caller, &property.id, input(&["A2"])).await.unwrap_err();
        assert!(matches!(err, AppError::UnitOccupied { .. }));

        let mut renamed = input(&["A1", "A3"]);
        renamed.name = "Acme Heights".into();
        let updated = update_property(&store, &caller, &property.id, renamed).await.unwrap();
        assert_eq!(updated.name, "Acme Heights");

        let stored = get_property(&store, &caller, &property.id).await.unwrap();
        assert_eq!(stored.unit_names().collect::<Vec<_>>(), vec!["A1", "A3"]);
        assert_eq!(stored.user_id, "u1");
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_unit_occupancy() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let property = create_property(&store, &caller, input(&["A1", "A2", "A3"])).await.unwrap();
        let tenant = add_tenant(&store, &caller, &property.id, "A2").await;

        let occupancy = unit_occupancy(&store, &caller, &property.id).await.unwrap();
        assert_eq!(occupancy.vacant, vec!["A1".to_string(), "A3".to_string()]);
        assert_eq!(occupancy.occupied.len(), 1);
        assert_eq!(occupancy.occupied[0].tenant_id, tenant.id);
    }
}
