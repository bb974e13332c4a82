//! Landlord contact records

use super::fetch_owned;
use crate::auth::Caller;
use crate::db::{to_fields, Direction, DocumentStore, Fields, Query};
use crate::errors::{AppError, Result};
use crate::models::{Landlord, NewLandlord};
use serde_json::Value;
use tracing::info;
use validator::Validate;

pub async fn create_landlord(store: &dyn DocumentStore, caller: &Caller, input: NewLandlord) -> Result<Landlord> {
    input.validate()?;

    let mut landlord = Landlord {
        id: String::new(),
        user_id: caller.user_id.clone(),
        name: input.name.trim().to_string(),
        email: input.email.trim().to_string(),
        phone_number: input.phone_number.trim().to_string(),
    };
    landlord.id = store.insert(Landlord::COLLECTION, to_fields(&landlord)?).await?;

    info!(request_id = %caller.request_id, landlord_id = %landlord.id, "Landlord created");
    Ok(landlord)
}

pub async fn list_landlords(store: &dyn DocumentStore, caller: &Caller) -> Result<Vec<Landlord>> {
    let query = Query::new()
        .where_eq("userId", caller.user_id.as_str())
        .order_by("name", Direction::Asc);

    store
        .query(Landlord::COLLECTION, &query)
        .await?
        .iter()
        .map(|doc| doc.decode())
        .collect()
}

/// Replace a landlord's name, email and phone number
pub async fn update_landlord(
    store: &dyn DocumentStore,
    caller: &Caller,
    landlord_id: &str,
    input: NewLandlord,
) -> Result<Landlord> {
    input.validate()?;

    let mut landlord: Landlord = match fetch_owned(store, Landlord::COLLECTION, landlord_id, caller).await? {
        Some(doc) => doc.decode()?,
        None => return Err(landlord_not_found(landlord_id)),
    };

    landlord.name = input.name.trim().to_string();
    landlord.email = input.email.trim().to_string();
    landlord.phone_number = input.phone_number.trim().to_string();

    let mut fields = Fields::new();
    fields.insert("name".into(), Value::String(landlord.name.clone()));
    fields.insert("email".into(), Value::String(landlord.email.clone()));
    fields.insert("phoneNumber".into(), Value::String(landlord.phone_number.clone()));
    store.update(Landlord::COLLECTION, landlord_id, fields).await?;

    info!(request_id = %caller.request_id, landlord_id = landlord_id, "Landlord updated");
    Ok(landlord)
}

pub async fn delete_landlord(store: &dyn DocumentStore, caller: &Caller, landlord_id: &str) -> Result<()> {
    if fetch_owned(store, Landlord::COLLECTION, landlord_id, caller).await?.is_none() {
        return Err(landlord_not_found(landlord_id));
    }

    store.delete(Landlord::COLLECTION, landlord_id).await?;
    info!(request_id = %caller.request_id, landlord_id = landlord_id, "Landlord deleted");
    Ok(())
}

fn landlord_not_found(landlord_id: &str) -> AppError {
    AppError::NotFound {
        resource_type: "landlord".to_string(),
        id: landlord_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn new_landlord(name: &str) -> NewLandlord {
        NewLandlord {
            name: name.into(),
            email: "owner@example.com".into(),
            phone_number: "0772123456".into(),
        }
    }

    #[tokio::test]
    async fn test_create_list_delete() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");

        let zed = create_landlord(&store, &caller, new_landlord("Zed")).await.unwrap();
        create_landlord(&store, &caller, new_landlord("Amos")).await.unwrap();

        let names: Vec<String> = list_landlords(&store, &caller)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect();
        assert_eq!(names, vec!["Amos", "Zed"]);

        let err = delete_landlord(&store, &Caller::new("u2"), &zed.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));

        delete_landlord(&store, &caller, &zed.id).await.unwrap();
        assert_eq!(list_landlords(&store, &caller).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_landlord() {
        let store = MemoryStore::new();
        let caller = Caller::new("u1");
        let amos = create_landlord(&store, &caller, new_landlord("Amos")).await.unwrap();

        let mut input = new_landlord(" Amos Okello ");
        input.email = "amos@example.com".into();
        let updated = update_landlord(&store, &caller, &amos.id, input).await.unwrap();
        assert_eq!(updated.name, "Amos Okello");

        let stored = list_landlords(&store, &caller).await.unwrap();
        assert_eq!(stored, vec![updated]);

        let err = update_landlord(&store, &Caller::new("u2"), &amos.id, new_landlord("Mallory"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
        assert_eq!(list_landlords(&store, &caller).await.unwrap()[0].name, "Amos Okello");
    }

    #[tokio::test]
    async fn test_rejects_bad_email() {
        let store = MemoryStore::new();
        let mut input = new_landlord("Amos");
        input.email = "not-an-email".into();
        assert!(create_landlord(&store, &Caller::new("u1"), input).await.is_err());
    }
}
