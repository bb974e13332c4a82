//! Push device token registration

use crate::auth::Caller;
use crate::db::{collections, to_fields, DocumentStore, Fields, WriteBatch};
use crate::errors::Result;
use crate::models::{DeviceToken, RegisterToken, UserRecord};
use chrono::Utc;
use serde_json::Value;
use tracing::info;
use validator::Validate;

/// Store a device token for the caller and make sure the caller has a
/// `users` document, so the notification job will visit them.
pub async fn register_token(store: &dyn DocumentStore, caller: &Caller, input: RegisterToken) -> Result<DeviceToken> {
    input.validate()?;
    let now = Utc::now();

    let token = DeviceToken {
        token: input.token.trim().to_string(),
        created_at: now,
    };

    // User doc and token land together
    let mut batch = WriteBatch::new();
    match store.get(UserRecord::COLLECTION, &caller.user_id).await? {
        Some(_) => {
            let mut fields = Fields::new();
            fields.insert("lastSeenAt".into(), Value::String(now.to_rfc3339()));
            batch.update(UserRecord::COLLECTION, &caller.user_id, fields);
        }
        None => {
            let user = UserRecord {
                id: caller.user_id.clone(),
                created_at: Some(now),
                last_seen_at: Some(now),
            };
            batch.set(UserRecord::COLLECTION, &caller.user_id, to_fields(&user)?);
        }
    }
    batch.set(
        &collections::user_tokens(&caller.user_id),
        &token.token,
        to_fields(&token)?,
    );
    store.commit(batch).await?;

    info!(request_id = %caller.request_id, user_id = %caller.user_id, "Device token registered");
    Ok(token)
}

/// Forget a device token. Removing an unknown token succeeds.
pub async fn remove_token(store: &dyn DocumentStore, caller: &Caller, token: &str) -> Result<()> {
    store
        .delete(&collections::user_tokens(&caller.user_id), token)
        .await?;
    info!(request_id = %caller.request_id, user_id = %caller.user_id, "Device token removed");
    Ok(())
}
