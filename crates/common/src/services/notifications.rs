//! Overdue-balance notification dispatch
//!
//! Walks every user, tells the ones with overdue tenants about them on all
//! of their registered devices, and forgets device tokens the push service
//! reports as permanently dead. A failure for one user never stops the run.

use crate::db::{collections, DocumentStore, Query};
use crate::errors::Result;
use crate::models::{Tenant, UserRecord};
use crate::push::{PushMessage, PushSender, SendOutcome};
use serde::Serialize;
use tracing::{error, info, warn};

pub const NOTIFICATION_TITLE: &str = "Overdue Tenant Balances";

/// What happened for one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum UserOutcome {
    NoOverdueTenants,
    NoTokens,
    Notified { sent: usize, failed: usize, pruned: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDispatch {
    pub user_id: String,
    #[serde(flatten)]
    pub outcome: UserOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSummary {
    pub message: String,
    pub users: Vec<UserDispatch>,
    pub users_notified: usize,
    pub messages_sent: usize,
    pub tokens_pruned: usize,
    pub failures: usize,
}

impl DispatchSummary {
    fn from_outcomes(users: Vec<UserDispatch>) -> Self {
        let mut summary = DispatchSummary {
            message: if users.is_empty() {
                "No users found to notify.".to_string()
            } else {
                "Notifications sent successfully.".to_string()
            },
            ..Default::default()
        };

        for user in &users {
            match &user.outcome {
                UserOutcome::Notified { sent, pruned, .. } => {
                    summary.users_notified += 1;
                    summary.messages_sent += sent;
                    summary.tokens_pruned += pruned;
                }
                UserOutcome::Failed { .. } => summary.failures += 1,
                UserOutcome::NoOverdueTenants | UserOutcome::NoTokens => {}
            }
        }

        summary.users = users;
        summary
    }
}

/// Notification body for a user's overdue tenants
pub fn overdue_message(tenant_names: &[String], link: &str) -> PushMessage {
    PushMessage {
        title: NOTIFICATION_TITLE.to_string(),
        body: format!(
            "You have {} tenant(s) with overdue balances: {}.",
            tenant_names.len(),
            tenant_names.join(", ")
        ),
        link: link.to_string(),
    }
}

/// Run one dispatch over all users. Only a failure to list users is an
/// error; everything after that is recorded per user.
pub async fn dispatch_overdue(store: &dyn DocumentStore, push: &dyn PushSender, link: &str) -> Result<DispatchSummary> {
    let users = store.query(UserRecord::COLLECTION, &Query::new()).await?;
    info!(users = users.len(), provider = push.provider_name(), "Starting overdue notification dispatch");

    let mut outcomes = Vec::with_capacity(users.len());
    for user in users {
        let outcome = match notify_user(store, push, &user.id, link).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(user_id = %user.id, error = %e, "Notification dispatch failed for user");
                UserOutcome::Failed { error: e.to_string() }
            }
        };
        outcomes.push(UserDispatch {
            user_id: user.id,
            outcome,
        });
    }

    let summary = DispatchSummary::from_outcomes(outcomes);
    crate::metrics::record_notifications(summary.messages_sent, summary.tokens_pruned);
    info!(
        users_notified = summary.users_notified,
        messages_sent = summary.messages_sent,
        tokens_pruned = summary.tokens_pruned,
        failures = summary.failures,
        "Overdue notification dispatch finished"
    );

    Ok(summary)
}

async fn notify_user(store: &dyn DocumentStore, push: &dyn PushSender, user_id: &str, link: &str) -> Result<UserOutcome> {
    let overdue = store
        .query(
            Tenant::COLLECTION,
            &Query::new().where_eq("userId", user_id).where_gt("balance", 0),
        )
        .await?;

    if overdue.is_empty() {
        info!(user_id = user_id, "No tenants with overdue balances");
        return Ok(UserOutcome::NoOverdueTenants);
    }

    let tokens_collection = collections::user_tokens(user_id);
    let tokens: Vec<String> = store
        .query(&tokens_collection, &Query::new())
        .await?
        .into_iter()
        .map(|doc| doc.id)
        .collect();

    if tokens.is_empty() {
        info!(user_id = user_id, "No notification tokens registered");
        return Ok(UserOutcome::NoTokens);
    }

    let names: Vec<String> = overdue
        .iter()
        .map(|doc| {
            doc.data
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        })
        .collect();

    let message = overdue_message(&names, link);
    let results = push.send_multicast(&tokens, &message).await?;

    let mut sent = 0;
    let mut failed = 0;
    let mut pruned = 0;
    for (token, result) in tokens.iter().zip(results) {
        match result {
            SendOutcome::Delivered => sent += 1,
            SendOutcome::Failed(code) => {
                failed += 1;
                warn!(user_id = user_id, error = ?code, "Push delivery failed for token");

                if code.is_permanent() {
                    match store.delete(&tokens_collection, token).await {
                        Ok(()) => pruned += 1,
                        Err(e) => error!(user_id = user_id, error = %e, "Failed to prune dead token"),
                    }
                }
            }
        }
    }

    info!(
        user_id = user_id,
        overdue_tenants = names.len(),
        sent = sent,
        failed = failed,
        pruned = pruned,
        "Overdue notification sent"
    );

    Ok(UserOutcome::Notified { sent, failed, pruned })
}
