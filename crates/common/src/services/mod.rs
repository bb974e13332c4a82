//! Workflows over the document store
//!
//! Every workflow takes the store, the acting `Caller` and a validated
//! payload. Documents owned by another user are reported exactly like
//! missing ones.

pub mod devices;
pub mod landlords;
pub mod notifications;
pub mod payments;
pub mod properties;
pub mod reports;
pub mod tenants;

use crate::auth::Caller;
use crate::db::{Document, DocumentStore, Query, WriteBatch, WriteOp};
use crate::errors::{AppError, Result};
use serde::Serialize;

/// What a cascading delete removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    /// Batches committed
    pub batches: usize,
    pub tenants_deleted: usize,
    pub payments_deleted: usize,
}

/// Fetch a document if it exists and belongs to the caller
pub(crate) async fn fetch_owned(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    caller: &Caller,
) -> Result<Option<Document>> {
    if id.is_empty() {
        return Ok(None);
    }

    let doc = store.get(collection, id).await?;
    Ok(doc.filter(|d| {
        d.data
            .get("userId")
            .and_then(|v| v.as_str())
            .is_some_and(|owner| caller.owns(owner))
    }))
}

/// Run `base` once per chunk of `values`, with an `IN` filter on `field`
/// sized to the store's limit, and concatenate the results.
pub(crate) async fn query_in_chunks(
    store: &dyn DocumentStore,
    collection: &str,
    base: &Query,
    field: &str,
    values: &[String],
) -> Result<Vec<Document>> {
    let chunk_size = store.limits().max_in_list;
    let mut docs = Vec::new();

    for chunk in values.chunks(chunk_size) {
        let query = base.clone().where_in(field, chunk.iter().cloned());
        docs.extend(store.query(collection, &query).await?);
    }

    Ok(docs)
}

/// Commit writes in sequential batches sized to the store's limit.
///
/// Each batch is atomic. A failure before anything was committed is
/// returned as-is; a failure after at least one batch committed becomes
/// `PartialFailure` and committed batches stay applied.
pub(crate) async fn commit_in_batches(
    store: &dyn DocumentStore,
    operation: &str,
    ops: Vec<WriteOp>,
) -> Result<usize> {
    let batches = WriteBatch::chunked(ops, store.limits().max_batch_ops);
    let total = batches.len();

    for (committed, batch) in batches.into_iter().enumerate() {
        let size = batch.len();
        if let Err(e) = store.commit(batch).await {
            if committed == 0 {
                return Err(e);
            }

            crate::metrics::record_partial_failure(operation);
            tracing::error!(
                operation = operation,
                committed = committed,
                total = total,
                error = %e,
                "Batch commit failed after earlier batches were applied"
            );
            return Err(AppError::PartialFailure {
                operation: operation.to_string(),
                completed: format!("{} of {} batches", committed, total),
                detail: e.to_string(),
            });
        }

        tracing::debug!(operation = operation, batch = committed + 1, total = total, ops = size, "Batch committed");
    }

    Ok(total)
}
