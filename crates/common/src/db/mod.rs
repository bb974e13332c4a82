//! Document store layer for RentLedger
//!
//! Provides:
//! - The `DocumentStore` trait: named collections of schemaless JSON
//!   documents with filtered queries, atomic field increments and bounded
//!   all-or-nothing batch writes
//! - `MemoryStore`, an in-process implementation used by tests and local runs
//! - `PgDocumentStore`, a SeaORM-backed implementation over a Postgres JSONB table
//! - Helpers for moving typed records in and out of documents

pub mod entity;
mod memory;
mod postgres;
mod query;

pub use memory::{Fault, MemoryStore, WriteStats};
pub use postgres::{DbPool, PgDocumentStore};
pub use query::{compare_values, Direction, Filter, FilterOp, Query};

use crate::config::{StoreBackend, StoreConfig};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Field map of a single document
pub type Fields = serde_json::Map<String, Value>;

/// Collection names
pub mod collections {
    pub const PROPERTIES: &str = "properties";
    pub const TENANTS: &str = "tenants";
    pub const PAYMENTS: &str = "payments";
    pub const LANDLORDS: &str = "landlords";
    pub const USERS: &str = "users";

    /// Device-token subcollection of a user
    pub fn user_tokens(user_id: &str) -> String {
        format!("users/{}/tokens", user_id)
    }
}

/// A stored document: its key plus its fields
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Fields) -> Self {
        Self { id: id.into(), data }
    }

    /// Decode into a typed record. The document key is exposed as `id`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(data)).map_err(|e| AppError::Store {
            message: format!("Malformed document {}: {}", self.id, e),
        })
    }

    /// Read a numeric field, treating a missing field as zero
    pub fn number(&self, field: &str) -> f64 {
        self.data.get(field).and_then(Value::as_f64).unwrap_or(0.0)
    }
}

/// Encode a typed record into document fields. Any `id` field is dropped:
/// the key lives outside the field map.
pub fn to_fields<T: Serialize>(record: &T) -> Result<Fields> {
    match serde_json::to_value(record)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        other => Err(AppError::Internal {
            message: format!("Record did not serialize to an object: {}", other),
        }),
    }
}

/// Operation limits of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    /// Maximum operations in one atomic batch
    pub max_batch_ops: usize,
    /// Maximum values in one `IN` filter
    pub max_in_list: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_batch_ops: 500,
            max_in_list: 30,
        }
    }
}

impl From<&StoreConfig> for StoreLimits {
    fn from(config: &StoreConfig) -> Self {
        Self {
            max_batch_ops: config.max_batch_ops.max(1),
            max_in_list: config.max_in_list.max(1),
        }
    }
}

/// A single write inside a batch
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or replace a document
    Set {
        collection: String,
        id: String,
        data: Fields,
    },
    /// Merge fields into an existing document
    Update {
        collection: String,
        id: String,
        fields: Fields,
    },
    /// Atomically add `delta` to a numeric field
    Increment {
        collection: String,
        id: String,
        field: String,
        delta: f64,
    },
    /// Delete a document (no-op if absent)
    Delete { collection: String, id: String },
}

/// An ordered group of writes committed all-or-nothing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: &str, id: &str, data: Fields) -> &mut Self {
        self.ops.push(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        });
        self
    }

    pub fn update(&mut self, collection: &str, id: &str, fields: Fields) -> &mut Self {
        self.ops.push(WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        });
        self
    }

    pub fn delete(&mut self, collection: &str, id: &str) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    /// Split a list of writes into batches no larger than `max_ops`,
    /// preserving order.
    pub fn chunked(ops: Vec<WriteOp>, max_ops: usize) -> Vec<WriteBatch> {
        let max_ops = max_ops.max(1);
        let mut batches = Vec::with_capacity(ops.len().div_ceil(max_ops));
        let mut current = WriteBatch::new();

        for op in ops {
            if current.len() == max_ops {
                batches.push(std::mem::take(&mut current));
            }
            current.ops.push(op);
        }

        if !current.is_empty() {
            batches.push(current);
        }

        batches
    }
}

/// Schemaless document database with named collections.
///
/// Every method is a single round trip. `increment` and `commit` are the
/// only atomic primitives; nothing else serializes concurrent callers.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Limits enforced by this store
    fn limits(&self) -> StoreLimits;

    /// Fetch a document by key
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Run a filtered, optionally ordered and limited query
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>>;

    /// Insert a document under a store-assigned key
    async fn insert(&self, collection: &str, data: Fields) -> Result<String>;

    /// Create or replace a document under an explicit key
    async fn set(&self, collection: &str, id: &str, data: Fields) -> Result<()>;

    /// Merge fields into an existing document
    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// Atomically add `delta` to a numeric field of an existing document
    async fn increment(&self, collection: &str, id: &str, field: &str, delta: f64) -> Result<()>;

    /// Delete a document; deleting an absent document succeeds
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    /// Commit a batch atomically. Fails without applying anything if the
    /// batch exceeds `limits().max_batch_ops`.
    async fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Connectivity check
    async fn ping(&self) -> Result<()>;
}

/// Shared handle to the configured store
pub type SharedStore = Arc<dyn DocumentStore>;

/// Build the store selected by configuration
pub async fn connect(config: &StoreConfig) -> Result<SharedStore> {
    let limits = StoreLimits::from(config);

    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory document store; data is lost on shutdown");
            Ok(Arc::new(MemoryStore::with_limits(limits)))
        }
        StoreBackend::Postgres => {
            let pool = DbPool::new(config).await?;
            let store = PgDocumentStore::new(pool, limits);
            store.ensure_schema().await?;
            Ok(Arc::new(store))
        }
    }
}
