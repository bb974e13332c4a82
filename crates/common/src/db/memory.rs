//! In-process document store
//!
//! Every operation takes the state lock once, so single-document writes and
//! batch commits are atomic with respect to each other, matching the hosted
//! store's per-operation guarantees. Faults can be injected to exercise
//! partial-failure paths.

use super::{Direction, Document, DocumentStore, Fields, Query, StoreLimits, WriteBatch, WriteOp};
use crate::db::compare_values;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tokio::sync::RwLock;
use uuid::Uuid;

type Collections = HashMap<String, BTreeMap<String, Fields>>;

/// A failure to inject into a future operation
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// The next `increment` call fails
    Increment,
    /// The next `update` call fails
    Update,
    /// The commit after `skip` successful commits fails
    Commit { skip: usize },
    /// The next `set` on this collection fails
    Set { collection: String },
}

/// Counters of applied writes, for assertions in tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub inserts: usize,
    pub sets: usize,
    pub updates: usize,
    pub increments: usize,
    pub deletes: usize,
    pub commits: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<Collections>,
    stats: Mutex<WriteStats>,
    faults: Mutex<Vec<Fault>>,
    limits: StoreLimits,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: StoreLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Arm a fault for a later operation
    pub fn inject_fault(&self, fault: Fault) {
        self.lock_faults().push(fault);
    }

    /// Applied write counters
    pub fn stats(&self) -> WriteStats {
        *self.lock_stats()
    }

    /// Number of documents currently in a collection
    pub async fn count(&self, collection: &str) -> usize {
        self.state
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, WriteStats> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_faults(&self) -> std::sync::MutexGuard<'_, Vec<Fault>> {
        self.faults.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remove and report a matching armed fault
    fn take_fault(&self, matches: impl Fn(&Fault) -> bool) -> bool {
        let mut faults = self.lock_faults();
        match faults.iter().position(matches) {
            Some(index) => {
                faults.remove(index);
                true
            }
            None => false,
        }
    }

    /// Commit faults count down on every successful commit
    fn commit_should_fail(&self) -> bool {
        let mut faults = self.lock_faults();
        let mut fail = false;
        faults.retain_mut(|fault| match fault {
            Fault::Commit { skip } if *skip == 0 => {
                fail = true;
                false
            }
            Fault::Commit { skip } => {
                *skip -= 1;
                true
            }
            _ => true,
        });
        fail
    }

    fn injected(operation: &str) -> AppError {
        AppError::Store {
            message: format!("injected failure during {}", operation),
        }
    }
}

fn not_found(collection: &str, id: &str) -> AppError {
    AppError::NotFound {
        resource_type: collection.to_string(),
        id: id.to_string(),
    }
}

fn apply_increment(doc: &mut Fields, field: &str, delta: f64) -> Result<()> {
    let current = match doc.get(field) {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(other) => {
            return Err(AppError::Store {
                message: format!("Cannot increment non-numeric field {}: {}", field, other),
            })
        }
    };

    let next = current + delta;
    let number = Number::from_f64(next).ok_or_else(|| AppError::Store {
        message: format!("Increment produced a non-finite value for {}", field),
    })?;
    doc.insert(field.to_string(), Value::Number(number));
    Ok(())
}

fn apply_op(state: &mut Collections, op: WriteOp) -> Result<()> {
    match op {
        WriteOp::Set { collection, id, data } => {
            state.entry(collection).or_default().insert(id, data);
        }
        WriteOp::Update {
            collection,
            id,
            fields,
        } => {
            let doc = state
                .get_mut(&collection)
                .and_then(|docs| docs.get_mut(&id))
                .ok_or_else(|| not_found(&collection, &id))?;
            doc.extend(fields);
        }
        WriteOp::Increment {
            collection,
            id,
            field,
            delta,
        } => {
            let doc = state
                .get_mut(&collection)
                .and_then(|docs| docs.get_mut(&id))
                .ok_or_else(|| not_found(&collection, &id))?;
            apply_increment(doc, &field, delta)?;
        }
        WriteOp::Delete { collection, id } => {
            if let Some(docs) = state.get_mut(&collection) {
                docs.remove(&id);
            }
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn limits(&self) -> StoreLimits {
        self.limits
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let state = self.state.read().await;
        Ok(state
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document::new(id, data.clone())))
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        if query.max_in_len() > self.limits.max_in_list {
            return Err(AppError::StoreLimit {
                message: format!(
                    "IN filter with {} values exceeds limit of {}",
                    query.max_in_len(),
                    self.limits.max_in_list
                ),
            });
        }

        let state = self.state.read().await;
        let Some(docs) = state.get(collection) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<Document> = docs
            .iter()
            .filter(|(_, data)| query.filters.iter().all(|f| f.matches(data.get(&f.field))))
            .map(|(id, data)| Document::new(id.clone(), data.clone()))
            .collect();

        if let Some((field, direction)) = &query.order_by {
            // Documents without the ordering field are excluded
            results.retain(|doc| doc.data.contains_key(field));
            results.sort_by(|a, b| {
                let ord = compare_values(&a.data[field], &b.data[field]).unwrap_or(Ordering::Equal);
                match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            results.truncate(limit);
        }

        Ok(results)
    }

    async fn insert(&self, collection: &str, data: Fields) -> Result<String> {
        let id = Uuid::new_v4().simple().to_string();
        self.state
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), data);
        self.lock_stats().inserts += 1;
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Fields) -> Result<()> {
        if self.take_fault(|f| matches!(f, Fault::Set { collection: c } if c == collection)) {
            return Err(Self::injected("set"));
        }
        let mut state = self.state.write().await;
        apply_op(
            &mut state,
            WriteOp::Set {
                collection: collection.to_string(),
                id: id.to_string(),
                data,
            },
        )?;
        self.lock_stats().sets += 1;
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        if self.take_fault(|f| *f == Fault::Update) {
            return Err(Self::injected("update"));
        }
        let mut state = self.state.write().await;
        apply_op(
            &mut state,
            WriteOp::Update {
                collection: collection.to_string(),
                id: id.to_string(),
                fields,
            },
        )?;
        self.lock_stats().updates += 1;
        Ok(())
    }

    async fn increment(&self, collection: &str, id: &str, field: &str, delta: f64) -> Result<()> {
        if self.take_fault(|f| *f == Fault::Increment) {
            return Err(Self::injected("increment"));
        }
        let mut state = self.state.write().await;
        apply_op(
            &mut state,
            WriteOp::Increment {
                collection: collection.to_string(),
                id: id.to_string(),
                field: field.to_string(),
                delta,
            },
        )?;
        self.lock_stats().increments += 1;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        apply_op(
            &mut state,
            WriteOp::Delete {
                collection: collection.to_string(),
                id: id.to_string(),
            },
        )?;
        self.lock_stats().deletes += 1;
        Ok(())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.len() > self.limits.max_batch_ops {
            return Err(AppError::StoreLimit {
                message: format!(
                    "Batch of {} operations exceeds limit of {}",
                    batch.len(),
                    self.limits.max_batch_ops
                ),
            });
        }
        if self.commit_should_fail() {
            return Err(Self::injected("commit"));
        }

        let mut state = self.state.write().await;
        // Apply to a copy so a failing op leaves nothing behind
        let mut staged = state.clone();
        let mut delta = WriteStats::default();
        for op in batch.into_ops() {
            match &op {
                WriteOp::Set { .. } => delta.sets += 1,
                WriteOp::Update { .. } => delta.updates += 1,
                WriteOp::Increment { .. } => delta.increments += 1,
                WriteOp::Delete { .. } => delta.deletes += 1,
            }
            apply_op(&mut staged, op)?;
        }
        *state = staged;

        let mut stats = self.lock_stats();
        stats.sets += delta.sets;
        stats.updates += delta.updates;
        stats.increments += delta.increments;
        stats.deletes += delta.deletes;
        stats.commits += 1;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
