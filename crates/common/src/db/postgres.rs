//! Postgres-backed document store
//!
//! Documents live in a single JSONB table (see [`super::entity`]). Filters
//! compile to JSONB comparisons, increments are a single `UPDATE` statement,
//! and each batch runs in one transaction.

use super::entity::{self, CREATE_TABLE_SQL};
use super::{Direction, Document, DocumentStore, Fields, FilterOp, Query, StoreLimits, WriteBatch, WriteOp};
use crate::config::StoreConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend,
    EntityTrait, Set, Statement, TransactionTrait,
};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    connection: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &StoreConfig) -> Result<Self> {
        let url = config.url.as_deref().ok_or_else(|| AppError::Configuration {
            message: "store.url is required for the postgres backend".to_string(),
        })?;

        info!("Connecting to document database...");

        let mut opts = ConnectOptions::new(url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .sqlx_logging(false);

        let connection = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self { connection })
    }

    /// Wrap an existing connection
    pub fn from_connection(connection: DatabaseConnection) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.connection
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;
        Ok(())
    }
}

/// Document store over the `documents` table
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: DbPool,
    limits: StoreLimits,
}

impl PgDocumentStore {
    pub fn new(pool: DbPool, limits: StoreLimits) -> Self {
        Self { pool, limits }
    }

    /// Create the documents table and indexes if missing
    pub async fn ensure_schema(&self) -> Result<()> {
        self.pool.connection().execute_unprepared(CREATE_TABLE_SQL).await?;
        debug!("Document schema ensured");
        Ok(())
    }
}

fn json_param(value: &Value) -> sea_orm::Value {
    sea_orm::Value::Json(Some(Box::new(value.clone())))
}

/// Compile a query into a parameterized SELECT
pub(crate) fn build_select(collection: &str, query: &Query) -> Statement {
    let mut values: Vec<sea_orm::Value> = vec![collection.to_string().into()];
    let mut sql = String::from("SELECT id, data FROM documents WHERE collection = $1");

    for filter in &query.filters {
        values.push(filter.field.clone().into());
        let field_param = values.len();

        match filter.op {
            FilterOp::Eq | FilterOp::Gt => {
                values.push(json_param(&filter.value));
                let op = if filter.op == FilterOp::Eq { "=" } else { ">" };
                sql.push_str(&format!(
                    " AND data -> ${} {} ${}",
                    field_param,
                    op,
                    values.len()
                ));
            }
            FilterOp::In => {
                let candidates = filter.value.as_array().cloned().unwrap_or_default();
                if candidates.is_empty() {
                    sql.push_str(" AND FALSE");
                    continue;
                }
                let mut placeholders = Vec::with_capacity(candidates.len());
                for candidate in &candidates {
                    values.push(json_param(candidate));
                    placeholders.push(format!("${}", values.len()));
                }
                sql.push_str(&format!(
                    " AND data -> ${} IN ({})",
                    field_param,
                    placeholders.join(", ")
                ));
            }
        }
    }

    if let Some((field, direction)) = &query.order_by {
        values.push(field.clone().into());
        let n = values.len();
        let dir = match direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        sql.push_str(&format!(
            " AND data -> ${n} IS NOT NULL ORDER BY data -> ${n} {dir}, id"
        ));
    } else {
        sql.push_str(" ORDER BY id");
    }

    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    Statement::from_sql_and_values(DbBackend::Postgres, &sql, values)
}

async fn set_doc<C: ConnectionTrait>(conn: &C, collection: &str, id: &str, data: Fields) -> Result<()> {
    let now = chrono::Utc::now();
    let model = entity::ActiveModel {
        collection: Set(collection.to_string()),
        id: Set(id.to_string()),
        data: Set(Value::Object(data)),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    entity::Entity::insert(model)
        .on_conflict(
            OnConflict::columns([entity::Column::Collection, entity::Column::Id])
                .update_columns([entity::Column::Data, entity::Column::UpdatedAt])
                .to_owned(),
        )
        .exec(conn)
        .await?;
    Ok(())
}

async fn update_doc<C: ConnectionTrait>(conn: &C, collection: &str, id: &str, fields: Fields) -> Result<()> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        "UPDATE documents SET data = data || $3, updated_at = NOW() WHERE collection = $1 AND id = $2",
        vec![
            collection.to_string().into(),
            id.to_string().into(),
            json_param(&Value::Object(fields)),
        ],
    );

    let result = conn.execute(stmt).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound {
            resource_type: collection.to_string(),
            id: id.to_string(),
        });
    }
    Ok(())
}

async fn increment_doc<C: ConnectionTrait>(
    conn: &C,
    collection: &str,
    id: &str,
    field: &str,
    delta: f64,
) -> Result<()> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"
        UPDATE documents
        SET data = jsonb_set(
                data,
                ARRAY[$3::text],
                to_jsonb(COALESCE((data ->> $3::text)::numeric, 0) + $4::numeric)
            ),
            updated_at = NOW()
        WHERE collection = $1 AND id = $2
        "#,
        vec![
            collection.to_string().into(),
            id.to_string().into(),
            field.to_string().into(),
            delta.into(),
        ],
    );

    let result = conn.execute(stmt).await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound {
            resource_type: collection.to_string(),
            id: id.to_string(),
        });
    }
    Ok(())
}

async fn delete_doc<C: ConnectionTrait>(conn: &C, collection: &str, id: &str) -> Result<()> {
    entity::Entity::delete_by_id((collection.to_string(), id.to_string()))
        .exec(conn)
        .await?;
    Ok(())
}

async fn apply_op<C: ConnectionTrait>(conn: &C, op: WriteOp) -> Result<()> {
    match op {
        WriteOp::Set { collection, id, data } => set_doc(conn, &collection, &id, data).await,
        WriteOp::Update {
            collection,
            id,
            fields,
        } => update_doc(conn, &collection, &id, fields).await,
        WriteOp::Increment {
            collection,
            id,
            field,
            delta,
        } => increment_doc(conn, &collection, &id, &field, delta).await,
        WriteOp::Delete { collection, id } => delete_doc(conn, &collection, &id).await,
    }
}

fn into_fields(collection: &str, id: &str, data: Value) -> Result<Fields> {
    match data {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Store {
            message: format!("Document {}/{} is not an object: {}", collection, id, other),
        }),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn limits(&self) -> StoreLimits {
        self.limits
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let model = entity::Entity::find_by_id((collection.to_string(), id.to_string()))
            .one(self.pool.connection())
            .await?;

        model
            .map(|m| Ok(Document::new(m.id.clone(), into_fields(collection, &m.id, m.data)?)))
            .transpose()
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

        let rows = self
            .pool
            .connection()
            .query_all(build_select(collection, query))
            .await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get_by_index(0)?;
            let data: Value = row.try_get_by_index(1)?;
            let fields = into_fields(collection, &id, data)?;
            documents.push(Document::new(id, fields));
        }
        Ok(documents)
    }

    async fn insert(&self, collection: &str, data: Fields) -> Result<String> {
        let id = Uuid::new_v4().simple().to_string();
        let now = chrono::Utc::now();
        let model = entity::ActiveModel {
            collection: Set(collection.to_string()),
            id: Set(id.clone()),
            data: Set(Value::Object(data)),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        model.insert(self.pool.connection()).await?;
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, data: Fields) -> Result<()> {
        set_doc(self.pool.connection(), collection, id, data).await
    }

    async fn update(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        update_doc(self.pool.connection(), collection, id, fields).await
    }

    async fn increment(&self, collection: &str, id: &str, field: &str, delta: f64) -> Result<()> {
        increment_doc(self.pool.connection(), collection, id, field, delta).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        delete_doc(self.pool.connection(), collection, id).await
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

        let txn = self.pool.connection().begin().await?;
        for op in batch.into_ops() {
            // Dropping the transaction on error rolls it back
            apply_op(&txn, op).await?;
        }
        txn.commit().await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_select_with_filters() {
        let query = Query::new()
            .where_eq("userId", "u1")
            .where_gt("balance", 0)
            .order_by("receiptNumber", Direction::Desc)
            .limit(1);
        let stmt = build_select("payments", &query);

        assert!(stmt.sql.contains("data -> $2 = $3"));
        assert!(stmt.sql.contains("data -> $4 > $5"));
        assert!(stmt.sql.contains("ORDER BY data -> $6 DESC"));
        assert!(stmt.sql.ends_with("LIMIT 1"));
        assert_eq!(stmt.values.map(|v| v.0.len()), Some(6));
    }

    #[test]
    fn test_build_select_in_list() {
        let query = Query::new().where_in("tenantId", ["t1", "t2", "t3"]);
        let stmt = build_select("payments", &query);
        assert!(stmt.sql.contains("data -> $2 IN ($3, $4, $5)"));
    }

    #[test]
    fn test_build_select_empty_in_list_matches_nothing() {
        let query = Query::new().where_in::<_, &str>("tenantId", []);
        let stmt = build_select("payments", &query);
        assert!(stmt.sql.contains("AND FALSE"));
    }
}
