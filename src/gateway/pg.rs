//! PostgreSQL gateway over a sqlx pool.

use super::{ConstraintClassifier, PostgresClassifier, Record, StorageGateway};
use crate::config::{ResolvedEntity, ResolvedReport};
use crate::error::StorageError;
use crate::sql::{self, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};

pub struct PgGateway<C = PostgresClassifier> {
    pool: PgPool,
    classifier: C,
}

impl PgGateway {
    pub fn new(pool: PgPool) -> Self {
        PgGateway {
            pool,
            classifier: PostgresClassifier,
        }
    }
}

impl<C: ConstraintClassifier> PgGateway<C> {
    pub fn with_classifier(pool: PgPool, classifier: C) -> Self {
        PgGateway { pool, classifier }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn bind_all(q: &QueryBuf) -> Query<'_, Postgres, PgArguments> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

#[async_trait]
impl<C: ConstraintClassifier> StorageGateway for PgGateway<C> {
    async fn fetch_by_id(&self, entity: &ResolvedEntity, id: &Value) -> Result<Option<Record>, StorageError> {
        let q = sql::select_by_id(entity, id);
        let row = bind_all(&q).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| row_to_record(&r)))
    }

    async fn fetch_all(&self, entity: &ResolvedEntity) -> Result<Vec<Record>, StorageError> {
        let q = sql::select_all(entity);
        let rows = bind_all(&q).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn exists_by_field(
        &self,
        entity: &ResolvedEntity,
        column: &str,
        value: &Value,
        exclude_id: Option<&Value>,
    ) -> Result<bool, StorageError> {
        let q = sql::exists_by_column(entity, column, value, exclude_id);
        let row = bind_all(&q).fetch_optional(&self.pool).await?;
        Ok(row.is_some())
    }

    async fn insert(&self, entity: &ResolvedEntity, record: &Record) -> Result<Value, StorageError> {
        let q = sql::insert(entity, record);
        let row = bind_all(&q)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| self.classifier.storage_error(e))?;
        Ok(cell_to_value(&row, &entity.pk_column))
    }

    async fn update(
        &self,
        entity: &ResolvedEntity,
        id: &Value,
        record: &Record,
        expected_version: Option<i64>,
    ) -> Result<u64, StorageError> {
        let q = sql::update(entity, id, record, expected_version);
        let done = bind_all(&q)
            .execute(&self.pool)
            .await
            .map_err(|e| self.classifier.storage_error(e))?;
        Ok(done.rows_affected())
    }

    async fn delete_by_id(&self, entity: &ResolvedEntity, id: &Value) -> Result<(), StorageError> {
        let q = sql::delete(entity, id);
        let done = bind_all(&q)
            .execute(&self.pool)
            .await
            .map_err(|e| self.classifier.storage_error(e))?;
        if done.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn report(
        &self,
        entity: &ResolvedEntity,
        report: &ResolvedReport,
        id: Option<&Value>,
    ) -> Result<Vec<Record>, StorageError> {
        let q = sql::report(entity, report, id);
        let rows = bind_all(&q).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

fn row_to_record(row: &PgRow) -> Record {
    use sqlx::{Column, Row};
    let mut map = Record::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    map
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%d %H:%M:%S").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
