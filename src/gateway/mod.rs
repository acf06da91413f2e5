//! Storage gateway: one logical operation per call, outcomes classified into [`StorageError`].
//!
//! [`PgGateway`] runs parameterized SQL against PostgreSQL; [`MemoryGateway`] keeps rows
//! in process and enforces the same declared unique and foreign-key constraints.

mod classify;
mod memory;
mod pg;

pub use classify::{classify_sqlstate, ConstraintClassifier, PostgresClassifier, Violation};
pub use memory::MemoryGateway;
pub use pg::PgGateway;

use crate::config::{ResolvedEntity, ResolvedReport};
use crate::error::StorageError;
use async_trait::async_trait;
use serde_json::Value;

/// One row as column name → JSON value.
pub type Record = serde_json::Map<String, Value>;

#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// `Ok(None)` when no row has this id.
    async fn fetch_by_id(&self, entity: &ResolvedEntity, id: &Value) -> Result<Option<Record>, StorageError>;

    /// All rows ordered by primary key.
    async fn fetch_all(&self, entity: &ResolvedEntity) -> Result<Vec<Record>, StorageError>;

    /// Whether any row other than `exclude_id` holds `value` in `column`.
    async fn exists_by_field(
        &self,
        entity: &ResolvedEntity,
        column: &str,
        value: &Value,
        exclude_id: Option<&Value>,
    ) -> Result<bool, StorageError>;

    /// Insert and return the stored identity.
    async fn insert(&self, entity: &ResolvedEntity, record: &Record) -> Result<Value, StorageError>;

    /// Overwrite every writable column of the row; returns rows affected (0 when the id is
    /// gone or `expected_version` no longer matches).
    async fn update(
        &self,
        entity: &ResolvedEntity,
        id: &Value,
        record: &Record,
        expected_version: Option<i64>,
    ) -> Result<u64, StorageError>;

    /// [`StorageError::NotFound`] when nothing was deleted.
    async fn delete_by_id(&self, entity: &ResolvedEntity, id: &Value) -> Result<(), StorageError>;

    /// Child aggregate per parent; `id` restricts to one parent.
    async fn report(
        &self,
        entity: &ResolvedEntity,
        report: &ResolvedReport,
        id: Option<&Value>,
    ) -> Result<Vec<Record>, StorageError>;

    /// Readiness check.
    async fn ping(&self) -> Result<(), StorageError>;
}
