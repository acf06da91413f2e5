//! In-process gateway. Enforces primary-key, unique and foreign-key constraints the way
//! the generated schema does, reporting the same constraint names.

use super::{Record, StorageGateway};
use crate::config::{FieldType, PkType, ResolvedEntity, ResolvedModel, ResolvedReport};
use crate::error::StorageError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Row key ordered like the primary key column (integers numerically, text lexically).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum RowKey {
    Int(i64),
    Text(String),
}

impl RowKey {
    fn of(v: &Value) -> Option<RowKey> {
        match v {
            Value::Number(n) => n.as_i64().map(RowKey::Int),
            Value::String(s) => Some(RowKey::Text(s.clone())),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Table {
    rows: BTreeMap<RowKey, Record>,
    last_id: i64,
}

pub struct MemoryGateway {
    model: Arc<ResolvedModel>,
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryGateway {
    pub fn new(model: Arc<ResolvedModel>) -> Self {
        MemoryGateway {
            model,
            tables: RwLock::new(HashMap::new()),
        }
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Backend("memory store lock poisoned".into())
}

fn key_of(entity: &ResolvedEntity, id: &Value) -> Result<RowKey, StorageError> {
    RowKey::of(id).ok_or_else(|| StorageError::Backend(format!("invalid key for {}: {}", entity.table_name, id)))
}

fn non_null<'a>(record: &'a Record, column: &str) -> Option<&'a Value> {
    record.get(column).filter(|v| !v.is_null())
}

/// Unique and foreign-key checks for a row about to be written at `key`.
fn check_constraints(
    tables: &HashMap<String, Table>,
    entity: &ResolvedEntity,
    key: &RowKey,
    record: &Record,
) -> Result<(), StorageError> {
    let table = tables.get(&entity.table_name);
    for u in &entity.unique {
        let Some(value) = non_null(record, &u.column) else { continue };
        let taken = table
            .map(|t| t.rows.iter().any(|(k, row)| k != key && row.get(&u.column) == Some(value)))
            .unwrap_or(false);
        if taken {
            return Err(StorageError::UniqueViolation {
                constraint: Some(u.constraint.clone()),
            });
        }
    }
    for fk in &entity.foreign_keys {
        let Some(value) = non_null(record, &fk.column) else { continue };
        let exists = match (RowKey::of(value), tables.get(&fk.references_table)) {
            (Some(target), Some(t)) => t.rows.contains_key(&target),
            _ => false,
        };
        if !exists {
            return Err(StorageError::ForeignKeyViolation {
                constraint: Some(fk.constraint.clone()),
            });
        }
    }
    Ok(())
}

/// Keep only catalog columns, filling absent ones with NULL.
fn stored_row(entity: &ResolvedEntity, id: &Value, record: &Record, version: Option<i64>) -> Record {
    let mut row = Record::new();
    for c in &entity.columns {
        let value = if c.is_pk {
            id.clone()
        } else if c.is_version {
            version.map(Value::from).unwrap_or(Value::Null)
        } else {
            record.get(&c.name).cloned().unwrap_or(Value::Null)
        };
        row.insert(c.name.clone(), value);
    }
    row
}

#[async_trait]
impl StorageGateway for MemoryGateway {
    async fn fetch_by_id(&self, entity: &ResolvedEntity, id: &Value) -> Result<Option<Record>, StorageError> {
        let key = key_of(entity, id)?;
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .get(&entity.table_name)
            .and_then(|t| t.rows.get(&key))
            .cloned())
    }

    async fn fetch_all(&self, entity: &ResolvedEntity) -> Result<Vec<Record>, StorageError> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .get(&entity.table_name)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn exists_by_field(
        &self,
        entity: &ResolvedEntity,
        column: &str,
        value: &Value,
        exclude_id: Option<&Value>,
    ) -> Result<bool, StorageError> {
        let exclude = exclude_id.and_then(RowKey::of);
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .get(&entity.table_name)
            .map(|t| {
                t.rows
                    .iter()
                    .any(|(k, row)| Some(k) != exclude.as_ref() && row.get(column) == Some(value))
            })
            .unwrap_or(false))
    }

    async fn insert(&self, entity: &ResolvedEntity, record: &Record) -> Result<Value, StorageError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let id = match entity.pk_type {
            PkType::Serial => {
                let last = tables.get(&entity.table_name).map(|t| t.last_id).unwrap_or(0);
                Value::from(last + 1)
            }
            PkType::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
            PkType::Text => non_null(record, &entity.pk_column).cloned().ok_or_else(|| {
                StorageError::Backend(format!(
                    "null value in column \"{}\" of relation \"{}\"",
                    entity.pk_column, entity.table_name
                ))
            })?,
        };
        let key = key_of(entity, &id)?;
        let duplicate_key = tables
            .get(&entity.table_name)
            .map(|t| t.rows.contains_key(&key))
            .unwrap_or(false);
        if duplicate_key {
            return Err(StorageError::UniqueViolation {
                constraint: Some(entity.pk_constraint()),
            });
        }
        check_constraints(&tables, entity, &key, record)?;

        let version = entity.version_column.as_ref().map(|_| 1);
        let row = stored_row(entity, &id, record, version);
        let table = tables.entry(entity.table_name.clone()).or_default();
        if let RowKey::Int(n) = key {
            table.last_id = table.last_id.max(n);
        }
        table.rows.insert(key, row);
        Ok(id)
    }

    async fn update(
        &self,
        entity: &ResolvedEntity,
        id: &Value,
        record: &Record,
        expected_version: Option<i64>,
    ) -> Result<u64, StorageError> {
        let key = key_of(entity, id)?;
        let mut tables = self.tables.write().map_err(poisoned)?;
        let current = match tables.get(&entity.table_name).and_then(|t| t.rows.get(&key)) {
            Some(row) => row.clone(),
            None => return Ok(0),
        };
        let stored_version = entity
            .version_column
            .as_ref()
            .and_then(|vc| current.get(vc))
            .and_then(Value::as_i64);
        if let (Some(expected), Some(stored)) = (expected_version, stored_version) {
            if expected != stored {
                return Ok(0);
            }
        }
        check_constraints(&tables, entity, &key, record)?;

        let row = stored_row(entity, id, record, stored_version.map(|v| v + 1));
        if let Some(table) = tables.get_mut(&entity.table_name) {
            table.rows.insert(key, row);
        }
        Ok(1)
    }

    async fn delete_by_id(&self, entity: &ResolvedEntity, id: &Value) -> Result<(), StorageError> {
        let key = key_of(entity, id)?;
        let mut tables = self.tables.write().map_err(poisoned)?;
        let exists = tables
            .get(&entity.table_name)
            .map(|t| t.rows.contains_key(&key))
            .unwrap_or(false);
        if !exists {
            return Err(StorageError::NotFound);
        }
        for (referrer, fk) in self.model.references_to(&entity.table_name) {
            let referenced = tables
                .get(&referrer.table_name)
                .map(|t| {
                    t.rows.iter().any(|(k, row)| {
                        let self_row = referrer.table_name == entity.table_name && *k == key;
                        !self_row && row.get(&fk.column).and_then(RowKey::of).as_ref() == Some(&key)
                    })
                })
                .unwrap_or(false);
            if referenced {
                return Err(StorageError::ForeignKeyViolation {
                    constraint: Some(fk.constraint.clone()),
                });
            }
        }
        if let Some(table) = tables.get_mut(&entity.table_name) {
            table.rows.remove(&key);
        }
        Ok(())
    }

    async fn report(
        &self,
        entity: &ResolvedEntity,
        report: &ResolvedReport,
        id: Option<&Value>,
    ) -> Result<Vec<Record>, StorageError> {
        let only = id.map(|v| key_of(entity, v)).transpose()?;
        let tables = self.tables.read().map_err(poisoned)?;
        let Some(parents) = tables.get(&entity.table_name) else {
            return Ok(Vec::new());
        };
        let children: Vec<&Record> = tables
            .get(&report.child_table)
            .map(|t| t.rows.values().collect())
            .unwrap_or_default();

        let mut out = Vec::new();
        for (key, parent) in &parents.rows {
            if only.as_ref().is_some_and(|k| k != key) {
                continue;
            }
            let mine = children
                .iter()
                .filter(|c| c.get(&report.foreign_key).and_then(RowKey::of).as_ref() == Some(key));
            let aggregate = match &report.sum_column {
                Some((col, FieldType::Float)) => {
                    Value::from(mine.filter_map(|c| c.get(col).and_then(Value::as_f64)).sum::<f64>())
                }
                Some((col, _)) => Value::from(mine.filter_map(|c| c.get(col).and_then(Value::as_i64)).sum::<i64>()),
                None => Value::from(mine.count() as i64),
            };

            let mut row = Record::new();
            row.insert(
                entity.pk_column.clone(),
                parent.get(&entity.pk_column).cloned().unwrap_or(Value::Null),
            );
            for col in &report.columns {
                row.insert(col.clone(), parent.get(col).cloned().unwrap_or(Value::Null));
            }
            row.insert(report.count_as.clone(), aggregate);
            out.push(row);
        }
        Ok(out)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
