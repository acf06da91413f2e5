//! Builds parameterized SELECT, INSERT, UPDATE, DELETE and report queries from a resolved entity.

use crate::config::{FieldType, ResolvedEntity, ResolvedReport};
use super::params::{BindType, PgBindValue};
use crate::gateway::Record;
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from catalog).
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub(crate) fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

fn entity_table(entity: &ResolvedEntity) -> String {
    qualified_table(&entity.schema_name, &entity.table_name)
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value bound as the cast's type and return its placeholder (`$n::type`).
    fn push_param(&mut self, v: Value, cast: &str) -> String {
        self.params.push(PgBindValue::new(v, BindType::for_cast(cast)));
        format!("${}::{}", self.params.len(), cast)
    }
}

fn select_column_list(entity: &ResolvedEntity) -> String {
    entity
        .columns
        .iter()
        .map(|c| quoted(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// SELECT by primary key.
pub fn select_by_id(entity: &ResolvedEntity, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_param(id.clone(), entity.pk_type.pg_cast());
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(entity),
        entity_table(entity),
        quoted(&entity.pk_column),
        ph
    );
    q
}

/// SELECT every row, ordered by primary key.
pub fn select_all(entity: &ResolvedEntity) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!(
        "SELECT {} FROM {} ORDER BY {}",
        select_column_list(entity),
        entity_table(entity),
        quoted(&entity.pk_column)
    );
    q
}

/// Existence check on one column; `exclude_id` skips the row being updated.
pub fn exists_by_column(entity: &ResolvedEntity, column: &str, value: &Value, exclude_id: Option<&Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cast = entity.column(column).map(|c| c.pg_type.clone()).unwrap_or_else(|| "text".into());
    let ph = q.push_param(value.clone(), &cast);
    let mut sql = format!(
        "SELECT 1 FROM {} WHERE {} = {}",
        entity_table(entity),
        quoted(column),
        ph
    );
    if let Some(id) = exclude_id {
        let id_ph = q.push_param(id.clone(), entity.pk_type.pg_cast());
        sql.push_str(&format!(" AND {} <> {}", quoted(&entity.pk_column), id_ph));
    }
    sql.push_str(" LIMIT 1");
    q.sql = sql;
    q
}

/// INSERT every writable column (absent values bind NULL). Caller-supplied keys are
/// included; storage-assigned keys and the version column take their defaults.
pub fn insert(entity: &ResolvedEntity, record: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        if c.is_version || (c.is_pk && entity.pk_type.storage_assigned()) {
            continue;
        }
        let val = record.get(&c.name).cloned().unwrap_or(Value::Null);
        placeholders.push(q.push_param(val, &c.pg_type));
        cols.push(quoted(&c.name));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        entity_table(entity),
        cols.join(", "),
        placeholders.join(", "),
        quoted(&entity.pk_column)
    );
    q
}

/// UPDATE the whole record by id. With `expected_version` the write only lands if the
/// stored version still matches, and the version is bumped.
pub fn update(entity: &ResolvedEntity, id: &Value, record: &Record, expected_version: Option<i64>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in entity.writable_columns() {
        let val = record.get(&c.name).cloned().unwrap_or(Value::Null);
        let rhs = q.push_param(val, &c.pg_type);
        sets.push(format!("{} = {}", quoted(&c.name), rhs));
    }
    let version = entity.version_column.as_deref();
    if let Some(vc) = version {
        sets.push(format!("{0} = {0} + 1", quoted(vc)));
    }
    let id_ph = q.push_param(id.clone(), entity.pk_type.pg_cast());
    let mut sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        entity_table(entity),
        sets.join(", "),
        quoted(&entity.pk_column),
        id_ph
    );
    if let (Some(vc), Some(expected)) = (version, expected_version) {
        let v_ph = q.push_param(Value::from(expected), FieldType::Integer.pg_cast());
        sql.push_str(&format!(" AND {} = {}", quoted(vc), v_ph));
    }
    q.sql = sql;
    q
}

/// DELETE by id.
pub fn delete(entity: &ResolvedEntity, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_param(id.clone(), entity.pk_type.pg_cast());
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        entity_table(entity),
        quoted(&entity.pk_column),
        ph
    );
    q
}

/// Child aggregate per parent row: parent key, echoed parent columns, and COUNT or SUM of
/// the children under `count_as`. Parents without children report 0.
pub fn report(entity: &ResolvedEntity, report: &ResolvedReport, id: Option<&Value>) -> QueryBuf {
    const PARENT: &str = "p";
    const CHILD: &str = "c";
    let mut q = QueryBuf::new();
    let pk = format!("{}.{}", PARENT, quoted(&entity.pk_column));

    let mut group_by = vec![pk.clone()];
    for col in &report.columns {
        group_by.push(format!("{}.{}", PARENT, quoted(col)));
    }
    let aggregate = match &report.sum_column {
        Some((col, ty)) => format!(
            "COALESCE(SUM({}.{}), 0)::{}",
            CHILD,
            quoted(col),
            ty.pg_cast()
        ),
        None => format!("COUNT({}.{})", CHILD, quoted(&report.child_pk)),
    };
    let mut select_parts = group_by.clone();
    select_parts.push(format!("{} AS {}", aggregate, quoted(&report.count_as)));

    let where_clause = match id {
        Some(id) => format!(" WHERE {} = {}", pk, q.push_param(id.clone(), entity.pk_type.pg_cast())),
        None => String::new(),
    };

    q.sql = format!(
        "SELECT {} FROM {} {} LEFT JOIN {} {} ON {}.{} = {}{} GROUP BY {} ORDER BY {}",
        select_parts.join(", "),
        entity_table(entity),
        PARENT,
        qualified_table(&entity.schema_name, &report.child_table),
        CHILD,
        CHILD,
        quoted(&report.foreign_key),
        pk,
        where_clause,
        group_by.join(", "),
        pk
    );
    q
}
