//! Resolved entity model: catalog validated and flattened for runtime use.

use crate::config::{FieldType, ValidationRule};
use regex::Regex;
use std::collections::HashMap;

/// Primary key type for parsing path/body ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PkType {
    Serial,
    Uuid,
    Text,
}

impl PkType {
    pub fn pg_cast(&self) -> &'static str {
        match self {
            PkType::Serial => "int8",
            PkType::Uuid => "uuid",
            PkType::Text => "text",
        }
    }

    /// Whether storage assigns the key on insert.
    pub fn storage_assigned(&self) -> bool {
        !matches!(self, PkType::Text)
    }
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub is_pk: bool,
    /// Maintained by storage (version column); never written from a request body.
    pub is_version: bool,
    /// Cast applied to bound parameters (e.g. "date").
    pub pg_type: String,
}

impl ColumnInfo {
    pub fn writable(&self) -> bool {
        !self.is_pk && !self.is_version
    }
}

#[derive(Clone, Debug)]
pub struct UniqueConstraint {
    pub column: String,
    pub constraint: String,
}

#[derive(Clone, Debug)]
pub struct ForeignKey {
    pub column: String,
    pub constraint: String,
    pub references_table: String,
    pub references_column: String,
    /// Path segment of the referenced entity, reported back to clients.
    pub references_path: String,
    pub on_delete: String,
}

#[derive(Clone, Debug)]
pub struct ResolvedReport {
    pub name: String,
    pub child_table: String,
    pub child_pk: String,
    pub foreign_key: String,
    pub columns: Vec<String>,
    pub count_as: String,
    pub sum_column: Option<(String, FieldType)>,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub schema_name: String,
    pub table_name: String,
    pub path_segment: String,
    pub pk_column: String,
    pub pk_type: PkType,
    /// Primary key first, then fields in catalog order, then the version column.
    pub columns: Vec<ColumnInfo>,
    pub unique: Vec<UniqueConstraint>,
    pub foreign_keys: Vec<ForeignKey>,
    pub reports: Vec<ResolvedReport>,
    pub operations: Vec<String>,
    pub validation: HashMap<String, ValidationRule>,
    /// `pattern` rules compiled once at resolve time, by field name.
    pub patterns: HashMap<String, Regex>,
    pub version_column: Option<String>,
}

impl ResolvedEntity {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn writable_columns(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter().filter(|c| c.writable())
    }

    pub fn allows(&self, operation: &str) -> bool {
        self.operations.iter().any(|o| o == operation)
    }

    pub fn report(&self, name: &str) -> Option<&ResolvedReport> {
        self.reports.iter().find(|r| r.name == name)
    }

    pub fn pk_constraint(&self) -> String {
        format!("{}_pkey", self.table_name)
    }

    /// Column guarded by the named unique constraint (primary key included).
    pub fn unique_column_for(&self, constraint: &str) -> Option<&str> {
        if constraint == self.pk_constraint() {
            return Some(&self.pk_column);
        }
        self.unique
            .iter()
            .find(|u| u.constraint == constraint)
            .map(|u| u.column.as_str())
    }

    pub fn foreign_key_for(&self, constraint: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.constraint == constraint)
    }
}

/// Constraint name used for a single-column unique constraint (PostgreSQL's default naming).
pub fn unique_constraint_name(table: &str, column: &str) -> String {
    format!("{}_{}_key", table, column)
}

/// Constraint name used for a single-column foreign key (PostgreSQL's default naming).
pub fn foreign_key_constraint_name(table: &str, column: &str) -> String {
    format!("{}_{}_fkey", table, column)
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    /// Referenced entities come before the entities that reference them.
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_path: HashMap<String, ResolvedEntity>,
}

impl ResolvedModel {
    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.entity_by_path.get(path)
    }

    pub fn entity_by_table(&self, table: &str) -> Option<&ResolvedEntity> {
        self.entities.iter().find(|e| e.table_name == table)
    }

    /// Foreign keys elsewhere in the model that point at `table`, with their owning entity.
    pub fn references_to<'a>(&'a self, table: &'a str) -> impl Iterator<Item = (&'a ResolvedEntity, &'a ForeignKey)> + 'a {
        self.entities.iter().flat_map(move |e| {
            e.foreign_keys
                .iter()
                .filter(move |fk| fk.references_table == table)
                .map(move |fk| (e, fk))
        })
    }
}
