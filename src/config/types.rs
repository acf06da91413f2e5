//! Raw catalog types matching the JSON catalog document.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Operations an entity may expose. Unlisted operations are rejected with 400.
pub const KNOWN_OPERATIONS: &[&str] = &["create", "read", "update", "delete", "report"];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub entities: Vec<EntityConfig>,
}

fn default_schema() -> String {
    "public".into()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PkTypeConfig {
    /// BIGSERIAL, assigned by storage.
    Serial,
    /// UUID, assigned by storage (gen_random_uuid()).
    Uuid,
    /// Caller-supplied text key.
    Text,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrimaryKeyConfig {
    #[serde(default = "default_pk_column")]
    pub column: String,
    #[serde(rename = "type", default = "default_pk_type")]
    pub type_: PkTypeConfig,
}

impl Default for PrimaryKeyConfig {
    fn default() -> Self {
        PrimaryKeyConfig {
            column: default_pk_column(),
            type_: default_pk_type(),
        }
    }
}

fn default_pk_column() -> String {
    "id".into()
}

fn default_pk_type() -> PkTypeConfig {
    PkTypeConfig::Serial
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
}

impl FieldType {
    /// Column type used in DDL.
    pub fn ddl_type(&self) -> &'static str {
        match self {
            FieldType::Text => "TEXT",
            FieldType::Integer => "BIGINT",
            FieldType::Float => "DOUBLE PRECISION",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Date => "DATE",
            FieldType::Datetime => "TIMESTAMP",
        }
    }

    /// Type name for parameter casts (`$1::int8`).
    pub fn pg_cast(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Integer => "int8",
            FieldType::Float => "float8",
            FieldType::Boolean => "bool",
            FieldType::Date => "date",
            FieldType::Datetime => "timestamp",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Float)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: FieldType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub validation: ValidationRule,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForeignKeyConfig {
    pub column: String,
    /// Entity name (table) of the referenced entity; the reference targets its primary key.
    pub references: String,
    #[serde(default)]
    pub on_delete: Option<String>,
}

/// Child-count report exposed on the parent entity, e.g. sellers per locality.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportConfig {
    pub name: String,
    /// Entity name of the child table.
    pub child: String,
    /// Child column referencing the parent's primary key.
    pub foreign_key: String,
    /// Parent columns echoed in each report row.
    #[serde(default)]
    pub columns: Vec<String>,
    pub count_as: String,
    /// When set, the aggregate is SUM(child.sum_column) instead of a row count.
    #[serde(default)]
    pub sum_column: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Table name; also how other entities reference this one.
    pub name: String,
    pub path_segment: String,
    #[serde(default)]
    pub primary_key: PrimaryKeyConfig,
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub unique: Vec<String>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyConfig>,
    #[serde(default)]
    pub reports: Vec<ReportConfig>,
    #[serde(default = "default_operations")]
    pub operations: Vec<String>,
    /// Enables optimistic concurrency on update when set.
    #[serde(default)]
    pub version_column: Option<String>,
}

fn default_operations() -> Vec<String> {
    KNOWN_OPERATIONS.iter().map(|s| s.to_string()).collect()
}

impl EntityConfig {
    pub fn field(&self, name: &str) -> Option<&FieldConfig> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn validation(&self) -> HashMap<String, ValidationRule> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.validation.clone()))
            .collect()
    }
}
