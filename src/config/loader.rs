//! Load the catalog from a JSON file or the embedded warehouse catalog, and resolve it.

use crate::config::resolved::{
    foreign_key_constraint_name, unique_constraint_name, ColumnInfo, ForeignKey, PkType, ResolvedEntity,
    ResolvedModel, ResolvedReport, UniqueConstraint,
};
use crate::config::types::*;
use crate::config::{creation_order, validate};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../../catalog/warehouse.json");

/// The warehouse-domain catalog shipped with the crate.
pub fn builtin_catalog() -> Result<CatalogConfig, ConfigError> {
    serde_json::from_str(BUILTIN_CATALOG).map_err(|e| ConfigError::Load(format!("builtin catalog: {}", e)))
}

pub async fn load_from_path(path: &Path) -> Result<CatalogConfig, ConfigError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// Build resolved model from the catalog (validates first).
pub fn resolve(config: &CatalogConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;
    let by_name: HashMap<&str, &EntityConfig> = config.entities.iter().map(|e| (e.name.as_str(), e)).collect();

    let mut entities = Vec::with_capacity(config.entities.len());
    let mut entity_by_path = HashMap::new();

    for e in creation_order(config)? {
        let entity = resolve_entity(&config.schema, e, &by_name)?;
        entity_by_path.insert(entity.path_segment.clone(), entity.clone());
        entities.push(entity);
    }

    tracing::debug!(entities = entities.len(), "catalog resolved");
    Ok(ResolvedModel {
        entities,
        entity_by_path,
    })
}

fn pk_type(ty: &PkTypeConfig) -> PkType {
    match ty {
        PkTypeConfig::Serial => PkType::Serial,
        PkTypeConfig::Uuid => PkType::Uuid,
        PkTypeConfig::Text => PkType::Text,
    }
}

fn resolve_entity(
    schema: &str,
    e: &EntityConfig,
    by_name: &HashMap<&str, &EntityConfig>,
) -> Result<ResolvedEntity, ConfigError> {
    let pk_type = pk_type(&e.primary_key.type_);
    let mut columns = Vec::with_capacity(e.fields.len() + 2);
    columns.push(ColumnInfo {
        name: e.primary_key.column.clone(),
        field_type: match pk_type {
            PkType::Serial => FieldType::Integer,
            PkType::Uuid | PkType::Text => FieldType::Text,
        },
        nullable: false,
        is_pk: true,
        is_version: false,
        pg_type: pk_type.pg_cast().to_string(),
    });
    for f in &e.fields {
        columns.push(ColumnInfo {
            name: f.name.clone(),
            field_type: f.type_,
            nullable: f.nullable,
            is_pk: false,
            is_version: false,
            pg_type: f.type_.pg_cast().to_string(),
        });
    }
    if let Some(vc) = &e.version_column {
        columns.push(ColumnInfo {
            name: vc.clone(),
            field_type: FieldType::Integer,
            nullable: false,
            is_pk: false,
            is_version: true,
            pg_type: FieldType::Integer.pg_cast().to_string(),
        });
    }

    let unique = e
        .unique
        .iter()
        .map(|col| UniqueConstraint {
            column: col.clone(),
            constraint: unique_constraint_name(&e.name, col),
        })
        .collect();

    let mut foreign_keys = Vec::with_capacity(e.foreign_keys.len());
    for fk in &e.foreign_keys {
        let target = by_name.get(fk.references.as_str()).ok_or_else(|| ConfigError::MissingReference {
            kind: "entity",
            id: fk.references.clone(),
        })?;
        foreign_keys.push(ForeignKey {
            column: fk.column.clone(),
            constraint: foreign_key_constraint_name(&e.name, &fk.column),
            references_table: target.name.clone(),
            references_column: target.primary_key.column.clone(),
            references_path: target.path_segment.clone(),
            on_delete: fk.on_delete.clone().unwrap_or_else(|| "RESTRICT".into()),
        });
    }

    let mut reports = Vec::with_capacity(e.reports.len());
    for r in &e.reports {
        let child = by_name.get(r.child.as_str()).ok_or_else(|| ConfigError::MissingReference {
            kind: "entity",
            id: r.child.clone(),
        })?;
        let sum_column = match &r.sum_column {
            Some(col) => {
                let field = child.field(col).ok_or_else(|| ConfigError::UnknownColumn {
                    entity: child.name.clone(),
                    column: col.clone(),
                })?;
                Some((col.clone(), field.type_))
            }
            None => None,
        };
        reports.push(ResolvedReport {
            name: r.name.clone(),
            child_table: child.name.clone(),
            child_pk: child.primary_key.column.clone(),
            foreign_key: r.foreign_key.clone(),
            columns: r.columns.clone(),
            count_as: r.count_as.clone(),
            sum_column,
        });
    }

    let mut patterns = HashMap::new();
    for f in &e.fields {
        if let Some(pattern) = &f.validation.pattern {
            let re = Regex::new(pattern)
                .map_err(|err| ConfigError::Validation(format!("{}.{}: invalid pattern: {}", e.name, f.name, err)))?;
            patterns.insert(f.name.clone(), re);
        }
    }

    Ok(ResolvedEntity {
        schema_name: schema.to_string(),
        table_name: e.name.clone(),
        path_segment: e.path_segment.clone(),
        pk_column: e.primary_key.column.clone(),
        pk_type,
        columns,
        unique,
        foreign_keys,
        reports,
        operations: e.operations.clone(),
        validation: e.validation(),
        patterns,
        version_column: e.version_column.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_resolves() {
        let model = resolve(&builtin_catalog().unwrap()).unwrap();
        for path in [
            "sellers",
            "products",
            "sections",
            "buyers",
            "carriers",
            "purchase-orders",
            "inbound-orders",
            "localities",
            "employees",
            "warehouses",
            "product-batches",
            "product-records",
            "product-types",
        ] {
            assert!(model.entity_by_path(path).is_some(), "missing {path}");
        }

        let employees = model.entity_by_path("employees").unwrap();
        let fk = employees.foreign_key_for("employees_warehouse_id_fkey").unwrap();
        assert_eq!(fk.references_path, "warehouses");
        assert_eq!(employees.unique_column_for("employees_card_number_id_key"), Some("card_number_id"));
    }

    #[test]
    fn referenced_entities_resolve_first() {
        let model = resolve(&builtin_catalog().unwrap()).unwrap();
        let position = |table: &str| model.entities.iter().position(|e| e.table_name == table).unwrap();
        assert!(position("localities") < position("sellers"));
        assert!(position("warehouses") < position("employees"));
        assert!(position("product_batches") < position("inbound_orders"));
    }

    #[test]
    fn text_keys_are_caller_supplied() {
        let model = resolve(&builtin_catalog().unwrap()).unwrap();
        let localities = model.entity_by_path("localities").unwrap();
        assert_eq!(localities.pk_type, PkType::Text);
        assert!(!localities.pk_type.storage_assigned());
        assert!(localities.report("sellers").is_some());
    }
}
