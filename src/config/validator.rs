//! Catalog validation: referential integrity and API consistency.

use crate::config::{CatalogConfig, EntityConfig, KNOWN_OPERATIONS};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

pub fn validate(config: &CatalogConfig) -> Result<(), ConfigError> {
    let by_name: HashMap<&str, &EntityConfig> = config.entities.iter().map(|e| (e.name.as_str(), e)).collect();
    if by_name.len() != config.entities.len() {
        let mut seen = HashSet::new();
        for e in &config.entities {
            if !seen.insert(e.name.as_str()) {
                return Err(ConfigError::DuplicateEntity(e.name.clone()));
            }
        }
    }

    let mut path_segments = HashSet::new();
    for e in &config.entities {
        if !path_segments.insert(e.path_segment.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(e.path_segment.clone()));
        }
        validate_entity(e, &by_name)?;
    }

    creation_order(config)?;
    Ok(())
}

fn unknown_column(entity: &EntityConfig, column: &str) -> ConfigError {
    ConfigError::UnknownColumn {
        entity: entity.name.clone(),
        column: column.to_string(),
    }
}

fn validate_entity(e: &EntityConfig, by_name: &HashMap<&str, &EntityConfig>) -> Result<(), ConfigError> {
    let mut field_names = HashSet::new();
    for f in &e.fields {
        if f.name == e.primary_key.column {
            return Err(ConfigError::Validation(format!(
                "{}: primary key '{}' must not be listed as a field",
                e.name, f.name
            )));
        }
        if !field_names.insert(f.name.as_str()) {
            return Err(ConfigError::Validation(format!("{}: duplicate field '{}'", e.name, f.name)));
        }
    }

    if let Some(vc) = &e.version_column {
        if field_names.contains(vc.as_str()) || *vc == e.primary_key.column {
            return Err(ConfigError::Validation(format!(
                "{}: version column '{}' clashes with a field",
                e.name, vc
            )));
        }
    }

    for col in &e.unique {
        if !field_names.contains(col.as_str()) {
            return Err(unknown_column(e, col));
        }
    }

    for fk in &e.foreign_keys {
        if !field_names.contains(fk.column.as_str()) {
            return Err(unknown_column(e, &fk.column));
        }
        if !by_name.contains_key(fk.references.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "entity",
                id: fk.references.clone(),
            });
        }
    }

    for report in &e.reports {
        let child = by_name.get(report.child.as_str()).ok_or_else(|| ConfigError::MissingReference {
            kind: "entity",
            id: report.child.clone(),
        })?;
        let points_back = child
            .foreign_keys
            .iter()
            .any(|fk| fk.column == report.foreign_key && fk.references == e.name);
        if !points_back {
            return Err(ConfigError::Validation(format!(
                "{}: report '{}' needs {}.{} to reference {}",
                e.name, report.name, child.name, report.foreign_key, e.name
            )));
        }
        for col in &report.columns {
            if !field_names.contains(col.as_str()) {
                return Err(unknown_column(e, col));
            }
        }
        if let Some(sum) = &report.sum_column {
            match child.field(sum) {
                Some(f) if f.type_.is_numeric() => {}
                Some(_) => {
                    return Err(ConfigError::Validation(format!(
                        "{}: report '{}' sums non-numeric column {}.{}",
                        e.name, report.name, child.name, sum
                    )))
                }
                None => return Err(unknown_column(child, sum)),
            }
        }
    }

    for op in &e.operations {
        if !KNOWN_OPERATIONS.contains(&op.as_str()) {
            return Err(ConfigError::Validation(format!("{}: unknown operation '{}'", e.name, op)));
        }
    }

    for f in &e.fields {
        if let Some(pattern) = &f.validation.pattern {
            regex::Regex::new(pattern)
                .map_err(|err| ConfigError::Validation(format!("{}.{}: invalid pattern: {}", e.name, f.name, err)))?;
        }
    }

    Ok(())
}

/// Entities ordered so every referenced entity precedes its referrers. Self references are ignored.
pub fn creation_order(config: &CatalogConfig) -> Result<Vec<&EntityConfig>, ConfigError> {
    let mut ordered: Vec<&EntityConfig> = Vec::with_capacity(config.entities.len());
    let mut placed: HashSet<&str> = HashSet::new();
    let mut pending: Vec<&EntityConfig> = config.entities.iter().collect();

    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|&e| {
            let ready = e
                .foreign_keys
                .iter()
                .all(|fk| fk.references == e.name || placed.contains(fk.references.as_str()));
            if ready {
                placed.insert(e.name.as_str());
                ordered.push(e);
            }
            !ready
        });
        if pending.len() == before {
            let names: Vec<&str> = pending.iter().map(|e| e.name.as_str()).collect();
            return Err(ConfigError::Validation(format!(
                "foreign key cycle between: {}",
                names.join(", ")
            )));
        }
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog(value: serde_json::Value) -> CatalogConfig {
        serde_json::from_value(value).unwrap()
    }

    fn two_entities() -> serde_json::Value {
        json!({
            "entities": [
                {
                    "name": "employees",
                    "path_segment": "employees",
                    "fields": [
                        { "name": "card_number_id", "type": "text" },
                        { "name": "warehouse_id", "type": "integer" }
                    ],
                    "unique": ["card_number_id"],
                    "foreign_keys": [{ "column": "warehouse_id", "references": "warehouses" }]
                },
                {
                    "name": "warehouses",
                    "path_segment": "warehouses",
                    "fields": [{ "name": "warehouse_code", "type": "text" }],
                    "reports": [{
                        "name": "employees",
                        "child": "employees",
                        "foreign_key": "warehouse_id",
                        "columns": ["warehouse_code"],
                        "count_as": "employees_count"
                    }]
                }
            ]
        })
    }

    #[test]
    fn accepts_consistent_catalog_and_orders_dependencies() {
        let config = catalog(two_entities());
        validate(&config).unwrap();
        let order: Vec<&str> = creation_order(&config).unwrap().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(order, vec!["warehouses", "employees"]);
    }

    #[test]
    fn rejects_reference_to_unknown_entity() {
        let mut value = two_entities();
        value["entities"][0]["foreign_keys"][0]["references"] = json!("depots");
        let err = validate(&catalog(value)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingReference { kind: "entity", .. }));
    }

    #[test]
    fn rejects_unique_on_unknown_column() {
        let mut value = two_entities();
        value["entities"][0]["unique"] = json!(["badge"]);
        let err = validate(&catalog(value)).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownColumn { .. }));
    }

    #[test]
    fn rejects_duplicate_path_segment() {
        let mut value = two_entities();
        value["entities"][1]["path_segment"] = json!("employees");
        let err = validate(&catalog(value)).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicatePathSegment(_)));
    }

    #[test]
    fn rejects_report_without_back_reference() {
        let mut value = two_entities();
        value["entities"][1]["reports"][0]["foreign_key"] = json!("card_number_id");
        assert!(validate(&catalog(value)).is_err());
    }

    #[test]
    fn rejects_foreign_key_cycle() {
        let value = json!({
            "entities": [
                {
                    "name": "a", "path_segment": "a",
                    "fields": [{ "name": "b_id", "type": "integer" }],
                    "foreign_keys": [{ "column": "b_id", "references": "b" }]
                },
                {
                    "name": "b", "path_segment": "b",
                    "fields": [{ "name": "a_id", "type": "integer" }],
                    "foreign_keys": [{ "column": "a_id", "references": "a" }]
                }
            ]
        });
        let err = validate(&catalog(value)).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }
}
