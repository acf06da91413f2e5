//! Apply the resolved model to the database: schema, then one table per entity with its
//! unique and foreign-key constraints, referenced tables first.

use crate::config::{PkType, ResolvedEntity, ResolvedModel};
use crate::error::{AppError, StorageError};
use crate::sql::{qualified_table, quoted};
use sqlx::PgPool;

/// Idempotent: every statement is `IF NOT EXISTS`, so existing tables are left untouched.
pub async fn apply_migrations(pool: &PgPool, model: &ResolvedModel) -> Result<(), AppError> {
    let mut schemas: Vec<&str> = model.entities.iter().map(|e| e.schema_name.as_str()).collect();
    schemas.dedup();
    for schema in schemas {
        let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema));
        tracing::debug!(sql = %sql, "migration");
        sqlx::query(&sql).execute(pool).await.map_err(StorageError::from)?;
    }

    for entity in &model.entities {
        let sql = create_table_sql(entity);
        tracing::debug!(sql = %sql, "migration");
        sqlx::query(&sql).execute(pool).await.map_err(StorageError::from)?;
    }
    tracing::info!(tables = model.entities.len(), "migrations applied");
    Ok(())
}

fn create_table_sql(entity: &ResolvedEntity) -> String {
    let mut defs: Vec<String> = Vec::new();
    for c in &entity.columns {
        let def = if c.is_pk {
            match entity.pk_type {
                PkType::Serial => format!("{} BIGSERIAL", quoted(&c.name)),
                PkType::Uuid => format!("{} UUID NOT NULL DEFAULT gen_random_uuid()", quoted(&c.name)),
                PkType::Text => format!("{} TEXT NOT NULL", quoted(&c.name)),
            }
        } else if c.is_version {
            format!("{} BIGINT NOT NULL DEFAULT 1", quoted(&c.name))
        } else {
            let null = if c.nullable { "" } else { " NOT NULL" };
            format!("{} {}{}", quoted(&c.name), c.field_type.ddl_type(), null)
        };
        defs.push(def);
    }

    defs.push(format!(
        "CONSTRAINT {} PRIMARY KEY ({})",
        quoted(&entity.pk_constraint()),
        quoted(&entity.pk_column)
    ));
    for u in &entity.unique {
        defs.push(format!("CONSTRAINT {} UNIQUE ({})", quoted(&u.constraint), quoted(&u.column)));
    }
    for fk in &entity.foreign_keys {
        defs.push(format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
            quoted(&fk.constraint),
            quoted(&fk.column),
            qualified_table(&entity.schema_name, &fk.references_table),
            quoted(&fk.references_column),
            fk.on_delete
        ));
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified_table(&entity.schema_name, &entity.table_name),
        defs.join(",\n  ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_catalog, resolve};

    #[test]
    fn employees_table_declares_named_constraints() {
        let model = resolve(&builtin_catalog().unwrap()).unwrap();
        let sql = create_table_sql(model.entity_by_path("employees").unwrap());
        assert!(sql.starts_with(r#"CREATE TABLE IF NOT EXISTS "public"."employees""#));
        assert!(sql.contains(r#""id" BIGSERIAL"#));
        assert!(sql.contains(r#"CONSTRAINT "employees_pkey" PRIMARY KEY ("id")"#));
        assert!(sql.contains(r#"CONSTRAINT "employees_card_number_id_key" UNIQUE ("card_number_id")"#));
        assert!(sql.contains(
            r#"CONSTRAINT "employees_warehouse_id_fkey" FOREIGN KEY ("warehouse_id") REFERENCES "public"."warehouses" ("id") ON DELETE RESTRICT"#
        ));
    }

    #[test]
    fn text_keys_and_versions_get_their_columns() {
        let model = resolve(&builtin_catalog().unwrap()).unwrap();
        let localities = create_table_sql(model.entity_by_path("localities").unwrap());
        assert!(localities.contains(r#""id" TEXT NOT NULL"#));
        let sections = create_table_sql(model.entity_by_path("sections").unwrap());
        assert!(sections.contains(r#""version" BIGINT NOT NULL DEFAULT 1"#));
        let products = create_table_sql(model.entity_by_path("products").unwrap());
        assert!(products.contains(r#""seller_id" BIGINT,"#));
    }
}
