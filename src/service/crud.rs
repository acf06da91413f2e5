//! Entity service: validated CRUD for one resolved entity over a storage gateway.

use crate::config::ResolvedEntity;
use crate::error::{AppError, StorageError};
use crate::gateway::{Record, StorageGateway};
use serde_json::Value;

pub struct EntityService<'a> {
    gateway: &'a dyn StorageGateway,
    entity: &'a ResolvedEntity,
}

/// Text form of an identity, so `7` and `"7"` compare equal.
fn identity_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `id == 0` / empty id selects the aggregate path of a report.
fn is_all_sentinel(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Number(n) => n.as_i64() == Some(0),
        Value::String(s) => s.is_empty() || s == "0",
        _ => false,
    }
}

impl<'a> EntityService<'a> {
    pub fn new(gateway: &'a dyn StorageGateway, entity: &'a ResolvedEntity) -> Self {
        EntityService { gateway, entity }
    }

    pub fn entity(&self) -> &ResolvedEntity {
        self.entity
    }

    fn not_found(&self, id: &Value) -> AppError {
        AppError::NotFound(format!("{} '{}'", self.entity.path_segment, identity_text(id)))
    }

    fn conflict(&self, column: &str, value: Option<&Value>) -> AppError {
        let message = match value {
            Some(v) => format!("{} with {} {} already exists", self.entity.path_segment, column, v),
            None => format!("{} with this {} already exists", self.entity.path_segment, column),
        };
        AppError::Conflict {
            message,
            field: Some(column.to_string()),
        }
    }

    /// Map a failed write onto the domain vocabulary, naming the field or reference when the
    /// constraint is one this entity declares.
    fn write_error(&self, err: StorageError, record: &Record) -> AppError {
        match err {
            StorageError::UniqueViolation { constraint } => {
                match constraint.as_deref().and_then(|c| self.entity.unique_column_for(c)) {
                    Some(column) => self.conflict(column, record.get(column)),
                    None => AppError::Conflict {
                        message: format!("{} violates a uniqueness constraint", self.entity.path_segment),
                        field: None,
                    },
                }
            }
            StorageError::ForeignKeyViolation { constraint } => {
                match constraint.as_deref().and_then(|c| self.entity.foreign_key_for(c)) {
                    Some(fk) => AppError::ReferencedEntityNotFound {
                        message: format!(
                            "{} {} does not exist",
                            fk.references_path,
                            record.get(&fk.column).map(identity_text).unwrap_or_default()
                        ),
                        column: Some(fk.column.clone()),
                        entity: Some(fk.references_path.clone()),
                    },
                    None => AppError::ReferencedEntityNotFound {
                        message: format!("{} references a missing entity", self.entity.path_segment),
                        column: None,
                        entity: None,
                    },
                }
            }
            other => AppError::Storage(other),
        }
    }

    /// Probe every declared unique field present in `record`; `exclude` is the record's own id.
    async fn check_unique(&self, record: &Record, exclude: Option<&Value>) -> Result<(), AppError> {
        for u in &self.entity.unique {
            let Some(value) = record.get(&u.column).filter(|v| !v.is_null()) else {
                continue;
            };
            if self.gateway.exists_by_field(self.entity, &u.column, value, exclude).await? {
                tracing::warn!(entity = %self.entity.path_segment, field = %u.column, "unique value already taken");
                return Err(self.conflict(&u.column, Some(value)));
            }
        }
        Ok(())
    }

    pub async fn create(&self, mut candidate: Record) -> Result<Record, AppError> {
        let pk = &self.entity.pk_column;
        if self.entity.pk_type.storage_assigned() {
            candidate.remove(pk);
        } else {
            let id = candidate
                .get(pk)
                .filter(|v| !v.is_null())
                .cloned()
                .ok_or_else(|| AppError::Validation(format!("{} is required", pk)))?;
            if self.gateway.fetch_by_id(self.entity, &id).await?.is_some() {
                return Err(self.conflict(pk, Some(&id)));
            }
        }
        self.check_unique(&candidate, None).await?;

        let id = self
            .gateway
            .insert(self.entity, &candidate)
            .await
            .map_err(|e| self.write_error(e, &candidate))?;
        tracing::debug!(entity = %self.entity.path_segment, id = %identity_text(&id), "created");

        let stored = self.gateway.fetch_by_id(self.entity, &id).await?;
        Ok(stored.unwrap_or_else(|| {
            candidate.insert(pk.clone(), id);
            candidate
        }))
    }

    pub async fn get(&self, id: &Value) -> Result<Record, AppError> {
        self.gateway
            .fetch_by_id(self.entity, id)
            .await?
            .ok_or_else(|| self.not_found(id))
    }

    pub async fn get_all(&self) -> Result<Vec<Record>, AppError> {
        Ok(self.gateway.fetch_all(self.entity).await?)
    }

    /// Fetch, merge the patch over the stored record, re-check uniqueness against other
    /// records, then write the whole record back.
    pub async fn update(&self, id: &Value, patch: Record) -> Result<Record, AppError> {
        let current = self.get(id).await?;
        let pk = &self.entity.pk_column;

        if let Some(sent) = patch.get(pk).filter(|v| !v.is_null()) {
            let stored = current.get(pk).map(identity_text);
            if stored.as_deref() != Some(identity_text(sent).as_str()) {
                return Err(AppError::IdentityImmutable { column: pk.clone() });
            }
        }

        let version_column = self.entity.version_column.as_deref();
        let expected_version = match version_column {
            Some(vc) => {
                let stored = current.get(vc).and_then(Value::as_i64);
                if let Some(sent) = patch.get(vc).filter(|v| !v.is_null()) {
                    if sent.as_i64() != stored {
                        return Err(AppError::StaleWrite(format!(
                            "{} '{}' is at version {}",
                            self.entity.path_segment,
                            identity_text(id),
                            stored.unwrap_or_default()
                        )));
                    }
                }
                stored
            }
            None => None,
        };

        let mut merged = current;
        for (k, v) in patch {
            if self.entity.column(&k).is_some_and(|c| c.writable()) {
                merged.insert(k, v);
            }
        }

        self.check_unique(&merged, Some(id)).await?;

        let affected = self
            .gateway
            .update(self.entity, id, &merged, expected_version)
            .await
            .map_err(|e| self.write_error(e, &merged))?;
        if affected == 0 {
            if expected_version.is_some() && self.gateway.fetch_by_id(self.entity, id).await?.is_some() {
                return Err(AppError::StaleWrite(format!(
                    "{} '{}' changed concurrently",
                    self.entity.path_segment,
                    identity_text(id)
                )));
            }
            return Err(self.not_found(id));
        }
        self.get(id).await
    }

    pub async fn delete(&self, id: &Value) -> Result<(), AppError> {
        match self.gateway.delete_by_id(self.entity, id).await {
            Ok(()) => Ok(()),
            Err(StorageError::NotFound) => Err(self.not_found(id)),
            Err(StorageError::ForeignKeyViolation { constraint }) => Err(AppError::Conflict {
                message: format!(
                    "{} '{}' is still referenced ({})",
                    self.entity.path_segment,
                    identity_text(id),
                    constraint.as_deref().unwrap_or("foreign key")
                ),
                field: None,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Dual-mode report: no id (or id 0) reports every parent, otherwise the one parent.
    pub async fn report(&self, name: &str, id: Option<&Value>) -> Result<Vec<Record>, AppError> {
        let report = self
            .entity
            .report(name)
            .ok_or_else(|| AppError::NotFound(format!("report '{}' on {}", name, self.entity.path_segment)))?;
        let id = id.filter(|v| !is_all_sentinel(v));
        if let Some(id) = id {
            self.get(id).await?;
        }
        Ok(self.gateway.report(self.entity, report, id).await?)
    }
}
