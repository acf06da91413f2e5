//! Shared application state for all routes.

use crate::config::{ResolvedEntity, ResolvedModel};
use crate::error::AppError;
use crate::gateway::StorageGateway;
use crate::service::EntityService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn StorageGateway>,
    pub model: Arc<ResolvedModel>,
}

impl AppState {
    pub fn new(gateway: Arc<dyn StorageGateway>, model: Arc<ResolvedModel>) -> Self {
        AppState { gateway, model }
    }

    /// Entity behind a path segment, if the operation is enabled for it.
    pub fn entity_for(&self, path_segment: &str, operation: &str) -> Result<&ResolvedEntity, AppError> {
        let entity = self
            .model
            .entity_by_path(path_segment)
            .ok_or_else(|| AppError::NotFound(format!("resource '{}'", path_segment)))?;
        if !entity.allows(operation) {
            return Err(AppError::BadRequest(format!("{} not allowed on {}", operation, path_segment)));
        }
        Ok(entity)
    }

    pub fn service<'a>(&'a self, entity: &'a ResolvedEntity) -> EntityService<'a> {
        EntityService::new(&*self.gateway, entity)
    }
}
