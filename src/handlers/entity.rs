//! Entity CRUD handlers: create, read, update, delete, list, report.

use crate::config::{PkType, ResolvedEntity};
use crate::error::AppError;
use crate::gateway::Record;
use crate::response::{created, found, listed};
use crate::service::RequestValidator;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

fn parse_id(id_str: &str, pk_type: &PkType) -> Result<Value, AppError> {
    Ok(match pk_type {
        PkType::Uuid => {
            let u = uuid::Uuid::parse_str(id_str).map_err(|_| AppError::BadRequest("invalid uuid".into()))?;
            Value::String(u.to_string())
        }
        PkType::Serial => {
            let n: i64 = id_str.parse().map_err(|_| AppError::BadRequest("invalid id".into()))?;
            if n < 0 {
                return Err(AppError::BadRequest("invalid id".into()));
            }
            Value::Number(n.into())
        }
        PkType::Text => {
            if id_str.trim().is_empty() {
                return Err(AppError::BadRequest("invalid id".into()));
            }
            Value::String(id_str.to_string())
        }
    })
}

fn body_to_map(value: Value) -> Result<Record, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// Unreadable bodies (bad JSON, wrong content type) answer with the error envelope too.
fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Record, AppError> {
    let Json(value) = body.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    body_to_map(value)
}

/// `?id=` for reports: absent or empty means every parent.
fn report_id(entity: &ResolvedEntity, params: &HashMap<String, String>) -> Result<Option<Value>, AppError> {
    match params.get("id").map(|s| s.trim()) {
        None | Some("") => Ok(None),
        Some(s) => parse_id(s, &entity.pk_type).map(Some),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entity = state.entity_for(&path_segment, "read")?;
    let rows = state.service(entity).get_all().await?;
    Ok(listed(rows))
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let entity = state.entity_for(&path_segment, "create")?;
    let body = json_body(body)?;
    RequestValidator::validate(&body, entity)?;
    let row = state.service(entity).create(body).await?;
    Ok(created(row))
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = state.entity_for(&path_segment, "read")?;
    let id = parse_id(&id_str, &entity.pk_type)?;
    let row = state.service(entity).get(&id).await?;
    Ok(found(row))
}

pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let entity = state.entity_for(&path_segment, "update")?;
    let id = parse_id(&id_str, &entity.pk_type)?;
    let body = json_body(body)?;
    RequestValidator::validate_partial(&body, entity)?;
    let row = state.service(entity).update(&id, body).await?;
    Ok(found(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = state.entity_for(&path_segment, "delete")?;
    let id = parse_id(&id_str, &entity.pk_type)?;
    state.service(entity).delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn report(
    State(state): State<AppState>,
    Path((path_segment, report_name)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let entity = state.entity_for(&path_segment, "report")?;
    let id = report_id(entity, &params)?;
    let rows = state.service(entity).report(&report_name, id.as_ref()).await?;
    Ok(listed(rows))
}
