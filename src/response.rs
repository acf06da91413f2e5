//! Success envelopes: `{"data": record}` for one row, `{"data": [...], "meta": {"count"}}`
//! for lists and reports.

use crate::gateway::Record;
use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct RecordBody {
    pub data: Record,
}

#[derive(Serialize)]
pub struct RecordsBody {
    pub data: Vec<Record>,
    pub meta: ListMeta,
}

#[derive(Serialize)]
pub struct ListMeta {
    pub count: usize,
}

pub fn created(data: Record) -> (StatusCode, Json<RecordBody>) {
    (StatusCode::CREATED, Json(RecordBody { data }))
}

pub fn found(data: Record) -> (StatusCode, Json<RecordBody>) {
    (StatusCode::OK, Json(RecordBody { data }))
}

pub fn listed(data: Vec<Record>) -> (StatusCode, Json<RecordsBody>) {
    let meta = ListMeta { count: data.len() };
    (StatusCode::OK, Json(RecordsBody { data, meta }))
}
