//! HTTP handlers for entity CRUD and reports.

pub mod entity;
pub use entity::*;
