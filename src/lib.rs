//! Warehouse API: catalog-driven REST backend over PostgreSQL (or an in-memory store).

pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{builtin_catalog, load_from_path, resolve, CatalogConfig, ResolvedEntity, ResolvedModel};
pub use error::{AppError, ConfigError, StorageError};
pub use gateway::{MemoryGateway, PgGateway, Record, StorageGateway};
pub use migration::apply_migrations;
pub use routes::{app, common_routes, entity_routes};
pub use service::{EntityService, RequestValidator};
pub use settings::{Settings, StorageBackend};
pub use state::AppState;
pub use store::{connect_pool, ensure_database_exists};
