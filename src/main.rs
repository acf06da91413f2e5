//! Warehouse API server: loads the catalog (embedded, or from CATALOG_PATH), prepares storage
//! and serves the REST routes.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use warehouse_api::{
    apply_migrations, builtin_catalog, connect_pool, ensure_database_exists, load_from_path, resolve, routes, AppState,
    MemoryGateway, PgGateway, Settings, StorageBackend, StorageGateway,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warehouse_api=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let catalog = match &settings.catalog_path {
        Some(path) => load_from_path(path).await?,
        None => builtin_catalog()?,
    };
    let model = Arc::new(resolve(&catalog)?);
    tracing::info!(entities = model.entities.len(), "catalog resolved");

    let gateway: Arc<dyn StorageGateway> = match settings.storage_backend {
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage; data is lost on shutdown");
            Arc::new(MemoryGateway::new(model.clone()))
        }
        StorageBackend::Postgres => {
            ensure_database_exists(&settings.database_url).await?;
            let pool = connect_pool(&settings).await?;
            if settings.apply_migrations {
                apply_migrations(&pool, &model).await?;
            }
            Arc::new(PgGateway::new(pool))
        }
    };

    let state = AppState::new(gateway, model);
    let app = routes::app(state, settings.body_limit_bytes);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
