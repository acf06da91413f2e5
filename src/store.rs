//! Database bootstrap: create the target database and open the connection pool.

use crate::error::{AppError, ConfigError, StorageError};
use crate::settings::Settings;
use crate::sql::quoted;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, Executor, PgPool};
use std::str::FromStr;

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = PgConnectOptions::from_str(&admin_url)
        .map_err(|e| ConfigError::Settings(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await.map_err(StorageError::from)?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await
        .map_err(StorageError::from)?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await
            .map_err(StorageError::from)?;
    }
    Ok(())
}

/// Pool sized from settings; each new connection gets the configured statement timeout.
pub async fn connect_pool(settings: &Settings) -> Result<PgPool, AppError> {
    let timeout_ms = settings.statement_timeout.map(|d| d.as_millis());
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                if let Some(ms) = timeout_ms {
                    conn.execute(format!("SET statement_timeout = {}", ms).as_str()).await?;
                }
                Ok(())
            })
        })
        .connect(&settings.database_url)
        .await
        .map_err(StorageError::from)?;
    Ok(pool)
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), ConfigError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| ConfigError::Settings("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = format!("{}postgres", base);
    Ok((admin_url, db_name.to_string()))
}
