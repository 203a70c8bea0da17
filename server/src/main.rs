//! dbrest server: loads settings, catalog and grants, ensures the audit table, serves the API.
//!
//! Run from repo root: `cargo run -p dbrest-server`

use dbrest::{app, AppState, CrudService, JsonFileSchemaReader, PermissionGate, SchemaReader, Settings};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dbrest=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let write_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&settings.database_url)
        .await?;
    let read_pool = if settings.database_read_url == settings.database_url {
        write_pool.clone()
    } else {
        sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&settings.database_read_url)
            .await?
    };

    let catalog = JsonFileSchemaReader::new(&settings.catalog_path)
        .read_schema(&read_pool)
        .await?;
    let gate = match &settings.grants_path {
        Some(path) => PermissionGate::load(path).await?,
        None => {
            tracing::warn!("DBREST_GRANTS_PATH not set; only role headers grant access");
            PermissionGate::default()
        }
    };
    CrudService::ensure_audit_table(&write_pool, &settings.audit).await?;

    let state = AppState {
        read_pool,
        write_pool,
        catalog: Arc::new(catalog),
        gate: Arc::new(gate),
        limits: settings.limits,
        audit: Arc::new(settings.audit.clone()),
        trust_role_headers: settings.trust_role_headers,
    };

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app(state, &settings)).await?;
    Ok(())
}
