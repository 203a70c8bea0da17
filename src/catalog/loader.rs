//! Catalog loading. Database introspection lives behind `SchemaReader`; the bundled reader
//! parses a JSON catalog document produced by an external introspection step.

use crate::catalog::{validate, SchemaCatalog};
use crate::error::ConfigError;
use async_trait::async_trait;
use sqlx::PgPool;
use std::path::PathBuf;

/// Produces the schema catalog for a connection. Called once at startup.
#[async_trait]
pub trait SchemaReader: Send + Sync {
    async fn read_schema(&self, pool: &PgPool) -> Result<SchemaCatalog, ConfigError>;
}

/// Reads a catalog from a JSON file; the pool is not consulted.
#[derive(Clone, Debug)]
pub struct JsonFileSchemaReader {
    pub path: PathBuf,
}

impl JsonFileSchemaReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileSchemaReader { path: path.into() }
    }
}

#[async_trait]
impl SchemaReader for JsonFileSchemaReader {
    async fn read_schema(&self, _pool: &PgPool) -> Result<SchemaCatalog, ConfigError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ConfigError::Load(format!("{}: {}", self.path.display(), e)))?;
        let catalog = catalog_from_json(&text)?;
        tracing::info!(
            path = %self.path.display(),
            schemas = catalog.schemas.len(),
            entities = catalog.entities().count(),
            "schema catalog loaded"
        );
        Ok(catalog)
    }
}

/// Parse, normalize and validate a catalog document.
pub fn catalog_from_json(text: &str) -> Result<SchemaCatalog, ConfigError> {
    let mut catalog: SchemaCatalog = serde_json::from_str(text).map_err(|e| ConfigError::Load(e.to_string()))?;
    catalog.normalize();
    validate(&catalog)?;
    Ok(catalog)
}
