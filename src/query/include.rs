//! Include compiler: resolves a relationship path hop by hop through foreign-key metadata.

use crate::catalog::{Entity, SchemaCatalog};
use crate::error::{CompileError, QueryError, SchemaError};
use crate::query::tokens::IncludeToken;

/// Compile `orders,orderdetails` (or `orders.orderdetails`) starting from `entity`.
///
/// Each hop first looks for a foreign key on the parent pointing at the child, then for one on
/// the child pointing back at the parent. The referenced side joins on its primary key.
pub fn compile_include(
    raw: &str,
    entity: &Entity,
    catalog: &SchemaCatalog,
) -> Result<Vec<IncludeToken>, CompileError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut tokens = Vec::new();
    let mut visited = vec![entity.name.to_lowercase()];
    let mut parent = entity;
    for hop in raw.split([',', '.']).map(str::trim) {
        if hop.is_empty() {
            return Err(QueryError::MalformedInclude(raw.to_string()).into());
        }
        let child = catalog
            .related_entity(&parent.schema, hop)
            .ok_or_else(|| QueryError::UnknownEntity(hop.to_string()))?;
        if visited.contains(&child.name.to_lowercase()) {
            return Err(QueryError::DuplicateInclude(child.name.clone()).into());
        }
        tokens.push(resolve_hop(parent, child)?);
        visited.push(child.name.to_lowercase());
        parent = child;
    }
    Ok(tokens)
}

fn resolve_hop(parent: &Entity, child: &Entity) -> Result<IncludeToken, CompileError> {
    if let Some(fk) = parent.columns.iter().find(|c| c.references_entity(child)) {
        let pk = child
            .primary_key()
            .ok_or_else(|| SchemaError::MissingPrimaryKey(child.name.clone()))?;
        return Ok(IncludeToken {
            child_schema: child.schema.clone(),
            child_table: child.name.clone(),
            child_column: pk.name.clone(),
            parent_table: parent.name.clone(),
            parent_column: fk.name.clone(),
        });
    }
    if let Some(fk) = child.columns.iter().find(|c| c.references_entity(parent)) {
        let pk = parent
            .primary_key()
            .ok_or_else(|| SchemaError::MissingPrimaryKey(parent.name.clone()))?;
        return Ok(IncludeToken {
            child_schema: child.schema.clone(),
            child_table: child.name.clone(),
            child_column: fk.name.clone(),
            parent_table: parent.name.clone(),
            parent_column: pk.name.clone(),
        });
    }
    Err(QueryError::RelationshipNotFound {
        parent: parent.name.clone(),
        child: child.name.clone(),
    }
    .into())
}
