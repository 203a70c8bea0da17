//! Fields compiler: projection list or the `*` sentinel.

use crate::catalog::{Entity, SchemaCatalog};
use crate::error::QueryError;
use crate::query::tokens::{FieldsToken, IncludeToken};

/// Compile a projection. `entity.column` addresses a column of an included entity.
pub fn compile_fields(
    raw: &str,
    entity: &Entity,
    includes: &[IncludeToken],
    catalog: &SchemaCatalog,
) -> Result<Vec<FieldsToken>, QueryError> {
    let names: Vec<&str> = raw.split(',').map(str::trim).collect();
    if raw.trim().is_empty() || names.contains(&"*") {
        return Ok(vec![FieldsToken::Wildcard { alias: entity.alias() }]);
    }
    let mut tokens: Vec<FieldsToken> = Vec::with_capacity(names.len());
    for name in names {
        let token = match name.split_once('.') {
            Some((table, column)) => included_column(table, column, name, entity, includes, catalog)?,
            None => {
                let column = entity
                    .column(name)
                    .ok_or_else(|| QueryError::InvalidField(name.to_string()))?;
                FieldsToken::Column {
                    alias: entity.alias(),
                    column: column.name.clone(),
                    label: None,
                    data_type: column.data_type,
                }
            }
        };
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    Ok(tokens)
}

fn included_column(
    table: &str,
    column: &str,
    raw: &str,
    entity: &Entity,
    includes: &[IncludeToken],
    catalog: &SchemaCatalog,
) -> Result<FieldsToken, QueryError> {
    let invalid = || QueryError::InvalidField(raw.to_string());
    if table.eq_ignore_ascii_case(&entity.name) {
        let c = entity.column(column).ok_or_else(invalid)?;
        return Ok(FieldsToken::Column {
            alias: entity.alias(),
            column: c.name.clone(),
            label: None,
            data_type: c.data_type,
        });
    }
    let include = includes
        .iter()
        .find(|i| i.child_table.eq_ignore_ascii_case(table))
        .ok_or_else(invalid)?;
    let related = catalog
        .entity(&include.child_schema, &include.child_table)
        .ok_or_else(invalid)?;
    let c = related.column(column).ok_or_else(invalid)?;
    Ok(FieldsToken::Column {
        alias: related.alias(),
        column: c.name.clone(),
        label: Some(format!("{}.{}", related.name, c.name)),
        data_type: c.data_type,
    })
}
