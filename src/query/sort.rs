//! Sort compiler: `column` or `column:direction`, comma separated.

use crate::catalog::Entity;
use crate::error::QueryError;
use crate::query::tokens::{SortDirection, SortToken};
use regex::Regex;
use std::sync::OnceLock;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("static pattern"))
}

/// Compile a sort list. A blank input yields no keys.
pub fn compile_sort(raw: &str, entity: &Entity) -> Result<Vec<SortToken>, QueryError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',').map(|key| compile_key(key.trim(), entity)).collect()
}

fn compile_key(key: &str, entity: &Entity) -> Result<SortToken, QueryError> {
    let parts: Vec<&str> = key.split(':').map(str::trim).collect();
    let (name, direction) = match parts.as_slice() {
        [name] => (*name, SortDirection::Ascending),
        [name, dir] => (*name, parse_direction(dir)?),
        _ => return Err(QueryError::MalformedSortKey(key.to_string())),
    };
    if name.is_empty() {
        return Err(QueryError::MalformedSortKey(key.to_string()));
    }
    if !identifier_pattern().is_match(name) {
        return Err(QueryError::InvalidSortIdentifier(name.to_string()));
    }
    let column = entity.column(name).ok_or_else(|| QueryError::UnknownColumn {
        entity: entity.name.clone(),
        column: name.to_string(),
    })?;
    Ok(SortToken {
        alias: entity.alias(),
        column: column.name.clone(),
        direction,
    })
}

fn parse_direction(dir: &str) -> Result<SortDirection, QueryError> {
    if dir.eq_ignore_ascii_case("asc") {
        Ok(SortDirection::Ascending)
    } else if dir.eq_ignore_ascii_case("desc") {
        Ok(SortDirection::Descending)
    } else {
        Err(QueryError::InvalidSortDirection(dir.to_string()))
    }
}
