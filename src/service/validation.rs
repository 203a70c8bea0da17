//! Request body validation against catalog columns.

use crate::catalog::Entity;
use crate::error::AppError;
use crate::patch::ColumnSet;
use crate::sql::BindValue;
use serde_json::{Map, Value};

pub struct RequestValidator;

impl RequestValidator {
    /// Body of a POST/PUT: an object whose keys are columns of the entity and whose
    /// values convert to the column type. Generated columns are tolerated and ignored later.
    pub fn validate<'b>(entity: &Entity, body: &'b Value) -> Result<&'b Map<String, Value>, AppError> {
        let object = body
            .as_object()
            .ok_or_else(|| AppError::Validation("body must be a JSON object".into()))?;
        let mut problems = Vec::new();
        for (key, value) in object {
            check_field(entity, key, value, &mut problems);
        }
        finish(object, problems)
    }

    /// Column assignments from a PATCH; only present fields are checked.
    pub fn validate_partial(entity: &Entity, sets: &[ColumnSet]) -> Result<(), AppError> {
        let mut problems = Vec::new();
        for set in sets {
            check_field(entity, &set.column, &set.value, &mut problems);
            if entity.column(&set.column).map(|c| c.is_generated() || c.is_primary_key()) == Some(true) {
                problems.push(format!("{} cannot be patched", set.column));
            }
        }
        finish((), problems)
    }

    /// POST accepts a single object or an array of objects (bulk).
    pub fn items(body: &Value) -> Result<Vec<&Value>, AppError> {
        match body {
            Value::Array(items) if items.is_empty() => Err(AppError::Validation("empty array".into())),
            Value::Array(items) => Ok(items.iter().collect()),
            other => Ok(vec![other]),
        }
    }
}

fn check_field(entity: &Entity, key: &str, value: &Value, problems: &mut Vec<String>) {
    match entity.column(key) {
        None => problems.push(format!("{} is not a column of {}", key, entity.name)),
        Some(column) => {
            if let Err(e) = BindValue::from_json(value, column) {
                problems.push(e.to_string());
            }
        }
    }
}

fn finish<T>(ok: T, problems: Vec<String>) -> Result<T, AppError> {
    if problems.is_empty() {
        Ok(ok)
    } else {
        Err(AppError::Validation(problems.join("; ")))
    }
}
