//! JSON Patch documents addressed at a collection: `/{id}/{column}` paths, split per resource.

use crate::error::QueryError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
    Move,
    Copy,
    Test,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

impl PatchOperation {
    /// Decoded path segments (`~1` is `/`, `~0` is `~`).
    fn segments(&self) -> Vec<String> {
        self.path
            .strip_prefix('/')
            .unwrap_or(&self.path)
            .split('/')
            .map(|s| s.replace("~1", "/").replace("~0", "~"))
            .collect()
    }
}

/// Operations that target one resource id, in their original relative order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubPatch {
    pub id: String,
    pub operations: Vec<PatchOperation>,
}

/// A column assignment derived from a sub-patch. `None` means SQL NULL.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnSet {
    pub column: String,
    pub value: Value,
}

impl SubPatch {
    /// Translate operations into column assignments: `add`/`replace` set the value,
    /// `remove` sets NULL. Later operations on the same column win.
    pub fn column_sets(&self) -> Result<Vec<ColumnSet>, QueryError> {
        let mut sets: Vec<ColumnSet> = Vec::new();
        for operation in &self.operations {
            let segments = operation.segments();
            let column = match segments.as_slice() {
                [_, column] if !column.is_empty() => column.clone(),
                _ => {
                    return Err(QueryError::InvalidPatch(format!(
                        "path '{}' must be /{{id}}/{{column}}",
                        operation.path
                    )))
                }
            };
            let value = match operation.op {
                PatchOp::Add | PatchOp::Replace => operation.value.clone().ok_or_else(|| {
                    QueryError::InvalidPatch(format!("'{}' needs a value", operation.path))
                })?,
                PatchOp::Remove => Value::Null,
                other => {
                    return Err(QueryError::InvalidPatch(format!(
                        "operation {:?} is not supported",
                        other
                    )))
                }
            };
            match sets.iter_mut().find(|s| s.column.eq_ignore_ascii_case(&column)) {
                Some(existing) => existing.value = value,
                None => sets.push(ColumnSet { column, value }),
            }
        }
        Ok(sets)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.operations).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Parse a patch document body.
pub fn parse_patch(body: &Value) -> Result<Vec<PatchOperation>, QueryError> {
    if !body.is_array() {
        return Err(QueryError::InvalidPatch("expected a JSON array of operations".into()));
    }
    serde_json::from_value(body.clone()).map_err(|e| QueryError::InvalidPatch(e.to_string()))
}

/// Group operations by the leading path segment, first-appearance order.
pub fn split_patch(operations: &[PatchOperation]) -> Result<Vec<SubPatch>, QueryError> {
    let mut groups: Vec<SubPatch> = Vec::new();
    for operation in operations {
        let id = operation.segments().into_iter().next().unwrap_or_default();
        if id.is_empty() {
            return Err(QueryError::InvalidPatch(format!(
                "path '{}' does not start with a resource id",
                operation.path
            )));
        }
        match groups.iter_mut().find(|g| g.id == id) {
            Some(group) => group.operations.push(operation.clone()),
            None => groups.push(SubPatch {
                id,
                operations: vec![operation.clone()],
            }),
        }
    }
    Ok(groups)
}

/// Prefix every path of a single-resource patch with its id.
pub fn scope_to_resource(operations: &[PatchOperation], id: &str) -> Vec<PatchOperation> {
    let escaped = id.replace('~', "~0").replace('/', "~1");
    operations
        .iter()
        .map(|o| PatchOperation {
            path: format!("/{}{}", escaped, o.path),
            ..o.clone()
        })
        .collect()
}
