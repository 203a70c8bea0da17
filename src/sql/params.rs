//! Bind values and the ordered, named parameter set shared by every clause of a statement.

use crate::catalog::{Column, DataType};
use crate::error::QueryError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

/// A literal bound as a statement parameter. Never rendered into SQL text.
#[derive(Clone, Debug, PartialEq)]
pub enum BindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Uuid(uuid::Uuid),
    Timestamp(DateTime<Utc>),
    Json(Value),
}

impl BindValue {
    /// Convert a JSON body value for a column, honoring the column's logical type.
    pub fn from_json(v: &Value, column: &Column) -> Result<Self, QueryError> {
        let invalid = || QueryError::InvalidLiteral {
            column: column.name.clone(),
            value: v.to_string(),
            expected: column.data_type.describe(),
        };
        Ok(match (v, column.data_type) {
            (Value::Null, _) => BindValue::Null,
            (_, DataType::Json) => BindValue::Json(v.clone()),
            (Value::String(s), _) => BindValue::from_text(s, column)?,
            (Value::Bool(b), DataType::Boolean | DataType::Other | DataType::Text) => BindValue::Bool(*b),
            (Value::Number(n), DataType::Integer) => BindValue::I64(n.as_i64().ok_or_else(invalid)?),
            (Value::Number(n), DataType::Decimal | DataType::Float) => BindValue::F64(n.as_f64().ok_or_else(invalid)?),
            (Value::Number(n), DataType::Other) => match n.as_i64() {
                Some(i) => BindValue::I64(i),
                None => BindValue::F64(n.as_f64().ok_or_else(invalid)?),
            },
            (Value::Number(n), DataType::Text) => BindValue::String(n.to_string()),
            (Value::Array(_) | Value::Object(_), DataType::Other) => BindValue::Json(v.clone()),
            _ => return Err(invalid()),
        })
    }

    /// Convert a textual literal (query string or JSON string) for a column.
    pub fn from_text(s: &str, column: &Column) -> Result<Self, QueryError> {
        let invalid = || QueryError::InvalidLiteral {
            column: column.name.clone(),
            value: s.to_string(),
            expected: column.data_type.describe(),
        };
        Ok(match column.data_type {
            DataType::Integer => BindValue::I64(s.trim().parse().map_err(|_| invalid())?),
            DataType::Decimal | DataType::Float => BindValue::F64(s.trim().parse().map_err(|_| invalid())?),
            DataType::Boolean => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => BindValue::Bool(true),
                "false" | "0" => BindValue::Bool(false),
                _ => return Err(invalid()),
            },
            DataType::DateTime => BindValue::Timestamp(parse_utc(s).ok_or_else(invalid)?),
            DataType::Date => {
                NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
                BindValue::String(s.trim().to_string())
            }
            DataType::Uuid => BindValue::Uuid(uuid::Uuid::parse_str(s.trim()).map_err(|_| invalid())?),
            DataType::Json => BindValue::Json(serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string()))),
            DataType::Text | DataType::Time | DataType::Other => BindValue::String(s.to_string()),
        })
    }

    pub fn to_json(&self) -> Value {
        match self {
            BindValue::Null => Value::Null,
            BindValue::Bool(b) => Value::Bool(*b),
            BindValue::I64(n) => Value::Number((*n).into()),
            BindValue::F64(n) => serde_json::Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
            BindValue::String(s) => Value::String(s.clone()),
            BindValue::Uuid(u) => Value::String(u.to_string()),
            BindValue::Timestamp(t) => Value::String(t.to_rfc3339()),
            BindValue::Json(v) => v.clone(),
        }
    }
}

/// Parse a date/time literal and normalize it to UTC.
///
/// Literals with an explicit offset are converted to UTC. Literals without one are taken to
/// already be UTC, and a bare date means midnight UTC. Comparisons therefore always happen in UTC.
pub fn parse_utc(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Ordered parameters with unique names. Index (1-based) is the position in the statement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParamSet {
    params: Vec<(String, BindValue)>,
}

impl ParamSet {
    pub fn new() -> Self {
        ParamSet { params: Vec::new() }
    }

    /// Add a value under a name derived from `hint`; returns (1-based index, unique name).
    pub fn push(&mut self, hint: &str, value: BindValue) -> (usize, String) {
        let base = sanitize_param_name(hint);
        let mut name = base.clone();
        let mut n = 1;
        while self.params.iter().any(|(existing, _)| existing.eq_ignore_ascii_case(&name)) {
            n += 1;
            name = format!("{}_{}", base, n);
        }
        self.params.push((name.clone(), value));
        (self.params.len(), name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&BindValue> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|(n, _)| n.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &BindValue> {
        self.params.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BindValue)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v))
    }
}

fn sanitize_param_name(hint: &str) -> String {
    let mut out: String = hint
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, 'p');
    }
    out
}

impl<'q> Encode<'q, Postgres> for BindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            BindValue::Null => <Option<String> as Encode<Postgres>>::encode_by_ref(&None, buf)?,
            BindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            BindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            BindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            BindValue::String(s) => <String as Encode<Postgres>>::encode_by_ref(s, buf)?,
            BindValue::Uuid(u) => <uuid::Uuid as Encode<Postgres>>::encode_by_ref(u, buf)?,
            BindValue::Timestamp(t) => <DateTime<Utc> as Encode<Postgres>>::encode_by_ref(t, buf)?,
            BindValue::Json(v) => <Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            BindValue::Null | BindValue::String(_) => <String as Type<Postgres>>::type_info(),
            BindValue::Bool(_) => <bool as Type<Postgres>>::type_info(),
            BindValue::I64(_) => <i64 as Type<Postgres>>::type_info(),
            BindValue::F64(_) => <f64 as Type<Postgres>>::type_info(),
            BindValue::Uuid(_) => <uuid::Uuid as Type<Postgres>>::type_info(),
            BindValue::Timestamp(_) => <DateTime<Utc> as Type<Postgres>>::type_info(),
            BindValue::Json(_) => <Value as Type<Postgres>>::type_info(),
        })
    }
}

impl Type<Postgres> for BindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}
