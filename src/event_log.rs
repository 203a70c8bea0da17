//! Audit log of applied mutations. One row per sub-patch (or per POST/PUT/DELETE),
//! written in the same transaction as the row change.

use crate::sql::{BindValue, Dialect, ParamSet, QueryBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted as a small integer in `http_method`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get = 1,
    Post = 2,
    Put = 3,
    Patch = 4,
    Delete = 5,
}

impl HttpMethod {
    pub fn code(self) -> i16 {
        self as i16
    }
}

/// Location of the audit table. Both names are identifiers, quoted by the dialect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTable {
    pub schema: String,
    pub table: String,
}

impl Default for AuditTable {
    fn default() -> Self {
        AuditTable {
            schema: "dbrest".into(),
            table: "patch_log".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PatchLogEvent {
    pub event_date: DateTime<Utc>,
    pub http_method: HttpMethod,
    pub domain: String,
    pub entity: String,
    pub id: String,
    /// HTTP status the mutation produced.
    pub status: i32,
    /// Serialized JSON Patch of the change.
    pub patch: String,
}

impl PatchLogEvent {
    pub fn new(method: HttpMethod, domain: &str, entity: &str, id: &str, status: u16, patch: String) -> Self {
        PatchLogEvent {
            event_date: Utc::now(),
            http_method: method,
            domain: domain.to_string(),
            entity: entity.to_string(),
            id: id.to_string(),
            status: i32::from(status),
            patch,
        }
    }
}

/// Identifiers stored in the bounded columns are truncated to fit.
const ID_WIDTH: usize = 128;

fn bounded(s: &str) -> String {
    s.chars().take(ID_WIDTH).collect()
}

impl AuditTable {
    fn qualified(&self, dialect: &dyn Dialect) -> String {
        dialect.qualified_table(&self.schema, &self.table)
    }

    /// PostgreSQL DDL for the schema and table.
    pub fn create_statements(&self, dialect: &dyn Dialect) -> Vec<String> {
        vec![
            format!("CREATE SCHEMA IF NOT EXISTS {}", dialect.quote_ident(&self.schema)),
            format!(
                r#"
            CREATE TABLE IF NOT EXISTS {} (
                pk BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
                event_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                http_method SMALLINT NOT NULL,
                domain VARCHAR({w}) NOT NULL,
                entity VARCHAR({w}) NOT NULL,
                id VARCHAR({w}) NOT NULL,
                status INTEGER NOT NULL,
                patch TEXT NOT NULL DEFAULT '[]'
            )
            "#,
                self.qualified(dialect),
                w = ID_WIDTH
            ),
        ]
    }

    pub fn insert(&self, dialect: &dyn Dialect, event: &PatchLogEvent) -> QueryBuf {
        let mut params = ParamSet::new();
        let values = [
            ("event_date", BindValue::Timestamp(event.event_date)),
            ("http_method", BindValue::I64(i64::from(event.http_method.code()))),
            ("domain", BindValue::String(bounded(&event.domain))),
            ("entity", BindValue::String(bounded(&event.entity))),
            ("id", BindValue::String(bounded(&event.id))),
            ("status", BindValue::I64(i64::from(event.status))),
            ("patch", BindValue::String(event.patch.clone())),
        ];
        let mut cols = Vec::with_capacity(values.len());
        let mut placeholders = Vec::with_capacity(values.len());
        for (name, value) in values {
            let data_type = match &value {
                BindValue::Timestamp(_) => crate::catalog::DataType::DateTime,
                BindValue::I64(_) => crate::catalog::DataType::Other,
                _ => crate::catalog::DataType::Text,
            };
            cols.push(dialect.quote_ident(name));
            placeholders.push(dialect.bind(&mut params, name, value, Some(data_type)));
        }
        QueryBuf {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.qualified(dialect),
                cols.join(", "),
                placeholders.join(", ")
            ),
            params,
            select_back: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::dialect::PostgresDialect;

    #[test]
    fn method_codes_are_stable() {
        assert_eq!(HttpMethod::Get.code(), 1);
        assert_eq!(HttpMethod::Patch.code(), 4);
        assert_eq!(HttpMethod::Delete.code(), 5);
    }

    #[test]
    fn insert_binds_every_column() {
        let audit = AuditTable::default();
        let event = PatchLogEvent::new(HttpMethod::Patch, "sales", "customers", "9997", 200, "[]".into());
        let q = audit.insert(&PostgresDialect, &event);
        assert!(q.sql.starts_with(r#"INSERT INTO "dbrest"."patch_log" ("event_date", "http_method""#));
        assert!(q.sql.contains("$1::timestamptz"));
        assert_eq!(q.params.len(), 7);
        assert_eq!(q.params.get("http_method"), Some(&BindValue::I64(4)));
        assert_eq!(q.params.get("id"), Some(&BindValue::String("9997".into())));
    }

    #[test]
    fn long_identifiers_are_truncated() {
        let audit = AuditTable::default();
        let long = "x".repeat(300);
        let event = PatchLogEvent::new(HttpMethod::Post, "sales", "customers", &long, 201, "[]".into());
        let q = audit.insert(&PostgresDialect, &event);
        assert_eq!(q.params.get("id"), Some(&BindValue::String("x".repeat(128))));
    }

    #[test]
    fn ddl_matches_table_shape() {
        let ddl = AuditTable::default().create_statements(&PostgresDialect).join(";");
        assert!(ddl.contains(r#"CREATE SCHEMA IF NOT EXISTS "dbrest""#));
        assert!(ddl.contains("http_method SMALLINT NOT NULL"));
        assert!(ddl.contains("patch TEXT NOT NULL DEFAULT '[]'"));
    }
}
