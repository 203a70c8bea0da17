//! Statement execution against PostgreSQL. Reads use the reader pool; every mutation runs in
//! one writer transaction together with its audit rows.

use crate::catalog::Entity;
use crate::error::AppError;
use crate::event_log::{AuditTable, HttpMethod, PatchLogEvent};
use crate::patch::SubPatch;
use crate::query::CompiledQuery;
use crate::sql::dialect::PostgresDialect;
use crate::sql::{QueryBuf, StatementBuilder};
use serde_json::{json, Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres, Row};

/// Who and where a mutation is recorded against.
#[derive(Clone, Copy, Debug)]
pub struct AuditContext<'a> {
    pub table: &'a AuditTable,
    pub domain: &'a str,
}

/// One page of a collection plus the unpaged total.
#[derive(Clone, Debug, PartialEq)]
pub struct ListPage {
    pub rows: Vec<Value>,
    pub total: i64,
    pub offset: i64,
}

pub struct CrudService;

impl CrudService {
    fn builder(entity: &Entity) -> StatementBuilder<'_> {
        StatementBuilder::new(&PostgresDialect, entity)
    }

    pub async fn list(pool: &PgPool, entity: &Entity, query: &CompiledQuery) -> Result<ListPage, AppError> {
        let statements = Self::builder(entity).select_list(query);
        let rows = Self::fetch_all(pool, &statements.select).await?;
        tracing::debug!(sql = %statements.count.sql, params = ?statements.count.params, "count");
        let total: i64 = bind_all(&statements.count).fetch_one(pool).await?.try_get(0)?;
        Ok(ListPage {
            rows,
            total,
            offset: query.paging.offset,
        })
    }

    pub async fn read(
        pool: &PgPool,
        entity: &Entity,
        query: &CompiledQuery,
        id: &str,
    ) -> Result<Option<Value>, AppError> {
        let q = Self::builder(entity).select_one(query, id)?;
        Ok(Self::fetch_all(pool, &q).await?.into_iter().next())
    }

    /// Insert every item in one transaction. Returns the created rows.
    pub async fn create(
        pool: &PgPool,
        audit: AuditContext<'_>,
        entity: &Entity,
        items: &[&Map<String, Value>],
    ) -> Result<Vec<Value>, AppError> {
        let builder = Self::builder(entity);
        let statements = items
            .iter()
            .map(|body| builder.insert(body))
            .collect::<Result<Vec<_>, _>>()?;
        let mut tx = pool.begin().await?;
        let mut out = Vec::with_capacity(statements.len());
        for q in &statements {
            let row = Self::returning_one(&mut tx, q)
                .await?
                .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
            let id = key_of(entity, &row);
            let patch = json!([{ "op": "add", "path": format!("/{}", id), "value": row }]).to_string();
            Self::log(&mut tx, audit, PatchLogEvent::new(HttpMethod::Post, audit.domain, &entity.name, &id, 201, patch))
                .await?;
            out.push(row);
        }
        tx.commit().await?;
        Ok(out)
    }

    /// Replace the submitted columns of one row. `None` when the row does not exist.
    pub async fn replace(
        pool: &PgPool,
        audit: AuditContext<'_>,
        entity: &Entity,
        id: &str,
        body: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let q = Self::builder(entity).update(id, body)?;
        let mut tx = pool.begin().await?;
        let Some(row) = Self::returning_one(&mut tx, &q).await? else {
            return Ok(None);
        };
        let patch: Vec<Value> = body
            .iter()
            .map(|(k, v)| json!({ "op": "replace", "path": format!("/{}/{}", id, k), "value": v }))
            .collect();
        let patch = Value::Array(patch).to_string();
        Self::log(&mut tx, audit, PatchLogEvent::new(HttpMethod::Put, audit.domain, &entity.name, id, 200, patch))
            .await?;
        tx.commit().await?;
        Ok(Some(row))
    }

    /// One UPDATE per sub-patch, each followed by its audit row; all or nothing.
    pub async fn patch(
        pool: &PgPool,
        audit: AuditContext<'_>,
        entity: &Entity,
        sub_patches: &[SubPatch],
    ) -> Result<Vec<Value>, AppError> {
        let builder = Self::builder(entity);
        let mut statements = Vec::with_capacity(sub_patches.len());
        for sub in sub_patches {
            let sets = sub.column_sets()?;
            crate::service::RequestValidator::validate_partial(entity, &sets)?;
            statements.push((sub, builder.patch(&sub.id, &sets)?));
        }
        let mut tx = pool.begin().await?;
        let mut out = Vec::with_capacity(statements.len());
        for (sub, q) in &statements {
            let row = Self::returning_one(&mut tx, q)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.name, sub.id)))?;
            let event = PatchLogEvent::new(HttpMethod::Patch, audit.domain, &entity.name, &sub.id, 200, sub.to_json());
            Self::log(&mut tx, audit, event).await?;
            out.push(row);
        }
        tx.commit().await?;
        Ok(out)
    }

    /// True when a row was deleted.
    pub async fn delete(pool: &PgPool, audit: AuditContext<'_>, entity: &Entity, id: &str) -> Result<bool, AppError> {
        let q = Self::builder(entity).delete(id)?;
        let mut tx = pool.begin().await?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
        let affected = bind_all(&q).execute(&mut *tx).await?.rows_affected();
        if affected == 0 {
            return Ok(false);
        }
        let patch = json!([{ "op": "remove", "path": format!("/{}", id) }]).to_string();
        Self::log(&mut tx, audit, PatchLogEvent::new(HttpMethod::Delete, audit.domain, &entity.name, id, 204, patch))
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Create the audit schema and table if missing.
    pub async fn ensure_audit_table(pool: &PgPool, audit: &AuditTable) -> Result<(), AppError> {
        for ddl in audit.create_statements(&PostgresDialect) {
            sqlx::query(&ddl).execute(pool).await?;
        }
        Ok(())
    }

    async fn log(tx: &mut PgConnection, audit: AuditContext<'_>, event: PatchLogEvent) -> Result<(), AppError> {
        let q = audit.table.insert(&PostgresDialect, &event);
        tracing::debug!(sql = %q.sql, params = ?q.params, "audit");
        bind_all(&q).execute(&mut *tx).await?;
        Ok(())
    }

    async fn fetch_all(pool: &PgPool, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(q).fetch_all(pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn returning_one(tx: &mut PgConnection, q: &QueryBuf) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
        let row = bind_all(q).fetch_optional(&mut *tx).await?;
        match &q.select_back {
            None => Ok(row.map(|r| row_to_json(&r))),
            Some(back) => {
                tracing::debug!(sql = %back.sql, params = ?back.params, "select back (tx)");
                let row = bind_all(back).fetch_optional(&mut *tx).await?;
                Ok(row.map(|r| row_to_json(&r)))
            }
        }
    }
}

/// Bind every parameter in statement order.
fn bind_all(q: &QueryBuf) -> Query<'_, Postgres, PgArguments> {
    q.params
        .values()
        .cloned()
        .fold(sqlx::query(&q.sql), |query, v| query.bind(v))
}

fn key_of(entity: &Entity, row: &Value) -> String {
    entity
        .primary_key()
        .and_then(|pk| row.get(&pk.name))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

pub(crate) fn row_to_json(row: &PgRow) -> Value {
    use sqlx::Column;
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(f64::from(n)) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        // timestamp without time zone is stored as UTC
        return Value::String(d.and_utc().to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(t)) = row.try_get::<Option<chrono::NaiveTime>, _>(name) {
        return Value::String(t.format("%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
