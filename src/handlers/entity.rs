//! Entity handlers: list, read, create (single and bulk), replace, patch, delete, options.
//! Authorization runs first so a denied caller learns nothing about the catalog.

use crate::catalog::Entity;
use crate::error::AppError;
use crate::extractors::PrincipalHeaders;
use crate::patch::{parse_patch, scope_to_resource, split_patch, PatchOperation};
use crate::permission::{Operation, Target};
use crate::query::{CompiledQuery, QueryOptions};
use crate::response::{success_many, success_many_created, success_one, success_one_ok};
use crate::service::{AuditContext, CrudService, RequestValidator};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

pub const CONTENT_RANGE: &str = "content-range";
pub const PATCH_CHANGES_HEADER: &str = "x-json-patch-changes";

fn authorize(
    state: &AppState,
    principal: &PrincipalHeaders,
    operation: Operation,
    domain: &str,
    entity: &str,
    id: Option<&str>,
) -> Result<(), AppError> {
    let target = Target {
        domain,
        entity,
        resource_id: id,
    };
    let principal = principal.principal(state.trust_role_headers);
    state.gate.authorize(&principal, operation, &target)
}

fn lookup<'s>(state: &'s AppState, domain: &str, entity: &str) -> Result<&'s Entity, AppError> {
    state
        .catalog
        .entity(domain, entity)
        .ok_or_else(|| AppError::NotFound(format!("{}/{}", domain, entity)))
}

fn writable<'s>(state: &'s AppState, domain: &str, entity: &str) -> Result<&'s Entity, AppError> {
    let entity = lookup(state, domain, entity)?;
    if entity.read_only {
        return Err(AppError::MethodNotAllowed(format!("{} is read-only", entity.name)));
    }
    Ok(entity)
}

fn compile(state: &AppState, entity: &Entity, params: Vec<(String, String)>) -> Result<CompiledQuery, AppError> {
    let options = QueryOptions::from_pairs(params)?;
    Ok(CompiledQuery::compile(&options, entity, &state.catalog, &state.limits)?)
}

fn audit<'s>(state: &'s AppState, domain: &'s str) -> AuditContext<'s> {
    AuditContext {
        table: &state.audit,
        domain,
    }
}

/// `items {first}-{last}/{total}` where last is `offset + returned`.
pub fn content_range(offset: i64, returned: usize, total: i64) -> String {
    format!("items {}-{}/{}", offset, offset.saturating_add(returned as i64), total)
}

/// JSON with every non-ASCII character escaped so it is a valid header value.
fn ascii_json(value: &impl serde::Serialize) -> String {
    let text = serde_json::to_string(value).unwrap_or_else(|_| "[]".into());
    let mut out = String::with_capacity(text.len());
    let mut units = [0u16; 2];
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

pub async fn list(
    State(state): State<AppState>,
    principal: PrincipalHeaders,
    Path((domain, entity_name)): Path<(String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    authorize(&state, &principal, Operation::List, &domain, &entity_name, None)?;
    let entity = lookup(&state, &domain, &entity_name)?;
    let query = compile(&state, entity, params)?;
    let page = CrudService::list(&state.read_pool, entity, &query).await?;
    let range = content_range(page.offset, page.rows.len(), page.total);
    let mut headers = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(&range) {
        headers.insert(CONTENT_RANGE, v);
    }
    Ok((headers, success_many(page.rows)))
}

pub async fn read(
    State(state): State<AppState>,
    principal: PrincipalHeaders,
    Path((domain, entity_name, id)): Path<(String, String, String)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, AppError> {
    authorize(&state, &principal, Operation::Read, &domain, &entity_name, Some(&id))?;
    let entity = lookup(&state, &domain, &entity_name)?;
    let query = compile(&state, entity, params)?;
    let row = CrudService::read(&state.read_pool, entity, &query, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.name, id)))?;
    Ok(success_one_ok(row))
}

/// POST accepts one object, or an array of objects when the caller also holds Bulk.
pub async fn create(
    State(state): State<AppState>,
    principal: PrincipalHeaders,
    Path((domain, entity_name)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<axum::response::Response, AppError> {
    let bulk = body.is_array();
    authorize(&state, &principal, Operation::Create { bulk }, &domain, &entity_name, None)?;
    let entity = writable(&state, &domain, &entity_name)?;
    let items = RequestValidator::items(&body)?
        .into_iter()
        .map(|item| RequestValidator::validate(entity, item))
        .collect::<Result<Vec<_>, _>>()?;
    let mut rows = CrudService::create(&state.write_pool, audit(&state, &domain), entity, &items).await?;
    if bulk {
        Ok(success_many_created(rows).into_response())
    } else {
        Ok(success_one(rows.pop().unwrap_or(Value::Null)).into_response())
    }
}

pub async fn replace(
    State(state): State<AppState>,
    principal: PrincipalHeaders,
    Path((domain, entity_name, id)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    authorize(&state, &principal, Operation::Replace, &domain, &entity_name, Some(&id))?;
    let entity = writable(&state, &domain, &entity_name)?;
    let body = RequestValidator::validate(entity, &body)?;
    let row = CrudService::replace(&state.write_pool, audit(&state, &domain), entity, &id, body)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.name, id)))?;
    Ok(success_one_ok(row))
}

/// PATCH on a collection: paths are `/{id}/{column}`.
pub async fn patch_many(
    State(state): State<AppState>,
    principal: PrincipalHeaders,
    Path((domain, entity_name)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let operations = parse_patch(&body)?;
    apply_patch(&state, &principal, &domain, &entity_name, None, operations).await
}

/// PATCH on one resource: paths are `/{column}`.
pub async fn patch_one(
    State(state): State<AppState>,
    principal: PrincipalHeaders,
    Path((domain, entity_name, id)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let operations = scope_to_resource(&parse_patch(&body)?, &id);
    apply_patch(&state, &principal, &domain, &entity_name, Some(&id), operations).await
}

async fn apply_patch(
    state: &AppState,
    principal: &PrincipalHeaders,
    domain: &str,
    entity_name: &str,
    scope: Option<&str>,
    operations: Vec<PatchOperation>,
) -> Result<impl IntoResponse, AppError> {
    let sub_patches = split_patch(&operations)?;
    if sub_patches.is_empty() {
        authorize(state, principal, Operation::Patch, domain, entity_name, scope)?;
        return Err(AppError::BadRequest("patch document has no operations".into()));
    }
    for sub in &sub_patches {
        authorize(state, principal, Operation::Patch, domain, entity_name, Some(&sub.id))?;
    }
    let entity = writable(state, domain, entity_name)?;
    let rows = CrudService::patch(&state.write_pool, audit(state, domain), entity, &sub_patches).await?;
    let mut headers = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(&ascii_json(&operations)) {
        headers.insert(PATCH_CHANGES_HEADER, v);
    }
    Ok((headers, success_many(rows)))
}

pub async fn delete(
    State(state): State<AppState>,
    principal: PrincipalHeaders,
    Path((domain, entity_name, id)): Path<(String, String, String)>,
) -> Result<StatusCode, AppError> {
    authorize(&state, &principal, Operation::Delete, &domain, &entity_name, Some(&id))?;
    let entity = writable(&state, &domain, &entity_name)?;
    if CrudService::delete(&state.write_pool, audit(&state, &domain), entity, &id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("{} {}", entity.name, id)))
    }
}

/// Allowed methods and the column list of the entity.
pub async fn options(
    State(state): State<AppState>,
    principal: PrincipalHeaders,
    Path((domain, entity_name)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    authorize(&state, &principal, Operation::Options, &domain, &entity_name, None)?;
    let entity = lookup(&state, &domain, &entity_name)?;
    let allow = if entity.read_only {
        "GET, OPTIONS"
    } else {
        "GET, POST, PATCH, OPTIONS"
    };
    let body = json!({
        "entity": entity.name,
        "schema": entity.schema,
        "read_only": entity.read_only,
        "columns": entity.columns,
    });
    Ok(([(header::ALLOW, allow)], Json(body)))
}
