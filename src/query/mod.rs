//! Query-string compilers. Each turns one untrusted fragment into schema-checked tokens.

pub mod fields;
pub mod filter;
pub mod include;
pub mod paging;
pub mod sort;
pub mod tokens;

pub use fields::compile_fields;
pub use filter::compile_filter;
pub use include::compile_include;
pub use paging::{compile_paging, PagingLimits};
pub use sort::compile_sort;
pub use tokens::*;

use crate::catalog::{Entity, SchemaCatalog};
use crate::error::{CompileError, QueryError};

/// Raw query-string fragments. Keys are matched case-insensitively.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryOptions {
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub fields: Option<String>,
    pub include: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl QueryOptions {
    /// Unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut options = QueryOptions::default();
        for (k, v) in pairs {
            let v: String = v.into();
            match k.as_ref().to_ascii_lowercase().as_str() {
                "filter" => options.filter = Some(v),
                "sort" => options.sort = Some(v),
                "fields" => options.fields = Some(v),
                "include" => options.include = Some(v),
                "limit" => options.limit = Some(parse_int("limit", &v)?),
                "offset" => options.offset = Some(parse_int("offset", &v)?),
                _ => {}
            }
        }
        Ok(options)
    }
}

/// Integers outside the i64 range saturate; paging clamps them afterwards.
fn parse_int(key: &'static str, v: &str) -> Result<i64, QueryError> {
    let t = v.trim();
    if let Ok(n) = t.parse() {
        return Ok(n);
    }
    let (negative, digits) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(if negative { i64::MIN } else { i64::MAX });
    }
    Err(QueryError::InvalidPagingValue { key, value: v.to_string() })
}

/// All tokens for one request against one entity.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledQuery {
    pub filter: Option<FilterToken>,
    pub sort: Vec<SortToken>,
    pub fields: Vec<FieldsToken>,
    pub includes: Vec<IncludeToken>,
    pub paging: PagingToken,
}

impl CompiledQuery {
    pub fn compile(
        options: &QueryOptions,
        entity: &Entity,
        catalog: &SchemaCatalog,
        limits: &PagingLimits,
    ) -> Result<Self, CompileError> {
        let includes = match &options.include {
            Some(raw) => compile_include(raw, entity, catalog)?,
            None => Vec::new(),
        };
        let fields = compile_fields(options.fields.as_deref().unwrap_or("*"), entity, &includes, catalog)?;
        let filter = match &options.filter {
            Some(raw) => Some(compile_filter(raw, entity)?),
            None => None,
        };
        let sort = match &options.sort {
            Some(raw) => compile_sort(raw, entity)?,
            None => Vec::new(),
        };
        let paging = compile_paging(options.limit, options.offset, limits);
        Ok(CompiledQuery {
            filter,
            sort,
            fields,
            includes,
            paging,
        })
    }
}
