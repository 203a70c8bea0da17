//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors raised while loading settings, the schema catalog or the grant table.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate entity '{entity}' in schema '{schema}'")]
    DuplicateEntity { schema: String, entity: String },
    #[error("entity '{0}' declares more than one primary key column")]
    MultiplePrimaryKeys(String),
    #[error("invalid setting {key}: {message}")]
    InvalidSetting { key: &'static str, message: String },
    #[error("config load: {0}")]
    Load(String),
}

/// Rejections of untrusted query-string input. Pure functions of the input, never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("filter is empty")]
    EmptyFilter,
    #[error("unbalanced parenthesis in filter: {0}")]
    UnbalancedParenthesis(String),
    #[error("boolean operator '{0}' is not followed by a condition")]
    DanglingOperator(String),
    #[error("condition '{0}' must start with a column name, not a value")]
    ReversedCondition(String),
    #[error("unknown operator '{0}' (expected eq, ne, gt, ge, lt, le, in, ct or sw)")]
    InvalidOperator(String),
    #[error("malformed filter: {0}")]
    MalformedFilter(String),
    #[error("invalid value '{value}' for column '{column}': expected {expected}")]
    InvalidLiteral {
        column: String,
        value: String,
        expected: &'static str,
    },
    #[error("unknown column '{column}' on entity '{entity}'")]
    UnknownColumn { entity: String, column: String },
    #[error("invalid sort column '{0}'")]
    InvalidSortIdentifier(String),
    #[error("invalid sort direction '{0}' (expected asc or desc)")]
    InvalidSortDirection(String),
    #[error("malformed sort key '{0}' (expected column or column:direction)")]
    MalformedSortKey(String),
    #[error("invalid field '{0}'")]
    InvalidField(String),
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),
    #[error("no relationship found between '{parent}' and '{child}'")]
    RelationshipNotFound { parent: String, child: String },
    #[error("entity '{0}' appears more than once in include")]
    DuplicateInclude(String),
    #[error("malformed include '{0}'")]
    MalformedInclude(String),
    #[error("{key} must be an integer, got '{value}'")]
    InvalidPagingValue { key: &'static str, value: String },
    #[error("invalid patch: {0}")]
    InvalidPatch(String),
}

/// Catalog misconfiguration discovered while compiling a statement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("entity '{0}' has no primary key")]
    MissingPrimaryKey(String),
}

/// Anything the compilers or the statement orchestrator can reject.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("forbidden")]
    Forbidden,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl From<CompileError> for AppError {
    fn from(e: CompileError) -> Self {
        match e {
            CompileError::Query(q) => AppError::Query(q),
            CompileError::Schema(s) => AppError::Schema(s),
        }
    }
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Query(_) => (StatusCode::BAD_REQUEST, "invalid_query"),
            AppError::Schema(_) => (StatusCode::INTERNAL_SERVER_ERROR, "schema_error"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::MethodNotAllowed(_) => (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::Db(e) => match e {
                sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "not_found"),
                sqlx::Error::Database(db) if db.is_unique_violation() => (StatusCode::CONFLICT, "conflict"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            },
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
