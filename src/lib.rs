//! dbrest: REST over relational schemas. Query strings compile to schema-checked tokens,
//! tokens render to parameterized SQL per dialect, and mutations are audited.

pub mod catalog;
pub mod error;
pub mod event_log;
pub mod extractors;
pub mod handlers;
pub mod patch;
pub mod permission;
pub mod query;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;

pub use catalog::{catalog_from_json, JsonFileSchemaReader, SchemaCatalog, SchemaReader};
pub use error::{AppError, CompileError, ConfigError, QueryError, SchemaError};
pub use event_log::{AuditTable, HttpMethod, PatchLogEvent};
pub use permission::{Operation, Permission, PermissionGate, Principal, Role};
pub use query::{CompiledQuery, PagingLimits, QueryOptions};
pub use response::{success_many, success_one};
pub use routes::{app, common_routes_with_ready, entity_routes};
pub use service::CrudService;
pub use settings::Settings;
pub use sql::{dialect_for, DatabaseFamily, Dialect, StatementBuilder};
pub use state::AppState;
