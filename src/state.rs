//! Shared application state for all routes. The catalog and grants are immutable after start.

use crate::catalog::SchemaCatalog;
use crate::event_log::AuditTable;
use crate::permission::PermissionGate;
use crate::query::PagingLimits;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Non-transactional reads.
    pub read_pool: PgPool,
    /// Mutations and their audit rows.
    pub write_pool: PgPool,
    pub catalog: Arc<SchemaCatalog>,
    pub gate: Arc<PermissionGate>,
    pub limits: PagingLimits,
    pub audit: Arc<AuditTable>,
    /// Whether `X-User-Roles` confers role permissions.
    pub trust_role_headers: bool,
}
