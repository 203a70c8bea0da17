//! CrudService: executes compiled statements; RequestValidator: body checks against the catalog.

mod crud;
mod validation;
pub use crud::{AuditContext, CrudService, ListPage};
pub use validation::RequestValidator;
