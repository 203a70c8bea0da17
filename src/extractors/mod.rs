//! Request extractors.

mod principal;
pub use principal::{PrincipalHeaders, USER_ID_HEADER, USER_ROLES_HEADER};
