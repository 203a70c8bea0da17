//! Bitmask permissions, fixed roles and the grant table consulted before any statement runs.

use crate::error::{AppError, ConfigError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::path::Path;

/// Set of atomic capabilities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Permission(u16);

impl Permission {
    pub const NONE: Permission = Permission(0);
    pub const GET: Permission = Permission(1);
    pub const SEARCH: Permission = Permission(1 << 1);
    pub const POST: Permission = Permission(1 << 2);
    pub const PUT: Permission = Permission(1 << 3);
    pub const DELETE: Permission = Permission(1 << 4);
    pub const PATCH: Permission = Permission(1 << 5);
    pub const BULK: Permission = Permission(1 << 6);
    pub const OPTIONS: Permission = Permission(1 << 7);
    pub const ALL: Permission = Permission(0xff);

    const NAMES: [(&'static str, Permission); 8] = [
        ("get", Permission::GET),
        ("search", Permission::SEARCH),
        ("post", Permission::POST),
        ("put", Permission::PUT),
        ("delete", Permission::DELETE),
        ("patch", Permission::PATCH),
        ("bulk", Permission::BULK),
        ("options", Permission::OPTIONS),
    ];

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn union(self, other: Permission) -> Permission {
        Permission(self.0 | other.0)
    }

    /// True when every bit of `other` is present.
    pub const fn contains(self, other: Permission) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// One capability name (`get`, `search`, ..., plus `none` and `all`).
    pub fn parse_capability(name: &str) -> Option<Permission> {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "none" => Some(Permission::NONE),
            "all" => Some(Permission::ALL),
            _ => Self::NAMES.iter().find(|(n, _)| *n == name).map(|(_, p)| *p),
        }
    }

    /// Access string: a role name or a comma list of capabilities.
    pub fn parse_access(access: &str) -> Option<Permission> {
        if let Some(role) = Role::parse(access) {
            return Some(role.permission());
        }
        access
            .split(',')
            .try_fold(Permission::NONE, |acc, name| Some(acc | Permission::parse_capability(name)?))
    }
}

impl BitOr for Permission {
    type Output = Permission;
    fn bitor(self, rhs: Permission) -> Permission {
        self.union(rhs)
    }
}

impl BitOrAssign for Permission {
    fn bitor_assign(&mut self, rhs: Permission) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Permission {
    type Output = Permission;
    fn bitand(self, rhs: Permission) -> Permission {
        Permission(self.0 & rhs.0)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(_, p)| self.contains(*p))
            .map(|(n, _)| *n)
            .collect();
        write!(f, "{}", names.join(","))
    }
}

/// Composite roles with fixed capability sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Viewer,
    Editor,
    Owner,
    Manager,
    Admin,
}

impl Role {
    const TABLE: [(&'static str, Role); 5] = [
        ("viewer", Role::Viewer),
        ("editor", Role::Editor),
        ("owner", Role::Owner),
        ("manager", Role::Manager),
        ("admin", Role::Admin),
    ];

    pub fn parse(name: &str) -> Option<Role> {
        let name = name.trim();
        Self::TABLE
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, r)| *r)
    }

    pub const fn permission(self) -> Permission {
        const VIEWER: Permission = Permission::GET.union(Permission::SEARCH).union(Permission::OPTIONS);
        const EDITOR: Permission = VIEWER.union(Permission::POST).union(Permission::PUT).union(Permission::PATCH);
        const OWNER: Permission = EDITOR.union(Permission::DELETE);
        const MANAGER: Permission = OWNER.union(Permission::BULK);
        match self {
            Role::Viewer => VIEWER,
            Role::Editor => EDITOR,
            Role::Owner => OWNER,
            Role::Manager => MANAGER,
            Role::Admin => Permission::ALL,
        }
    }
}

/// What a request wants to do. Each maps to exactly one required capability set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    List,
    Read,
    Create { bulk: bool },
    Replace,
    Patch,
    Delete,
    Options,
}

impl Operation {
    pub fn required(self) -> Permission {
        match self {
            Operation::List => Permission::SEARCH,
            Operation::Read => Permission::GET,
            Operation::Create { bulk: false } => Permission::POST,
            Operation::Create { bulk: true } => Permission::POST | Permission::BULK,
            Operation::Replace => Permission::PUT,
            Operation::Patch => Permission::PATCH,
            Operation::Delete => Permission::DELETE,
            Operation::Options => Permission::OPTIONS,
        }
    }
}

/// Caller identity as established by an upstream authenticator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Option<String>,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn new(user_id: Option<&str>, roles: &[&str]) -> Self {
        Principal {
            user_id: user_id.map(str::to_string),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantHolder {
    User(String),
    Role(String),
}

/// One persisted grant row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    #[serde(flatten)]
    pub holder: GrantHolder,
    pub domain: String,
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default, rename = "id")]
    pub resource_id: Option<String>,
    pub access: String,
}

/// The resource a request addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Target<'a> {
    pub domain: &'a str,
    pub entity: &'a str,
    pub resource_id: Option<&'a str>,
}

impl Grant {
    fn held_by(&self, principal: &Principal) -> bool {
        match &self.holder {
            GrantHolder::User(user) => principal.user_id.as_deref() == Some(user.as_str()),
            GrantHolder::Role(role) => principal.has_role(role),
        }
    }

    fn covers(&self, target: &Target<'_>) -> bool {
        if !self.domain.eq_ignore_ascii_case(target.domain) {
            return false;
        }
        if let Some(entity) = &self.entity {
            if !entity.eq_ignore_ascii_case(target.entity) {
                return false;
            }
        }
        match (&self.resource_id, target.resource_id) {
            (None, _) => true,
            (Some(granted), Some(requested)) => granted == requested,
            (Some(_), None) => false,
        }
    }
}

#[derive(Clone, Debug)]
struct ParsedGrant {
    grant: Grant,
    permission: Permission,
}

#[derive(Clone, Debug, Default)]
pub struct PermissionGate {
    grants: Vec<ParsedGrant>,
}

impl PermissionGate {
    /// Grants with an unrecognized access string are skipped with a warning.
    pub fn new(grants: Vec<Grant>) -> Self {
        let grants = grants
            .into_iter()
            .filter_map(|grant| match Permission::parse_access(&grant.access) {
                Some(permission) => Some(ParsedGrant { grant, permission }),
                None => {
                    tracing::warn!(access = %grant.access, domain = %grant.domain, "skipping grant with unknown access");
                    None
                }
            })
            .collect();
        PermissionGate { grants }
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let grants: Vec<Grant> =
            serde_json::from_str(text).map_err(|e| ConfigError::Load(format!("grants: {}", e)))?;
        Ok(Self::new(grants))
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        let gate = Self::from_json(&text)?;
        tracing::info!(path = %path.display(), grants = gate.grants.len(), "grants loaded");
        Ok(gate)
    }

    /// Union of the principal's role flags and every matching grant.
    pub fn effective(&self, principal: &Principal, target: &Target<'_>) -> Permission {
        let mut permission = principal
            .roles
            .iter()
            .filter_map(|r| Role::parse(r))
            .fold(Permission::NONE, |acc, r| acc | r.permission());
        for parsed in &self.grants {
            if parsed.grant.held_by(principal) && parsed.grant.covers(target) {
                permission |= parsed.permission;
            }
        }
        permission
    }

    pub fn is_allowed(&self, principal: &Principal, operation: Operation, target: &Target<'_>) -> bool {
        self.effective(principal, target).contains(operation.required())
    }

    pub fn authorize(&self, principal: &Principal, operation: Operation, target: &Target<'_>) -> Result<(), AppError> {
        if self.is_allowed(principal, operation, target) {
            Ok(())
        } else {
            tracing::debug!(user = ?principal.user_id, ?operation, domain = target.domain, entity = target.entity, "denied");
            Err(AppError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target<'a>(entity: &'a str, id: Option<&'a str>) -> Target<'a> {
        Target {
            domain: "sales",
            entity,
            resource_id: id,
        }
    }

    #[test]
    fn roles_compose() {
        assert!(Role::Editor.permission().contains(Role::Viewer.permission()));
        assert!(!Role::Editor.permission().contains(Permission::DELETE));
        assert!(Role::Owner.permission().contains(Permission::DELETE));
        assert!(!Role::Owner.permission().contains(Permission::BULK));
        assert!(Role::Manager.permission().contains(Permission::BULK));
        assert_eq!(Role::Admin.permission(), Permission::ALL);
    }

    #[test]
    fn access_strings() {
        assert_eq!(Permission::parse_access("viewer"), Some(Role::Viewer.permission()));
        assert_eq!(
            Permission::parse_access("get, search"),
            Some(Permission::GET | Permission::SEARCH)
        );
        assert_eq!(Permission::parse_access("get,fly"), None);
        assert_eq!((Permission::GET | Permission::PATCH).to_string(), "get,patch");
        assert_eq!(Permission::NONE.to_string(), "none");
    }

    #[test]
    fn default_is_deny() {
        let gate = PermissionGate::default();
        let nobody = Principal::default();
        assert_eq!(gate.effective(&nobody, &target("orders", None)), Permission::NONE);
        assert!(matches!(
            gate.authorize(&nobody, Operation::Read, &target("orders", Some("1"))),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn verbs_map_to_bits() {
        let gate = PermissionGate::default();
        let editor = Principal::new(Some("u1"), &["Editor"]);
        let t = target("orders", None);
        assert!(gate.is_allowed(&editor, Operation::List, &t));
        assert!(gate.is_allowed(&editor, Operation::Create { bulk: false }, &t));
        assert!(!gate.is_allowed(&editor, Operation::Create { bulk: true }, &t));
        assert!(!gate.is_allowed(&editor, Operation::Delete, &t));
    }

    #[test]
    fn grants_match_user_role_and_scope() {
        let gate = PermissionGate::from_json(
            r#"[
                {"user": "alice", "domain": "sales", "entity": "orders", "access": "owner"},
                {"role": "clerks", "domain": "SALES", "access": "get,search"},
                {"user": "bob", "domain": "sales", "entity": "orders", "id": "42", "access": "patch"},
                {"user": "bob", "domain": "sales", "access": "teleport"}
            ]"#,
        )
        .unwrap();
        let alice = Principal::new(Some("alice"), &[]);
        assert!(gate.is_allowed(&alice, Operation::Delete, &target("orders", Some("9"))));
        assert!(!gate.is_allowed(&alice, Operation::Read, &target("customers", None)));

        let clerk = Principal::new(Some("carol"), &["clerks"]);
        assert!(gate.is_allowed(&clerk, Operation::List, &target("customers", None)));
        assert!(!gate.is_allowed(&clerk, Operation::Patch, &target("customers", None)));

        let bob = Principal::new(Some("bob"), &[]);
        assert!(gate.is_allowed(&bob, Operation::Patch, &target("orders", Some("42"))));
        assert!(!gate.is_allowed(&bob, Operation::Patch, &target("orders", Some("43"))));
        assert!(!gate.is_allowed(&bob, Operation::Patch, &target("orders", None)));
    }

    #[test]
    fn malformed_grant_document_is_a_config_error() {
        assert!(matches!(PermissionGate::from_json("{"), Err(ConfigError::Load(_))));
    }
}
