//! Role and permission types for the static RBAC policy (§3, §4.3).

use serde::{Deserialize, Serialize};

/// One of the three fixed platform roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
    Viewer,
}

impl Role {
    /// Returns the permissions this role is granted, per the frozen
    /// role→permission table in §4.3. `Admin` is granted every permission;
    /// callers should still prefer `User::is_admin` to short-circuit path
    /// checks rather than enumerating this set.
    #[must_use]
    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Self::Admin => &[
                Permission::DataSourceCreate,
                Permission::DataSourceRead,
                Permission::DataSourceUpdate,
                Permission::DataSourceDelete,
                Permission::TaskCreate,
                Permission::TaskRead,
                Permission::TaskUpdate,
                Permission::TaskDelete,
                Permission::TaskExecute,
                Permission::SystemAdmin,
                Permission::AuditRead,
            ],
            Self::Operator => &[
                Permission::DataSourceCreate,
                Permission::DataSourceRead,
                Permission::DataSourceUpdate,
                Permission::TaskCreate,
                Permission::TaskRead,
                Permission::TaskUpdate,
                Permission::TaskExecute,
            ],
            Self::Viewer => &[Permission::DataSourceRead, Permission::TaskRead],
        }
    }

    #[must_use]
    pub fn grants(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Admin => "admin",
            Self::Operator => "operator",
            Self::Viewer => "viewer",
        };
        write!(f, "{s}")
    }
}

/// A tagged value in the fixed permission enumeration (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    #[serde(rename = "datasource:create")]
    DataSourceCreate,
    #[serde(rename = "datasource:read")]
    DataSourceRead,
    #[serde(rename = "datasource:update")]
    DataSourceUpdate,
    #[serde(rename = "datasource:delete")]
    DataSourceDelete,
    #[serde(rename = "task:create")]
    TaskCreate,
    #[serde(rename = "task:read")]
    TaskRead,
    #[serde(rename = "task:update")]
    TaskUpdate,
    #[serde(rename = "task:delete")]
    TaskDelete,
    #[serde(rename = "task:execute")]
    TaskExecute,
    #[serde(rename = "system:admin")]
    SystemAdmin,
    #[serde(rename = "audit:read")]
    AuditRead,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::DataSourceCreate => "datasource:create",
            Self::DataSourceRead => "datasource:read",
            Self::DataSourceUpdate => "datasource:update",
            Self::DataSourceDelete => "datasource:delete",
            Self::TaskCreate => "task:create",
            Self::TaskRead => "task:read",
            Self::TaskUpdate => "task:update",
            Self::TaskDelete => "task:delete",
            Self::TaskExecute => "task:execute",
            Self::SystemAdmin => "system:admin",
            Self::AuditRead => "audit:read",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_grants_everything_operator_grants() {
        for p in Role::Operator.permissions() {
            assert!(Role::Admin.grants(*p));
        }
    }

    #[test]
    fn admin_grants_system_admin_operator_does_not() {
        assert!(Role::Admin.grants(Permission::SystemAdmin));
        assert!(!Role::Operator.grants(Permission::SystemAdmin));
        assert!(!Role::Viewer.grants(Permission::SystemAdmin));
    }

    #[test]
    fn viewer_is_read_only() {
        assert!(Role::Viewer.grants(Permission::DataSourceRead));
        assert!(Role::Viewer.grants(Permission::TaskRead));
        assert!(!Role::Viewer.grants(Permission::DataSourceCreate));
        assert!(!Role::Viewer.grants(Permission::TaskDelete));
    }

    #[test]
    fn operator_can_create_and_update_but_not_delete() {
        assert!(Role::Operator.grants(Permission::DataSourceCreate));
        assert!(Role::Operator.grants(Permission::DataSourceUpdate));
        assert!(!Role::Operator.grants(Permission::DataSourceDelete));
        assert!(!Role::Operator.grants(Permission::TaskDelete));
    }

    #[test]
    fn role_set_serialization_format() {
        let json = serde_json::to_string(&Role::Operator).expect("serialize");
        assert_eq!(json, "\"operator\"");
    }

    #[test]
    fn permission_display_matches_wire_form() {
        assert_eq!(Permission::TaskExecute.to_string(), "task:execute");
        assert_eq!(Permission::SystemAdmin.to_string(), "system:admin");
    }
}
