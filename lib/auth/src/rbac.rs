//! Static RBAC policy (C4, §4.3, §6): path+method → required-permission
//! lookup with `*`-glob segment matching.

use crate::role::Permission;

/// HTTP method as used by the RBAC table. Kept independent of any HTTP
/// framework's method type so this crate has no web-framework dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

struct Route {
    methods: &'static [Method],
    pattern: &'static str,
    permission: Permission,
}

/// The frozen path→permission table from §6. `/api/v1/system/*` matches any
/// method and requires `system:admin`; everything else is method-specific.
const ROUTES: &[Route] = &[
    Route {
        methods: &[Method::Get],
        pattern: "/api/v1/datasources",
        permission: Permission::DataSourceRead,
    },
    Route {
        methods: &[Method::Post],
        pattern: "/api/v1/datasources",
        permission: Permission::DataSourceCreate,
    },
    Route {
        methods: &[Method::Get],
        pattern: "/api/v1/datasources/*",
        permission: Permission::DataSourceRead,
    },
    Route {
        methods: &[Method::Put],
        pattern: "/api/v1/datasources/*",
        permission: Permission::DataSourceUpdate,
    },
    Route {
        methods: &[Method::Delete],
        pattern: "/api/v1/datasources/*",
        permission: Permission::DataSourceDelete,
    },
    Route {
        methods: &[Method::Post],
        pattern: "/api/v1/datasources/*/test",
        permission: Permission::DataSourceRead,
    },
    Route {
        methods: &[Method::Post],
        pattern: "/api/v1/datasources/batch",
        permission: Permission::DataSourceUpdate,
    },
    Route {
        methods: &[Method::Get],
        pattern: "/api/v1/datasources/export",
        permission: Permission::DataSourceRead,
    },
    Route {
        methods: &[Method::Post],
        pattern: "/api/v1/datasources/import",
        permission: Permission::DataSourceCreate,
    },
    Route {
        methods: &[Method::Get],
        pattern: "/api/v1/tasks",
        permission: Permission::TaskRead,
    },
    Route {
        methods: &[Method::Post],
        pattern: "/api/v1/tasks",
        permission: Permission::TaskCreate,
    },
    Route {
        methods: &[Method::Get],
        pattern: "/api/v1/tasks/*",
        permission: Permission::TaskRead,
    },
    Route {
        methods: &[Method::Put],
        pattern: "/api/v1/tasks/*",
        permission: Permission::TaskUpdate,
    },
    Route {
        methods: &[Method::Delete],
        pattern: "/api/v1/tasks/*",
        permission: Permission::TaskDelete,
    },
    Route {
        methods: &[Method::Post],
        pattern: "/api/v1/tasks/*/start",
        permission: Permission::TaskExecute,
    },
    Route {
        methods: &[Method::Post],
        pattern: "/api/v1/tasks/*/stop",
        permission: Permission::TaskExecute,
    },
    Route {
        methods: &[Method::Post],
        pattern: "/api/v1/tasks/*/pause",
        permission: Permission::TaskExecute,
    },
    Route {
        methods: &[Method::Post],
        pattern: "/api/v1/tasks/*/resume",
        permission: Permission::TaskExecute,
    },
    Route {
        methods: &[Method::Post],
        pattern: "/api/v1/tasks/*/retry",
        permission: Permission::TaskExecute,
    },
    Route {
        methods: &[Method::Get],
        pattern: "/api/v1/audit",
        permission: Permission::AuditRead,
    },
    Route {
        methods: &[Method::Get],
        pattern: "/api/v1/audit/*",
        permission: Permission::AuditRead,
    },
];

/// Splits on `/`, literal equality per segment, with `*` matching a single
/// segment; segment counts must match. A trailing `*` segment in `pattern`
/// additionally matches any *number* of remaining path segments (used for
/// `/api/v1/system/*`), mirroring the illustrative table in §6.
#[must_use]
pub fn match_path(pattern: &str, path: &str) -> bool {
    let pattern_segs: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if pattern_segs.last() == Some(&"**") {
        let prefix = &pattern_segs[..pattern_segs.len() - 1];
        if path_segs.len() < prefix.len() {
            return false;
        }
        return prefix
            .iter()
            .zip(path_segs.iter())
            .all(|(p, s)| *p == "*" || p == s);
    }

    if pattern_segs.len() != path_segs.len() {
        return false;
    }
    pattern_segs
        .iter()
        .zip(path_segs.iter())
        .all(|(p, s)| *p == "*" || p == s)
}

/// `path+method → required-permission` lookup (§4.3, §6).
pub struct RbacPolicy;

impl RbacPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the permission required for `(method, path)`, or `None` if
    /// the path is unrecognized (callers should then decide a default — the
    /// edge treats an unmatched path under `/api/v1/system/` as
    /// `system:admin` and anything else unmatched as a 404 upstream of RBAC).
    #[must_use]
    pub fn required_permission(&self, method: Method, path: &str) -> Option<Permission> {
        if match_path("/api/v1/system/**", path) {
            return Some(Permission::SystemAdmin);
        }
        ROUTES
            .iter()
            .find(|r| r.methods.contains(&method) && match_path(r.pattern, path))
            .map(|r| r.permission)
    }
}

impl Default for RbacPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// The default skip list: paths excluded from authentication and RBAC
/// (§4.3) but not from rate limiting or audit (§4.9).
#[must_use]
pub fn default_skip_paths() -> Vec<&'static str> {
    vec!["/health", "/api/v1/login", "/api/v1/refresh"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_match_single_wildcard_segment() {
        assert!(match_path("/a/*/b", "/a/x/b"));
        assert!(!match_path("/a/*", "/a/x/y"));
    }

    #[test]
    fn path_match_requires_equal_segment_count() {
        assert!(!match_path("/a/b", "/a/b/c"));
    }

    #[test]
    fn datasource_get_collection_requires_read() {
        let rbac = RbacPolicy::new();
        assert_eq!(
            rbac.required_permission(Method::Get, "/api/v1/datasources"),
            Some(Permission::DataSourceRead)
        );
    }

    #[test]
    fn datasource_delete_item_requires_delete() {
        let rbac = RbacPolicy::new();
        assert_eq!(
            rbac.required_permission(Method::Delete, "/api/v1/datasources/123"),
            Some(Permission::DataSourceDelete)
        );
    }

    #[test]
    fn task_action_requires_execute() {
        let rbac = RbacPolicy::new();
        assert_eq!(
            rbac.required_permission(Method::Post, "/api/v1/tasks/w1/start"),
            Some(Permission::TaskExecute)
        );
    }

    #[test]
    fn system_wildcard_matches_any_method_and_depth() {
        let rbac = RbacPolicy::new();
        assert_eq!(
            rbac.required_permission(Method::Get, "/api/v1/system/config"),
            Some(Permission::SystemAdmin)
        );
        assert_eq!(
            rbac.required_permission(Method::Post, "/api/v1/system/a/b/c"),
            Some(Permission::SystemAdmin)
        );
    }

    #[test]
    fn unknown_path_has_no_required_permission() {
        let rbac = RbacPolicy::new();
        assert_eq!(
            rbac.required_permission(Method::Get, "/api/v1/unknown"),
            None
        );
    }

    #[test]
    fn skip_list_contains_health_and_login() {
        let skip = default_skip_paths();
        assert!(skip.contains(&"/health"));
        assert!(skip.contains(&"/api/v1/login"));
        assert!(skip.contains(&"/api/v1/refresh"));
    }
}
