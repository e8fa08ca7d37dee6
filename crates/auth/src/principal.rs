use serde::{Deserialize, Serialize};

use gestor_core::UserId;

use crate::{Permission, Role, RolePolicy};

/// A fully resolved actor for authorization decisions.
///
/// `permissions` already contains the grants of `roles`; construction is kept
/// apart from storage so services and tests can build principals directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub display_name: String,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            roles: Vec::new(),
            permissions: Vec::new(),
        }
    }

    /// Attach roles and resolve their permissions through `policy`.
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>, policy: &RolePolicy) -> Self {
        self.roles.extend(roles);
        let mut resolved = policy.resolve(&self.roles);
        resolved.retain(|p| !self.permissions.contains(p));
        self.permissions.extend(resolved);
        self
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        for permission in permissions {
            if !self.permissions.contains(&permission) {
                self.permissions.push(permission);
            }
        }
        self
    }

    pub fn has_permission(&self, required: &Permission) -> bool {
        self.permissions
            .iter()
            .any(|p| p.is_wildcard() || p == required)
    }
}
