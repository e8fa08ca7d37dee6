use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::permissions::{self, Permission};

/// Role identifier used for RBAC (a named group of permissions).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const ADMIN: Role = Role::from_static("administrador");
pub const APPROVER: Role = Role::from_static("aprobador");
pub const WAREHOUSE_KEEPER: Role = Role::from_static("bodeguero");
pub const REQUESTER: Role = Role::from_static("solicitante");

/// Role → permission mapping.
#[derive(Debug, Clone, Default)]
pub struct RolePolicy {
    grants: HashMap<Role, Vec<Permission>>,
}

impl RolePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, role: Role, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.grants.entry(role).or_default().extend(permissions);
        self
    }

    pub fn permissions_for(&self, role: &Role) -> &[Permission] {
        self.grants.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Union of the permissions granted by `roles`, deduplicated and sorted.
    pub fn resolve<'a>(&self, roles: impl IntoIterator<Item = &'a Role>) -> Vec<Permission> {
        roles
            .into_iter()
            .flat_map(|role| self.permissions_for(role).iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The institution's stock groups: administrators, approvers, warehouse keepers
    /// and plain requesters.
    pub fn institutional() -> Self {
        use permissions::{assets, purchasing, requisitions, warehouse, writeoffs};

        Self::new()
            .grant(ADMIN, [permissions::ALL])
            .grant(
                APPROVER,
                [
                    requisitions::APPROVE,
                    requisitions::REJECT,
                    purchasing::AUTHORIZE,
                    purchasing::CHANGE,
                    writeoffs::AUTHORIZE,
                    writeoffs::CHANGE,
                ],
            )
            .grant(
                WAREHOUSE_KEEPER,
                [
                    requisitions::DISPATCH,
                    purchasing::RECEIVE,
                    warehouse::MANAGE_ARTICLES,
                    warehouse::MOVE_STOCK,
                    assets::MANAGE_ASSETS,
                    assets::MOVE_ASSETS,
                    writeoffs::CREATE,
                ],
            )
            .grant(
                REQUESTER,
                [requisitions::CREATE, requisitions::CHANGE, purchasing::CREATE],
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_merges_and_deduplicates() {
        let policy = RolePolicy::new()
            .grant(Role::new("a"), [permissions::requisitions::APPROVE])
            .grant(
                Role::new("b"),
                [permissions::requisitions::APPROVE, permissions::requisitions::REJECT],
            );

        let resolved = policy.resolve(&[Role::new("a"), Role::new("b")]);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn unknown_role_grants_nothing() {
        let policy = RolePolicy::institutional();
        assert!(policy.permissions_for(&Role::new("visitante")).is_empty());
    }
}
