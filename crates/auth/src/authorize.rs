use thiserror::Error;

use gestor_core::DomainError;

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Forbidden(permission) => {
                DomainError::unauthorized(format!("missing permission '{permission}'"))
            }
        }
    }
}

/// Authorize a principal for one permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.has_permission(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Authorize when the principal holds at least one of `accepted`.
pub fn authorize_any(principal: &Principal, accepted: &[Permission]) -> Result<(), AuthzError> {
    if accepted.iter().any(|p| principal.has_permission(p)) {
        return Ok(());
    }
    let names: Vec<&str> = accepted.iter().map(Permission::as_str).collect();
    Err(AuthzError::Forbidden(names.join(" | ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::requisitions;
    use crate::roles::{self, RolePolicy};
    use gestor_core::UserId;

    fn principal_with(perms: Vec<Permission>) -> Principal {
        Principal::new(UserId::new(), "Ana Pérez").with_permissions(perms)
    }

    #[test]
    fn authorize_allows_when_permission_present() {
        let p = principal_with(vec![requisitions::APPROVE]);
        assert!(authorize(&p, &requisitions::APPROVE).is_ok());
    }

    #[test]
    fn authorize_denies_when_permission_missing() {
        let p = principal_with(vec![requisitions::CREATE]);
        assert_eq!(
            authorize(&p, &requisitions::APPROVE),
            Err(AuthzError::Forbidden("solicitudes.aprobar_solicitud".to_string()))
        );
    }

    #[test]
    fn wildcard_allows_everything() {
        let p = Principal::new(UserId::new(), "Admin")
            .with_roles([roles::ADMIN], &RolePolicy::institutional());
        assert!(authorize(&p, &requisitions::DISPATCH).is_ok());
    }

    #[test]
    fn forbidden_maps_to_unauthorized_domain_error() {
        let err: DomainError = AuthzError::Forbidden("x.y".into()).into();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[test]
    fn authorize_any_accepts_one_match() {
        let p = principal_with(vec![requisitions::REJECT]);
        assert!(authorize_any(&p, &[requisitions::APPROVE, requisitions::REJECT]).is_ok());
        assert!(authorize_any(&p, &[requisitions::DISPATCH]).is_err());
    }

    #[test]
    fn principal_serializes_permissions_as_strings() {
        let p = principal_with(vec![requisitions::APPROVE]);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["permissions"][0], "solicitudes.aprobar_solicitud");
    }
}
