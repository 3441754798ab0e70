use std::collections::HashSet;

use thiserror::Error;

use payforge_core::TenantId;

use crate::{Permission, PrincipalId, Role};

/// A resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub tenant_id: TenantId,
    pub permissions: Vec<Permission>,
}

impl Principal {
    /// Build a principal whose permissions come from its roles.
    pub fn from_roles(principal_id: PrincipalId, tenant_id: TenantId, roles: &[Role]) -> Self {
        Self {
            principal_id,
            tenant_id,
            permissions: permissions_from_roles(roles),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Check a single permission. Pure: no IO, no panics.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let perms: HashSet<&str> = principal.permissions.iter().map(|p| p.as_str()).collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Static role→permission table.
///
/// - `admin`: everything in the tenant
/// - `payroll_officer`: read + write queues
/// - `viewer`: read queues
pub fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    let mut out = Vec::new();
    for role in roles {
        match role.as_str() {
            Role::ADMIN => return vec![Permission::WILDCARD],
            Role::PAYROLL_OFFICER => {
                out.push(Permission::QUEUE_READ);
                out.push(Permission::QUEUE_WRITE);
            }
            Role::VIEWER => out.push(Permission::QUEUE_READ),
            _ => {}
        }
    }
    out.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(roles: &[&'static str]) -> Principal {
        let roles: Vec<Role> = roles.iter().map(|r| Role::new(*r)).collect();
        Principal::from_roles(PrincipalId::new(), TenantId::new(), &roles)
    }

    #[test]
    fn admin_gets_everything() {
        let p = principal(&[Role::ADMIN]);
        assert!(authorize(&p, &Permission::QUEUE_WRITE).is_ok());
        assert!(authorize(&p, &Permission::new("anything.else")).is_ok());
    }

    #[test]
    fn viewer_can_only_read() {
        let p = principal(&[Role::VIEWER]);
        assert!(authorize(&p, &Permission::QUEUE_READ).is_ok());
        assert_eq!(
            authorize(&p, &Permission::QUEUE_WRITE),
            Err(AuthzError::Forbidden("queue.write".to_string()))
        );
    }

    #[test]
    fn overlapping_roles_are_deduplicated() {
        let p = principal(&[Role::VIEWER, Role::PAYROLL_OFFICER]);
        assert_eq!(p.permissions, vec![Permission::QUEUE_READ, Permission::QUEUE_WRITE]);
    }

    #[test]
    fn unknown_roles_grant_nothing() {
        let p = principal(&["janitor"]);
        assert!(p.permissions.is_empty());
    }
}
