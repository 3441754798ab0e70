//! Permission guard for queue endpoints.

use payforge_auth::{authorize, AuthzError, Permission};

use crate::context::{PrincipalContext, TenantContext};

/// Check one permission for the current request.
pub fn require(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    permission: &Permission,
) -> Result<(), AuthzError> {
    authorize(&principal.principal(tenant), permission)
}

#[cfg(test)]
mod tests {
    use super::*;
    use payforge_auth::{PrincipalId, Role};
    use payforge_core::TenantId;

    fn ctx(roles: &[&'static str]) -> (TenantContext, PrincipalContext) {
        (
            TenantContext::new(TenantId::new()),
            PrincipalContext::new(PrincipalId::new(), roles.iter().map(|r| Role::new(*r)).collect()),
        )
    }

    #[test]
    fn viewers_read_but_do_not_write() {
        let (tenant, principal) = ctx(&[Role::VIEWER]);
        assert!(require(&tenant, &principal, &Permission::QUEUE_READ).is_ok());
        assert!(require(&tenant, &principal, &Permission::QUEUE_WRITE).is_err());
    }

    #[test]
    fn admins_and_payroll_officers_write() {
        for role in [Role::ADMIN, Role::PAYROLL_OFFICER] {
            let (tenant, principal) = ctx(&[role]);
            assert!(require(&tenant, &principal, &Permission::QUEUE_WRITE).is_ok());
        }
        let (tenant, principal) = ctx(&[]);
        assert!(require(&tenant, &principal, &Permission::QUEUE_READ).is_err());
    }
}
