//! Per-request identity, inserted by [`crate::middleware::auth_middleware`].

use payforge_auth::{Principal, PrincipalId, Role};
use payforge_core::TenantId;

/// The tenant every queue read and write of this request is scoped to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Authenticated caller and the roles granted by the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>) -> Self {
        Self { principal_id, roles }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Resolve permissions for authorization within `tenant`.
    pub fn principal(&self, tenant: &TenantContext) -> Principal {
        Principal::from_roles(self.principal_id, tenant.tenant_id(), &self.roles)
    }
}
