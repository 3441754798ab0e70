//! `payforge-auth`: bearer-token tenant extraction and permission checks.
//!
//! Decoupled from HTTP and storage: the API layer turns a request header into
//! a validated [`JwtClaims`], and checks [`Permission`]s against the roles it
//! carries.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, permissions_from_roles, AuthzError, Principal};
pub use claims::{validate_claims, JwtClaims, TokenValidationError};
pub use jwt::{Hs256JwtValidator, JwtValidator, TokenError};
pub use permissions::Permission;
pub use principal::PrincipalId;
pub use roles::Role;
