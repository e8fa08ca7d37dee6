//! `gestor-auth`: pure authorization boundary for workflow actors.
//!
//! Authentication and sessions live outside this workspace; this crate only
//! answers "may this principal perform this operation".

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, authorize_any, AuthzError};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::{Role, RolePolicy};
