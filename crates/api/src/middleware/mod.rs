//! Principal extraction and role checks.
//!
//! - [`auth::AuthUser`] -- The acting user, from gateway-supplied headers.
//! - [`rbac::RequireAdmin`] -- Requires the `admin` role.
//! - [`rbac::RequireTechnician`] -- Requires `technician` or `admin`.

pub mod auth;
pub mod rbac;
