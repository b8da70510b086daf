//! Well-known role name constants.
//!
//! Roles are supplied by the upstream principal provider; these must match
//! the values it emits.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_TECHNICIAN: &str = "technician";
pub const ROLE_REQUESTER: &str = "requester";

/// Whether the role may act on tickets as a technician (accept/reject/close).
pub fn can_work_tickets(role: &str) -> bool {
    role == ROLE_TECHNICIAN || role == ROLE_ADMIN
}

/// Whether the role carries administrator privileges.
pub fn is_admin(role: &str) -> bool {
    role == ROLE_ADMIN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn technicians_and_admins_work_tickets() {
        assert!(can_work_tickets(ROLE_TECHNICIAN));
        assert!(can_work_tickets(ROLE_ADMIN));
        assert!(!can_work_tickets(ROLE_REQUESTER));
        assert!(!can_work_tickets(""));
    }

    #[test]
    fn only_admin_is_admin() {
        assert!(is_admin(ROLE_ADMIN));
        assert!(!is_admin(ROLE_TECHNICIAN));
    }
}
