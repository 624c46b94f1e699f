//! Role levels for destructive admin operations
//!
//! Session issuance lives in the workspace's auth service; this module only
//! decides which role a validated token needs for each gateway operation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role levels for gateway operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
#[derive(Default)]
pub enum Role {
    /// Regular workspace member - no destructive operations
    #[default]
    Member = 0,
    /// Manager - bulk task operations, client archiving
    Manager = 1,
    /// Admin - person and project removal
    Admin = 2,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Member => write!(f, "member"),
            Role::Manager => write!(f, "manager"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// Get the required role for a gateway operation.
/// Returns None for unknown operations (which are blocked).
pub fn required_role(operation: &str) -> Option<Role> {
    match operation {
        // Admin - removing people and projects destroys history
        "delete_person" | "delete_archived_person" | "delete_project" => Some(Role::Admin),

        // Manager - bulk task maintenance and client archiving
        "bulk_tasks" | "archive_client" => Some(Role::Manager),

        // Unknown operations are blocked
        _ => None,
    }
}

/// Check if an operation is allowed for the given role
pub fn is_operation_allowed(operation: &str, role: Role) -> bool {
    match required_role(operation) {
        Some(required) => role >= required,
        None => false, // Unknown operations are blocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_operations() {
        assert!(!is_operation_allowed("delete_person", Role::Member));
        assert!(!is_operation_allowed("delete_person", Role::Manager));
        assert!(is_operation_allowed("delete_person", Role::Admin));
        assert!(is_operation_allowed("delete_project", Role::Admin));
    }

    #[test]
    fn test_manager_operations() {
        assert!(!is_operation_allowed("bulk_tasks", Role::Member));
        assert!(is_operation_allowed("bulk_tasks", Role::Manager));
        assert!(is_operation_allowed("archive_client", Role::Admin));
    }

    #[test]
    fn test_unknown_operations_blocked() {
        assert!(!is_operation_allowed("drop_database", Role::Admin));
    }

    #[test]
    fn test_role_ordering() {
        assert!(Role::Admin > Role::Manager);
        assert!(Role::Manager > Role::Member);
    }
}
