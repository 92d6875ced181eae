//! Permission gating for notification feeds.
//!
//! The auth collaborator is external; this module only defines the seam the
//! detectors consult plus two in-repo implementations (everything-granted,
//! and a static set driven by configuration).

use std::collections::HashSet;

/// Permission required to emit ticket notifications.
pub const TICKET_NOTIFICATIONS: &str = "notifications.tickets";

/// Permission required to emit reservation notifications.
pub const RESERVATION_NOTIFICATIONS: &str = "notifications.reservations";

/// Asks the auth collaborator whether the current operator holds a
/// permission. A denied permission skips the detection cycle entirely.
pub trait PermissionGate: Send + Sync {
    /// True when the named permission is granted.
    fn has_permission(&self, name: &str) -> bool;
}

/// Grants everything. Default for single-operator deployments and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionGate for AllowAll {
    fn has_permission(&self, _name: &str) -> bool {
        true
    }
}

/// Grants exactly the configured set of permission names.
#[derive(Debug, Clone, Default)]
pub struct StaticGate {
    granted: HashSet<String>,
}

impl StaticGate {
    /// Build a gate from a list of granted permission names.
    #[must_use]
    pub fn new<I, S>(granted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            granted: granted.into_iter().map(Into::into).collect(),
        }
    }
}

impl PermissionGate for StaticGate {
    fn has_permission(&self, name: &str) -> bool {
        self.granted.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_all_grants_anything() {
        assert!(AllowAll.has_permission(TICKET_NOTIFICATIONS));
        assert!(AllowAll.has_permission("made.up"));
    }

    #[test]
    fn static_gate_grants_only_configured() {
        let gate = StaticGate::new([TICKET_NOTIFICATIONS]);
        assert!(gate.has_permission(TICKET_NOTIFICATIONS));
        assert!(!gate.has_permission(RESERVATION_NOTIFICATIONS));
    }

    #[test]
    fn empty_static_gate_denies_everything() {
        let gate = StaticGate::default();
        assert!(!gate.has_permission(TICKET_NOTIFICATIONS));
    }
}
