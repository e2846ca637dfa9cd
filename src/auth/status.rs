use crate::models::Status;

/// StatusGate
///
/// The one place that decides whether a status lets a record act or be acted
/// upon. Routes pick an allow-set instead of comparing status strings ad hoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusGate {
    allowed: &'static [Status],
}

impl StatusGate {
    /// Mutations and session refresh.
    pub const ACTIVE: StatusGate = StatusGate::new(&[Status::Ok, Status::Unverified]);

    /// Authenticated reads.
    pub const READ: StatusGate = StatusGate::new(&Status::ALL);

    /// Role profiles (admin, company) only count while `ok`.
    pub const PROFILE: StatusGate = StatusGate::new(&[Status::Ok]);

    pub const fn new(allowed: &'static [Status]) -> Self {
        Self { allowed }
    }

    pub fn admits(&self, status: Status) -> bool {
        self.allowed.contains(&status)
    }

    pub fn allowed(&self) -> &'static [Status] {
        self.allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_gate_rejects_retired_accounts() {
        assert!(StatusGate::ACTIVE.admits(Status::Ok));
        assert!(StatusGate::ACTIVE.admits(Status::Unverified));
        assert!(!StatusGate::ACTIVE.admits(Status::Deactivated));
        assert!(!StatusGate::ACTIVE.admits(Status::Suspended));
    }

    #[test]
    fn profile_gate_only_admits_ok() {
        assert!(StatusGate::PROFILE.admits(Status::Ok));
        assert!(!StatusGate::PROFILE.admits(Status::Unverified));
    }
}
