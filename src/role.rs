//! Role classification and capability policy
//!
//! Every request resolves the caller's groups to a single [`Role`] exactly
//! once; handlers and the ticket lifecycle service receive the resolved
//! role and never re-query membership. Precedence is Manager over Agent
//! over Student, and an account in no recognized group is classified as a
//! Student.

use crate::group::{GROUP_MANAGER, GROUP_SUPPORT_AGENT};

bitflags::bitflags! {
    /// Flat capability set backing the role checks. The per-role sets are
    /// fixed at compile time; there is no runtime permission storage.
    pub struct Capabilities: u32 {
        const TICKET_CREATE          = 1 << 0;
        /// View and list every ticket regardless of ownership.
        const TICKET_VIEW_ALL        = 1 << 1;
        /// Write any ticket field, including reassignment.
        const TICKET_UPDATE_ANY      = 1 << 2;
        /// Write the agent field subset (status, internal notes) on
        /// tickets assigned to the caller.
        const TICKET_UPDATE_ASSIGNED = 1 << 3;
        const TICKET_ASSIGN          = 1 << 4;
        const TICKET_DUPLICATE       = 1 << 5;
        const COMMENT_ADD            = 1 << 6;
        /// Author internal comments and read other people's.
        const COMMENT_INTERNAL       = 1 << 7;
        const ATTACHMENT_ADD         = 1 << 8;
    }
}

const STUDENT_CAPABILITIES: Capabilities = Capabilities::from_bits_truncate(
    Capabilities::TICKET_CREATE.bits()
        | Capabilities::COMMENT_ADD.bits()
        | Capabilities::ATTACHMENT_ADD.bits(),
);

const AGENT_CAPABILITIES: Capabilities = Capabilities::from_bits_truncate(
    STUDENT_CAPABILITIES.bits()
        | Capabilities::TICKET_UPDATE_ASSIGNED.bits()
        | Capabilities::COMMENT_INTERNAL.bits(),
);

const MANAGER_CAPABILITIES: Capabilities = Capabilities::from_bits_truncate(
    AGENT_CAPABILITIES.bits()
        | Capabilities::TICKET_VIEW_ALL.bits()
        | Capabilities::TICKET_UPDATE_ANY.bits()
        | Capabilities::TICKET_ASSIGN.bits()
        | Capabilities::TICKET_DUPLICATE.bits(),
);

/// A caller's role for the duration of one request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Student,
    Agent,
    Manager,
}

impl Role {
    /// Classify a set of group names. Manager wins over Agent wins over
    /// Student; membership in no recognized group falls back to Student.
    pub fn resolve<S: AsRef<str>>(group_names: &[S]) -> Role {
        let has = |name: &str| group_names.iter().any(|g| g.as_ref() == name);

        if has(GROUP_MANAGER) {
            Role::Manager
        } else if has(GROUP_SUPPORT_AGENT) {
            Role::Agent
        } else {
            // Explicit GROUP_STUDENT membership and "no group at all"
            // classify the same way.
            Role::Student
        }
    }

    pub fn capabilities(self) -> Capabilities {
        match self {
            Role::Student => STUDENT_CAPABILITIES,
            Role::Agent => AGENT_CAPABILITIES,
            Role::Manager => MANAGER_CAPABILITIES,
        }
    }

    pub fn can(self, capability: Capabilities) -> bool {
        self.capabilities().contains(capability)
    }

    pub fn is_manager(self) -> bool {
        self == Role::Manager
    }

    pub fn is_agent(self) -> bool {
        self == Role::Agent
    }

    pub fn is_student(self) -> bool {
        self == Role::Student
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Agent => "Agent",
            Role::Manager => "Manager",
        }
    }
}

/// The resolved identity a lifecycle operation acts on behalf of.
#[derive(Copy, Clone, Debug)]
pub struct Requester {
    pub user_id: i32,
    pub role: Role,
}

impl Requester {
    pub fn new(user_id: i32, role: Role) -> Self {
        Self { user_id, role }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn manager_wins_over_agent() {
        let role = Role::resolve(&names(&["SupportAgent", "Manager"]));
        assert_eq!(role, Role::Manager);
    }

    #[test]
    fn agent_wins_over_student() {
        let role = Role::resolve(&names(&["Student", "SupportAgent"]));
        assert_eq!(role, Role::Agent);
    }

    #[test]
    fn unclassified_accounts_are_students() {
        assert_eq!(Role::resolve(&names(&[])), Role::Student);
        assert_eq!(Role::resolve(&names(&["Choir"])), Role::Student);
        assert_eq!(Role::resolve(&names(&["Student"])), Role::Student);
    }

    #[test]
    fn group_names_are_case_sensitive() {
        assert_eq!(Role::resolve(&names(&["manager"])), Role::Student);
    }

    #[test]
    fn capability_sets_are_nested() {
        let student = Role::Student.capabilities();
        let agent = Role::Agent.capabilities();
        let manager = Role::Manager.capabilities();

        assert!(agent.contains(student));
        assert!(manager.contains(agent));
        assert_ne!(student, agent);
        assert_ne!(agent, manager);
    }

    #[test]
    fn students_cannot_touch_internal_or_assignment() {
        let caps = Role::Student.capabilities();
        assert!(caps.contains(Capabilities::TICKET_CREATE));
        assert!(!caps.contains(Capabilities::COMMENT_INTERNAL));
        assert!(!caps.contains(Capabilities::TICKET_ASSIGN));
        assert!(!caps.contains(Capabilities::TICKET_VIEW_ALL));
    }

    #[test]
    fn agents_update_assigned_but_never_assign() {
        let caps = Role::Agent.capabilities();
        assert!(caps.contains(Capabilities::TICKET_UPDATE_ASSIGNED));
        assert!(!caps.contains(Capabilities::TICKET_UPDATE_ANY));
        assert!(!caps.contains(Capabilities::TICKET_ASSIGN));
        assert!(!caps.contains(Capabilities::TICKET_DUPLICATE));
    }
}
