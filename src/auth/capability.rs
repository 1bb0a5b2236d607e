use crate::database::models::Role;

/// Operations gated by role. Every role check goes through [`Role::allows`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Complete the first-login flow with a self-chosen password
    SetInstructorPassword,
    /// Provision instructor accounts with a temporary password
    ProvisionInstructors,
    /// List, edit, activate and delete accounts; inspect OTP records
    ManageUsers,
    /// Read one's own enrollments and the payment key
    AccessLearning,
}

const STUDENT: &[Capability] = &[Capability::AccessLearning];
const INSTRUCTOR: &[Capability] = &[Capability::AccessLearning, Capability::SetInstructorPassword];
const ADMIN: &[Capability] = &[
    Capability::AccessLearning,
    Capability::ProvisionInstructors,
    Capability::ManageUsers,
];

impl Capability {
    /// Message returned with a 403 when the capability is missing
    pub fn denial_message(&self) -> &'static str {
        match self {
            Capability::SetInstructorPassword => "Only instructors can use this endpoint",
            Capability::ProvisionInstructors | Capability::ManageUsers => "Admin access required",
            Capability::AccessLearning => "Not authorized to access this route",
        }
    }
}

impl Role {
    fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::Student => STUDENT,
            Role::Instructor => INSTRUCTOR,
            Role::Admin => ADMIN,
        }
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_instructors_set_first_password() {
        assert!(Role::Instructor.allows(Capability::SetInstructorPassword));
        assert!(!Role::Admin.allows(Capability::SetInstructorPassword));
        assert!(!Role::Student.allows(Capability::SetInstructorPassword));
    }

    #[test]
    fn only_admins_manage_users() {
        for cap in [Capability::ManageUsers, Capability::ProvisionInstructors] {
            assert!(Role::Admin.allows(cap));
            assert!(!Role::Instructor.allows(cap));
            assert!(!Role::Student.allows(cap));
        }
    }

    #[test]
    fn everyone_reaches_learning_routes() {
        for role in [Role::Student, Role::Instructor, Role::Admin] {
            assert!(role.allows(Capability::AccessLearning));
        }
    }
}
