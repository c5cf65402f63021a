use strum_macros::Display;

/// Role ids as issued in the JWT `role` claim.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Display)]
pub enum Role {
    Admin = 1,
    Hr = 2,
    Employee = 3,
    System = 4,
    ApiUser = 5,
}

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Hr),
            3 => Some(Role::Employee),
            4 => Some(Role::System),
            5 => Some(Role::ApiUser),
            _ => None,
        }
    }

    /// May record and correct attendance for other employees.
    pub fn manages_attendance(self) -> bool {
        matches!(self, Role::Admin | Role::Hr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_and_unknown_ids_fail() {
        assert_eq!(Role::from_id(2), Some(Role::Hr));
        assert_eq!(Role::from_id(2).map(|r| r as u8), Some(2));
        assert_eq!(Role::from_id(9), None);
    }

    #[test]
    fn only_admin_and_hr_manage_attendance() {
        assert!(Role::Admin.manages_attendance());
        assert!(Role::Hr.manages_attendance());
        assert!(!Role::Employee.manages_attendance());
        assert!(!Role::ApiUser.manages_attendance());
    }
}
