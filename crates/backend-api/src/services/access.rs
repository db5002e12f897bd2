//! Role rules derived from the caller's profile and department memberships.
//!
//! RLS remains the authority on what rows come back; these checks give
//! callers a clear 403 before a write is attempted and narrow list queries
//! to what the caller is expected to see.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::routes::models::{MembershipRole, Role};
use crate::services::ServiceError;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Membership {
    pub department_id: Uuid,
    pub membership_role: MembershipRole,
}

#[derive(Debug, Clone)]
pub struct Access {
    role: Role,
    memberships: Vec<Membership>,
}

impl Access {
    pub fn new(role: Role, memberships: Vec<Membership>) -> Self {
        Self { role, memberships }
    }

    pub fn memberships(&self) -> &[Membership] {
        &self.memberships
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins and executives see every department.
    pub fn is_org_wide(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Executive)
    }

    pub fn is_member(&self, department_id: Uuid) -> bool {
        self.memberships
            .iter()
            .any(|m| m.department_id == department_id)
    }

    pub fn heads(&self, department_id: Uuid) -> bool {
        self.memberships.iter().any(|m| {
            m.department_id == department_id && m.membership_role == MembershipRole::Head
        })
    }

    pub fn can_view(&self, department_id: Uuid) -> bool {
        self.is_org_wide() || self.is_member(department_id)
    }

    pub fn can_manage(&self, department_id: Uuid) -> bool {
        self.is_admin() || self.heads(department_id)
    }

    pub fn can_contribute(&self, department_id: Uuid) -> bool {
        self.is_admin() || self.is_member(department_id)
    }

    pub fn department_ids(&self) -> Vec<Uuid> {
        self.memberships.iter().map(|m| m.department_id).collect()
    }

    pub fn headed_department_ids(&self) -> Vec<Uuid> {
        self.memberships
            .iter()
            .filter(|m| m.membership_role == MembershipRole::Head)
            .map(|m| m.department_id)
            .collect()
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if !self.is_admin() {
            return Err(ServiceError::forbidden("administrator role required"));
        }
        Ok(())
    }

    pub fn require_org_wide(&self) -> Result<(), ServiceError> {
        if !self.is_org_wide() {
            return Err(ServiceError::forbidden(
                "administrator or executive role required",
            ));
        }
        Ok(())
    }

    pub fn require_view(&self, department_id: Uuid) -> Result<(), ServiceError> {
        if !self.can_view(department_id) {
            return Err(ServiceError::forbidden("not a member of this department"));
        }
        Ok(())
    }

    pub fn require_manage(&self, department_id: Uuid) -> Result<(), ServiceError> {
        if !self.can_manage(department_id) {
            return Err(ServiceError::forbidden(
                "department head or administrator role required",
            ));
        }
        Ok(())
    }

    pub fn require_contribute(&self, department_id: Uuid) -> Result<(), ServiceError> {
        if !self.can_contribute(department_id) {
            return Err(ServiceError::forbidden("not a member of this department"));
        }
        Ok(())
    }

    /// Departments a department-scoped list should be narrowed to, or
    /// `None` when the caller sees everything.
    pub fn visible_departments(&self) -> Option<Vec<Uuid>> {
        if self.is_org_wide() {
            None
        } else {
            Some(self.department_ids())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membership(department_id: Uuid, membership_role: MembershipRole) -> Membership {
        Membership {
            department_id,
            membership_role,
        }
    }

    #[test]
    fn admin_manages_every_department() {
        let access = Access::new(Role::Admin, Vec::new());
        let department = Uuid::new_v4();

        assert!(access.is_org_wide());
        assert!(access.can_manage(department));
        assert!(access.can_contribute(department));
        assert!(access.visible_departments().is_none());
    }

    #[test]
    fn executive_sees_but_does_not_manage() {
        let access = Access::new(Role::Executive, Vec::new());
        let department = Uuid::new_v4();

        assert!(access.can_view(department));
        assert!(!access.can_manage(department));
        assert!(!access.can_contribute(department));
        assert!(access.require_org_wide().is_ok());
        assert!(access.require_admin().is_err());
    }

    #[test]
    fn staff_rules_follow_memberships() {
        let headed = Uuid::new_v4();
        let joined = Uuid::new_v4();
        let other = Uuid::new_v4();
        let access = Access::new(
            Role::Staff,
            vec![
                membership(headed, MembershipRole::Head),
                membership(joined, MembershipRole::Member),
            ],
        );

        assert!(!access.is_org_wide());
        assert!(access.can_manage(headed));
        assert!(!access.can_manage(joined));
        assert!(access.can_contribute(joined));
        assert!(!access.can_view(other));
        assert_eq!(access.headed_department_ids(), vec![headed]);
        assert_eq!(access.visible_departments(), Some(vec![headed, joined]));
    }

    #[test]
    fn require_manage_reports_forbidden() {
        let access = Access::new(Role::Staff, Vec::new());
        assert!(matches!(
            access.require_manage(Uuid::new_v4()),
            Err(ServiceError::Forbidden(_))
        ));
    }
}
