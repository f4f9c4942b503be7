use glean_domain::{transitions, EntityStatus, Role, TransitionCtx, UserId};
use serde::{Deserialize, Serialize};

use crate::error::CommandError;

/// The authenticated caller, as decoded from the edge identity assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub email: String,
    pub roles: Vec<Role>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>, roles: Vec<Role>) -> Self {
        Self { user_id: UserId::new(user_id), email: email.into(), roles }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_privileged(&self) -> bool {
        self.roles.iter().any(|r| r.is_privileged())
    }

    pub fn owns(&self, owner: &UserId) -> bool {
        &self.user_id == owner
    }

    /// Per-command role allowlist; admin always passes.
    pub fn require_any(&self, allowed: &[Role]) -> Result<(), CommandError> {
        if self.is_admin() || self.roles.iter().any(|r| allowed.contains(r)) {
            return Ok(());
        }
        Err(CommandError::forbidden(format!(
            "requires one of roles: {}",
            allowed.iter().map(Role::to_string).collect::<Vec<_>>().join(", ")
        )))
    }

    /// Owner-or-privileged authorization; returns whether the actor owns the
    /// target (the state machine cares for owner-permitted rows).
    pub fn require_owner_or(
        &self,
        owner: &UserId,
        allowed: &[Role],
    ) -> Result<bool, CommandError> {
        if self.owns(owner) {
            return Ok(true);
        }
        self.require_any(allowed)?;
        Ok(false)
    }

    /// Find a role of this actor that permits `from -> to`. When several
    /// roles would, any is equivalent; when none does, the most specific
    /// refusal (missing justification over missing role) is surfaced.
    pub fn transition_role(
        &self,
        from: EntityStatus,
        to: EntityStatus,
        is_owner: bool,
        justification: Option<&str>,
    ) -> Result<Role, CommandError> {
        let ctx = TransitionCtx {
            justification: justification.map(String::from),
            is_owner,
        };

        let mut last_err = None;
        for role in &self.roles {
            match transitions::transition(from, to, *role, &ctx) {
                Ok(()) => return Ok(*role),
                Err(e @ glean_domain::DomainError::JustificationRequired { .. }) => {
                    return Err(e.into());
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err
            .map(CommandError::from)
            .unwrap_or_else(|| {
                CommandError::InvalidStateTransition(format!(
                    "transition {} -> {} is not allowed",
                    from, to
                ))
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_passes_any_allowlist() {
        let admin = Actor::new("a1", "a@x.org", vec![Role::Admin]);
        assert!(admin.require_any(&[Role::Operator]).is_ok());
    }

    #[test]
    fn missing_role_is_forbidden() {
        let driver = Actor::new("d1", "d@x.org", vec![Role::Driver]);
        let err = driver.require_any(&[Role::Operator]).unwrap_err();
        assert_eq!(err.code(), "AUTHORIZATION_ERROR");
    }

    #[test]
    fn owner_bypasses_allowlist() {
        let supplier = Actor::new("s1", "s@x.org", vec![Role::Supplier]);
        let is_owner = supplier
            .require_owner_or(&UserId::new("s1"), &[Role::Operator])
            .unwrap();
        assert!(is_owner);

        assert!(supplier
            .require_owner_or(&UserId::new("someone-else"), &[Role::Operator])
            .is_err());
    }

    #[test]
    fn transition_role_prefers_justification_error() {
        let operator = Actor::new("o1", "o@x.org", vec![Role::Operator]);
        let err = operator
            .transition_role(EntityStatus::Posted, EntityStatus::Canceled, false, None)
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE_TRANSITION");
        assert!(err.to_string().contains("justification"));

        let role = operator
            .transition_role(
                EntityStatus::Posted,
                EntityStatus::Canceled,
                false,
                Some("supplier request"),
            )
            .unwrap();
        assert_eq!(role, Role::Operator);
    }
}
