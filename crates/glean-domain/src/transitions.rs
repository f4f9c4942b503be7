use crate::error::DomainError;
use crate::types::{EntityStatus, Role};

use EntityStatus::*;
use Role::*;

// ── Transition table ──────────────────────────────────────────────────────────

/// One row of the lifecycle transition table.
///
/// `owner_may` rows additionally admit the entity owner (the command layer
/// verifies actual ownership; the state machine only knows the role).
#[derive(Debug, Clone, Copy)]
pub struct TransitionRule {
    pub from: EntityStatus,
    pub to: EntityStatus,
    pub roles: &'static [Role],
    pub owner_may: bool,
    pub requires_justification: bool,
}

/// The canonical role-gated transition set shared by listings, demands,
/// matches and tasks. Rows are exhaustive; anything absent is rejected.
pub const TRANSITION_TABLE: &[TransitionRule] = &[
    TransitionRule { from: Posted, to: Matched, roles: &[System, Operator, Admin], owner_may: false, requires_justification: false },
    TransitionRule { from: Matched, to: Scheduled, roles: &[Operator, Admin], owner_may: false, requires_justification: false },
    TransitionRule { from: Scheduled, to: PickedUp, roles: &[Driver, Operator, Admin], owner_may: false, requires_justification: false },
    TransitionRule { from: PickedUp, to: Delivered, roles: &[Driver, Operator, Admin], owner_may: false, requires_justification: false },
    TransitionRule { from: Posted, to: Expired, roles: &[System, Operator, Admin], owner_may: false, requires_justification: false },
    TransitionRule { from: Posted, to: Closed, roles: &[Recipient, Operator, Admin], owner_may: false, requires_justification: false },
    TransitionRule { from: Posted, to: Canceled, roles: &[Operator, Admin], owner_may: true, requires_justification: true },
    TransitionRule { from: Matched, to: Canceled, roles: &[Operator, Admin], owner_may: true, requires_justification: true },
    TransitionRule { from: Scheduled, to: Canceled, roles: &[Operator, Admin], owner_may: false, requires_justification: true },
    TransitionRule { from: PickedUp, to: Canceled, roles: &[Operator, Admin], owner_may: false, requires_justification: true },
    TransitionRule { from: Scheduled, to: Failed, roles: &[Driver, System, Operator, Admin], owner_may: false, requires_justification: true },
    TransitionRule { from: PickedUp, to: Failed, roles: &[Driver, System, Operator, Admin], owner_may: false, requires_justification: true },
    // Recovery rows: operators can walk an in-flight entity back one step.
    TransitionRule { from: Scheduled, to: Matched, roles: &[Operator, Admin], owner_may: false, requires_justification: true },
    TransitionRule { from: PickedUp, to: Scheduled, roles: &[Operator, Admin], owner_may: false, requires_justification: true },
];

fn find_rule(from: EntityStatus, to: EntityStatus) -> Option<&'static TransitionRule> {
    TRANSITION_TABLE.iter().find(|r| r.from == from && r.to == to)
}

fn role_admitted(rule: &TransitionRule, role: Role) -> bool {
    role == Admin || rule.roles.contains(&role) || (rule.owner_may && role.is_ownable())
}

// ── Queries ───────────────────────────────────────────────────────────────────

pub fn is_terminal(status: EntityStatus) -> bool {
    status.is_terminal()
}

/// Whether a transition row exists and admits `role`. Self-transitions are
/// always rejected. Owner rows admit any ownable role here; ownership itself
/// is the command layer's check.
pub fn can_transition(from: EntityStatus, to: EntityStatus, role: Role) -> bool {
    if from == to {
        return false;
    }
    find_rule(from, to).map_or(false, |rule| role_admitted(rule, role))
}

pub fn allowed_transitions(from: EntityStatus, role: Role) -> Vec<EntityStatus> {
    TRANSITION_TABLE
        .iter()
        .filter(|r| r.from == from && role_admitted(r, role))
        .map(|r| r.to)
        .collect()
}

/// UI-facing view of what `role` may do next from `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct NextAction {
    pub to: EntityStatus,
    pub requires_justification: bool,
}

pub fn next_actions(from: EntityStatus, role: Role) -> Vec<NextAction> {
    TRANSITION_TABLE
        .iter()
        .filter(|r| r.from == from && role_admitted(r, role))
        .map(|r| NextAction { to: r.to, requires_justification: r.requires_justification })
        .collect()
}

// ── Validation ────────────────────────────────────────────────────────────────

/// Caller-supplied context for a transition check.
#[derive(Debug, Clone, Default)]
pub struct TransitionCtx {
    pub justification: Option<String>,
    /// Whether the acting user owns the entity being transitioned.
    pub is_owner: bool,
}

/// Pure precondition check — validates the transition without mutating
/// anything. The caller persists the new status on success.
pub fn transition(
    from: EntityStatus,
    to: EntityStatus,
    role: Role,
    ctx: &TransitionCtx,
) -> Result<(), DomainError> {
    if from == to {
        return Err(DomainError::TransitionNotAllowed { from, to, role });
    }
    let rule = find_rule(from, to)
        .ok_or(DomainError::TransitionNotAllowed { from, to, role })?;

    let listed = role == Admin || rule.roles.contains(&role);
    let as_owner = rule.owner_may && role.is_ownable() && ctx.is_owner;
    if !listed && !as_owner {
        return Err(DomainError::TransitionNotAllowed { from, to, role });
    }

    if rule.requires_justification
        && ctx.justification.as_deref().map_or(true, |j| j.trim().is_empty())
    {
        return Err(DomainError::JustificationRequired { from, to });
    }

    Ok(())
}
