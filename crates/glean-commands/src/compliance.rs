use chrono::Utc;
use glean_compliance::{ComplianceEngine, ComplianceEvaluation};
use glean_domain::{
    CheckSeverity, ComplianceCheck, ComplianceState, EntityType, MatchRecommendation, Role,
};
use glean_store::{AuditEventInput, DomainEvent, Repository, MAX_QUERY_LIMIT};
use tracing::info;

use crate::actor::Actor;
use crate::context::Services;
use crate::error::CommandError;

const REVIEW_ROLES: &[Role] = &[Role::Compliance, Role::Operator];

/// Matches waiting on a human: blocked (or never evaluated) and not yet in a
/// terminal state.
pub async fn compliance_queue(
    services: &Services,
    actor: &Actor,
) -> Result<Vec<MatchRecommendation>, CommandError> {
    actor.require_any(REVIEW_ROLES)?;
    Ok(services
        .store
        .matches
        .list(MAX_QUERY_LIMIT)
        .await?
        .into_iter()
        .filter(|m| !m.status.is_terminal())
        .filter(|m| {
            matches!(m.compliance.state, ComplianceState::Blocked | ComplianceState::Pending)
                && m.compliance.override_record.is_none()
        })
        .collect())
}

/// Record a human override: the match becomes schedulable, every failing
/// check is annotated, and the override lands in the audit trail.
pub async fn approve_match(
    services: &Services,
    actor: &Actor,
    id: &str,
    justification: &str,
    request_id: &str,
) -> Result<MatchRecommendation, CommandError> {
    actor.require_any(REVIEW_ROLES)?;
    if justification.trim().is_empty() {
        return Err(CommandError::validation("an override justification is required"));
    }

    let m = services.store.matches.get_or_fail(id).await?;
    if m.compliance.state == ComplianceState::Passed {
        return Err(CommandError::validation("match already passed compliance"));
    }

    // Rebuild the evaluation the stored record came from, then apply the
    // override to it.
    let evaluation = ComplianceEvaluation {
        passed: false,
        checks: m.compliance.checks.clone(),
        blocked_by: m.compliance.blocked_by.clone(),
        ruleset_version: m.compliance.ruleset_version.clone(),
        evaluated_at: m.updated_at,
    };
    let (approved, override_record) =
        ComplianceEngine::approve_override(&evaluation, &actor.user_id, justification, Utc::now());

    let mut record = approved.to_record();
    record.override_record = Some(override_record);

    let before = serde_json::to_value(&m.compliance).ok();
    let updated = services
        .store
        .matches
        .update_fields(id, serde_json::json!({ "compliance": record }), m.version)
        .await?;
    info!(match_id = %updated.id, approver = %actor.user_id, "compliance override recorded");

    services
        .audit(AuditEventInput {
            entity_type: EntityType::Match,
            entity_id: updated.id.to_string(),
            actor_id: actor.user_id.to_string(),
            actor_role: Role::Compliance,
            action: "compliance.override".to_string(),
            before,
            after: serde_json::to_value(&updated.compliance).ok(),
            justification: Some(justification.to_string()),
            request_id: Some(request_id.to_string()),
        })
        .await;
    services
        .publish(DomainEvent::ComplianceOverridden {
            match_id: updated.id.clone(),
            approver_id: actor.user_id.clone(),
        })
        .await;

    Ok(updated)
}

/// Manual block: a reviewer can stop a match the automated rules let through.
pub async fn block_match(
    services: &Services,
    actor: &Actor,
    id: &str,
    justification: &str,
    request_id: &str,
) -> Result<MatchRecommendation, CommandError> {
    actor.require_any(REVIEW_ROLES)?;
    if justification.trim().is_empty() {
        return Err(CommandError::validation("a block justification is required"));
    }

    let m = services.store.matches.get_or_fail(id).await?;
    if m.status.is_terminal() {
        return Err(CommandError::InvalidStateTransition(format!(
            "cannot block a {} match",
            m.status
        )));
    }

    let mut record = m.compliance.clone();
    record.state = ComplianceState::Blocked;
    record.override_record = None;
    if !record.blocked_by.iter().any(|r| r == "MANUAL-001") {
        record.blocked_by.push("MANUAL-001".to_string());
    }
    record.checks.push(ComplianceCheck {
        rule_id: "MANUAL-001".to_string(),
        rule_name: "Manual compliance block".to_string(),
        passed: false,
        severity: CheckSeverity::Error,
        message: justification.to_string(),
    });

    let before = serde_json::to_value(&m.compliance).ok();
    let updated = services
        .store
        .matches
        .update_fields(id, serde_json::json!({ "compliance": record }), m.version)
        .await?;

    services
        .audit(AuditEventInput {
            entity_type: EntityType::Match,
            entity_id: updated.id.to_string(),
            actor_id: actor.user_id.to_string(),
            actor_role: Role::Compliance,
            action: "compliance.block".to_string(),
            before,
            after: serde_json::to_value(&updated.compliance).ok(),
            justification: Some(justification.to_string()),
            request_id: Some(request_id.to_string()),
        })
        .await;
    services
        .publish(DomainEvent::ComplianceBlocked {
            match_id: updated.id.clone(),
            blocked_by: updated.compliance.blocked_by.clone(),
        })
        .await;

    Ok(updated)
}
