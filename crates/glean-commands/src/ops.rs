use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use glean_domain::{ComplianceState, DeliveryTask, EntityStatus, EntityType, ProviderStatus, Role};
use glean_store::{AuditEvent, AuditEventInput, AuditLog, DomainEvent, Repository, MAX_QUERY_LIMIT};
use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::context::Services;
use crate::error::CommandError;

// ── Dashboard ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct OpsDashboard {
    pub listings_by_status: HashMap<String, usize>,
    pub demands_by_status: HashMap<String, usize>,
    pub matches_by_status: HashMap<String, usize>,
    pub tasks_by_status: HashMap<String, usize>,
    pub blocked_matches: usize,
    pub degraded_routes: usize,
    pub unread_notifications: usize,
}

pub async fn dashboard(services: &Services, actor: &Actor) -> Result<OpsDashboard, CommandError> {
    actor.require_any(&[Role::Operator])?;

    let mut listings_by_status: HashMap<String, usize> = HashMap::new();
    for l in services.store.listings.list(MAX_QUERY_LIMIT).await? {
        *listings_by_status.entry(l.status.to_string()).or_default() += 1;
    }
    let mut demands_by_status: HashMap<String, usize> = HashMap::new();
    for d in services.store.demands.list(MAX_QUERY_LIMIT).await? {
        *demands_by_status.entry(d.status.to_string()).or_default() += 1;
    }

    let matches = services.store.matches.list(MAX_QUERY_LIMIT).await?;
    let mut matches_by_status: HashMap<String, usize> = HashMap::new();
    let mut blocked_matches = 0;
    for m in &matches {
        *matches_by_status.entry(m.status.to_string()).or_default() += 1;
        if m.compliance.state == ComplianceState::Blocked && m.compliance.override_record.is_none()
        {
            blocked_matches += 1;
        }
    }

    let mut tasks_by_status: HashMap<String, usize> = HashMap::new();
    for t in services.store.tasks.list(MAX_QUERY_LIMIT).await? {
        *tasks_by_status.entry(t.status.to_string()).or_default() += 1;
    }

    let degraded_routes = services
        .store
        .routes
        .list(MAX_QUERY_LIMIT)
        .await?
        .iter()
        .filter(|r| r.provider_status == ProviderStatus::Degraded)
        .count();

    let unread_notifications = services
        .store
        .notifications
        .list(MAX_QUERY_LIMIT)
        .await?
        .iter()
        .filter(|n| !n.read)
        .count();

    Ok(OpsDashboard {
        listings_by_status,
        demands_by_status,
        matches_by_status,
        tasks_by_status,
        blocked_matches,
        degraded_routes,
        unread_notifications,
    })
}

// ── Stuck entities ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct StuckEntity {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub status: EntityStatus,
    pub updated_at: DateTime<Utc>,
    pub stale_hours: i64,
}

/// Non-terminal matches and tasks untouched past the configured threshold.
pub async fn stuck_entities(
    services: &Services,
    actor: &Actor,
) -> Result<Vec<StuckEntity>, CommandError> {
    actor.require_any(&[Role::Operator])?;
    let cutoff = Utc::now() - Duration::hours(services.settings.ops.stuck_after_hours);

    let mut stuck = Vec::new();
    for m in services.store.matches.list(MAX_QUERY_LIMIT).await? {
        if !m.status.is_terminal() && m.updated_at < cutoff {
            stuck.push(StuckEntity {
                entity_type: EntityType::Match,
                entity_id: m.id.to_string(),
                status: m.status,
                updated_at: m.updated_at,
                stale_hours: (Utc::now() - m.updated_at).num_hours(),
            });
        }
    }
    for t in services.store.tasks.list(MAX_QUERY_LIMIT).await? {
        if !t.status.is_terminal() && t.updated_at < cutoff {
            stuck.push(StuckEntity {
                entity_type: EntityType::Task,
                entity_id: t.id.to_string(),
                status: t.status,
                updated_at: t.updated_at,
                stale_hours: (Utc::now() - t.updated_at).num_hours(),
            });
        }
    }
    stuck.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
    Ok(stuck)
}

// ── Task override ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct TaskOverrideRequest {
    pub status: EntityStatus,
    pub justification: String,
}

/// Operator recovery path: walk a task to any status the recovery rows allow
/// (e.g. picked_up back to scheduled after a mis-scan).
pub async fn override_task(
    services: &Services,
    actor: &Actor,
    id: &str,
    request: TaskOverrideRequest,
    request_id: &str,
) -> Result<DeliveryTask, CommandError> {
    actor.require_any(&[Role::Operator])?;
    if request.justification.trim().is_empty() {
        return Err(CommandError::validation("an override justification is required"));
    }

    let current = services.store.tasks.get_or_fail(id).await?;
    let role = actor.transition_role(
        current.status,
        request.status,
        false,
        Some(&request.justification),
    )?;

    let before = serde_json::to_value(&current).ok();
    let updated = services
        .store
        .tasks
        .update_fields(id, serde_json::json!({ "status": request.status }), current.version)
        .await?;

    services
        .audit(AuditEventInput {
            entity_type: EntityType::Task,
            entity_id: updated.id.to_string(),
            actor_id: actor.user_id.to_string(),
            actor_role: role,
            action: "task.override".to_string(),
            before,
            after: serde_json::to_value(&updated).ok(),
            justification: Some(request.justification.clone()),
            request_id: Some(request_id.to_string()),
        })
        .await;
    services
        .publish(DomainEvent::TaskStatusChanged {
            task_id: updated.id.clone(),
            from: current.status,
            to: request.status,
        })
        .await;

    Ok(updated)
}

// ── Audit export ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditExportQuery {
    pub entity_id: Option<String>,
    pub actor_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

pub async fn export_audit(
    services: &Services,
    actor: &Actor,
    query: AuditExportQuery,
) -> Result<Vec<AuditEvent>, CommandError> {
    actor.require_any(&[Role::Operator, Role::Compliance])?;
    let limit = query.limit.unwrap_or(MAX_QUERY_LIMIT);

    match (&query.entity_id, &query.actor_id) {
        (Some(entity_id), _) => Ok(services
            .store
            .audit
            .entity_history(entity_id, query.from, query.to, limit)
            .await?),
        (None, Some(actor_id)) => Ok(services.store.audit.actor_history(actor_id, limit).await?),
        (None, None) => Err(CommandError::validation(
            "either entity_id or actor_id is required",
        )),
    }
}
