use chrono::Utc;
use glean_domain::{
    DeliveryTask, EntityStatus, EntityType, GeoPoint, Role, UserId, UserProfile,
};
use glean_store::{AuditEventInput, DomainEvent, Repository, MAX_QUERY_LIMIT};
use serde::Deserialize;
use tracing::{info, warn};

use crate::actor::Actor;
use crate::context::Services;
use crate::error::CommandError;
use crate::statusflow::{advance_listing, advance_match};

// ── Requests ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatusRequest {
    pub status: EntityStatus,
    pub justification: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TaskLocationRequest {
    pub lat: f64,
    pub lon: f64,
}

// ── Queries ───────────────────────────────────────────────────────────────────

/// A driver's own open workload; operators see everything.
pub async fn list_driver_tasks(
    services: &Services,
    actor: &Actor,
) -> Result<Vec<DeliveryTask>, CommandError> {
    if actor.is_privileged() {
        return Ok(services.store.tasks.list(MAX_QUERY_LIMIT).await?);
    }
    actor.require_any(&[Role::Driver])?;
    Ok(services
        .store
        .tasks
        .query_by_owner(actor.user_id.as_str(), MAX_QUERY_LIMIT)
        .await?)
}

pub async fn get_task(
    services: &Services,
    actor: &Actor,
    id: &str,
) -> Result<DeliveryTask, CommandError> {
    let task = services.store.tasks.get_or_fail(id).await?;
    ensure_assigned_or_privileged(actor, &task)?;
    Ok(task)
}

fn ensure_assigned_or_privileged(actor: &Actor, task: &DeliveryTask) -> Result<(), CommandError> {
    let assigned = task
        .driver_id
        .as_ref()
        .map_or(false, |driver| actor.owns(driver));
    if assigned {
        return Ok(());
    }
    actor
        .require_any(&[Role::Operator])
        .map_err(|_| CommandError::forbidden("task is assigned to a different driver"))
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Driver progress updates: picked_up, delivered, failed. Listing and match
/// follow the task. Delivery outcomes feed the parties' reliability counters.
pub async fn update_task_status(
    services: &Services,
    actor: &Actor,
    id: &str,
    request: TaskStatusRequest,
    request_id: &str,
) -> Result<DeliveryTask, CommandError> {
    let current = services.store.tasks.get_or_fail(id).await?;
    ensure_assigned_or_privileged(actor, &current)?;

    let justification = request.justification.as_deref();
    let is_owner = current
        .driver_id
        .as_ref()
        .map_or(false, |driver| actor.owns(driver));
    let role = actor.transition_role(current.status, request.status, is_owner, justification)?;

    let now = Utc::now();
    let mut patch = serde_json::json!({ "status": request.status });
    match request.status {
        EntityStatus::PickedUp => {
            patch["actual_pickup"] = serde_json::json!(now);
        }
        EntityStatus::Delivered => {
            patch["actual_delivery"] = serde_json::json!(now);
        }
        _ => {}
    }

    let before = serde_json::to_value(&current).ok();
    let updated = services.store.tasks.update_fields(id, patch, current.version).await?;

    services
        .audit(AuditEventInput {
            entity_type: EntityType::Task,
            entity_id: updated.id.to_string(),
            actor_id: actor.user_id.to_string(),
            actor_role: role,
            action: "task.status".to_string(),
            before,
            after: serde_json::to_value(&updated).ok(),
            justification: justification.map(String::from),
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

    // Listing and match mirror the task through the same transition table.
    advance_listing(
        services,
        actor,
        updated.listing_id.as_str(),
        request.status,
        justification,
        "listing.progress",
        request_id,
    )
    .await?;
    advance_match(
        services,
        actor,
        updated.match_id.as_str(),
        request.status,
        justification,
        "match.progress",
        request_id,
    )
    .await?;

    match request.status {
        EntityStatus::Delivered => {
            info!(task_id = %updated.id, "task delivered");
            record_delivery_outcome(services, &updated, true).await;
        }
        EntityStatus::Failed => {
            record_delivery_outcome(services, &updated, false).await;
        }
        _ => {}
    }

    Ok(updated)
}

/// In-transit position report.
pub async fn update_task_location(
    services: &Services,
    actor: &Actor,
    id: &str,
    request: TaskLocationRequest,
    request_id: &str,
) -> Result<DeliveryTask, CommandError> {
    let current = services.store.tasks.get_or_fail(id).await?;
    ensure_assigned_or_privileged(actor, &current)?;

    if !matches!(current.status, EntityStatus::Scheduled | EntityStatus::PickedUp) {
        return Err(CommandError::InvalidStateTransition(format!(
            "cannot report location for a {} task",
            current.status
        )));
    }
    if !(-90.0..=90.0).contains(&request.lat) || !(-180.0..=180.0).contains(&request.lon) {
        return Err(CommandError::validation("coordinates out of range"));
    }

    let point = GeoPoint::new(request.lat, request.lon);
    let updated = services
        .store
        .tasks
        .update_fields(
            id,
            serde_json::json!({ "current_location": point }),
            current.version,
        )
        .await?;

    services
        .audit(AuditEventInput {
            entity_type: EntityType::Task,
            entity_id: updated.id.to_string(),
            actor_id: actor.user_id.to_string(),
            actor_role: Role::Driver,
            action: "task.location".to_string(),
            before: None,
            after: serde_json::to_value(&point).ok(),
            justification: None,
            request_id: Some(request_id.to_string()),
        })
        .await;
    services
        .publish(DomainEvent::TaskLocationUpdated { task_id: updated.id.clone() })
        .await;

    Ok(updated)
}

/// Best-effort reliability bookkeeping for everyone on the task. A conflict
/// here is dropped: counters are advisory, not transactional.
async fn record_delivery_outcome(services: &Services, task: &DeliveryTask, delivered: bool) {
    let m = match services.store.matches.get(task.match_id.as_str()).await {
        Ok(Some(m)) => m,
        _ => return,
    };

    let mut parties: Vec<UserId> = vec![m.supplier_id.clone(), m.recipient_id.clone()];
    if let Some(driver) = &task.driver_id {
        parties.push(driver.clone());
    }

    for user_id in parties {
        let profile = match services.store.profiles.get(user_id.as_str()).await {
            Ok(Some(profile)) => profile,
            _ => continue,
        };
        let patch = outcome_patch(&profile, delivered);
        if let Err(e) = services
            .store
            .profiles
            .update_fields(user_id.as_str(), patch, profile.version)
            .await
        {
            warn!(user_id = %user_id, error = %e, "reliability update skipped");
        }
    }
}

fn outcome_patch(profile: &UserProfile, delivered: bool) -> serde_json::Value {
    if delivered {
        serde_json::json!({
            "deliveries_completed": profile.deliveries_completed + 1,
            "reliability_score": (profile.reliability_score + 1.0).min(100.0),
        })
    } else {
        serde_json::json!({
            "deliveries_failed": profile.deliveries_failed + 1,
            "reliability_score": (profile.reliability_score - 2.0).max(0.0),
        })
    }
}
