use chrono::{DateTime, Utc};
use glean_domain::{
    DeliveryTask, EntityStatus, EntityType, MatchRecommendation, Role, TaskId, UserId,
};
use glean_orchestrator::{OrchestrationReport, Trigger};
use glean_store::{canonical_fingerprint, AuditEventInput, DomainEvent, Repository, MAX_QUERY_LIMIT};
use serde::Deserialize;
use tracing::info;

use crate::actor::Actor;
use crate::context::Services;
use crate::error::CommandError;
use crate::statusflow::{advance_listing, advance_match};

// ── Requests ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchFilter {
    pub status: Option<EntityStatus>,
    #[serde(alias = "listingId")]
    pub listing_id: Option<String>,
    #[serde(alias = "demandId")]
    pub demand_id: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleMatchRequest {
    pub idempotency_key: String,
    pub driver_id: Option<UserId>,
    pub scheduled_pickup: DateTime<Utc>,
    pub scheduled_delivery: DateTime<Utc>,
}

impl ScheduleMatchRequest {
    fn validate(&self) -> Result<(), CommandError> {
        if self.idempotency_key.trim().is_empty() {
            return Err(CommandError::validation("idempotency_key must not be empty"));
        }
        if self.scheduled_delivery <= self.scheduled_pickup {
            return Err(CommandError::validation(
                "scheduled_delivery must be after scheduled_pickup",
            ));
        }
        Ok(())
    }

    fn fingerprint(&self) -> String {
        canonical_fingerprint(&serde_json::json!({
            "driver_id": self.driver_id,
            "scheduled_pickup": self.scheduled_pickup,
            "scheduled_delivery": self.scheduled_delivery,
        }))
    }
}

// ── Queries ───────────────────────────────────────────────────────────────────

pub async fn get_match(
    services: &Services,
    actor: &Actor,
    id: &str,
) -> Result<MatchRecommendation, CommandError> {
    let m = services.store.matches.get_or_fail(id).await?;
    ensure_party_or_privileged(actor, &m)?;
    Ok(m)
}

pub async fn list_matches(
    services: &Services,
    actor: &Actor,
    filter: MatchFilter,
) -> Result<Vec<MatchRecommendation>, CommandError> {
    let limit = filter.limit.unwrap_or(100).min(MAX_QUERY_LIMIT) as usize;
    let privileged = actor.is_privileged() || actor.has_role(Role::Compliance);

    let mut matches = services.store.matches.list(MAX_QUERY_LIMIT).await?;
    if let Some(status) = filter.status {
        matches.retain(|m| m.status == status);
    }
    if let Some(listing_id) = &filter.listing_id {
        matches.retain(|m| m.listing_id.as_str() == listing_id.as_str());
    }
    if let Some(demand_id) = &filter.demand_id {
        matches.retain(|m| m.demand_id.as_str() == demand_id.as_str());
    }
    if !privileged {
        // Parties only see their own pairings.
        matches.retain(|m| actor.owns(&m.supplier_id) || actor.owns(&m.recipient_id));
    }
    matches.truncate(limit);
    Ok(matches)
}

fn ensure_party_or_privileged(
    actor: &Actor,
    m: &MatchRecommendation,
) -> Result<(), CommandError> {
    if actor.owns(&m.supplier_id) || actor.owns(&m.recipient_id) {
        return Ok(());
    }
    actor.require_any(&[Role::Operator, Role::Compliance])
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Operator-triggered recommendation sweep for one listing; runs the pipeline
/// inline and returns its report.
pub async fn run_recommendations(
    services: &Services,
    actor: &Actor,
    listing_id: &str,
) -> Result<OrchestrationReport, CommandError> {
    actor.require_any(&[Role::Operator])?;
    // Fail fast with 404 before invoking the pipeline.
    let listing = services.store.listings.get_or_fail(listing_id).await?;

    services
        .orchestrator
        .run(Trigger::ListingUpdated { listing_id: listing.id.clone() })
        .await
        .map_err(|e| CommandError::Internal(e.to_string()))
}

pub async fn accept_match(
    services: &Services,
    actor: &Actor,
    id: &str,
    request_id: &str,
) -> Result<MatchRecommendation, CommandError> {
    actor.require_any(&[Role::Operator])?;
    let updated = advance_match(
        services,
        actor,
        id,
        EntityStatus::Matched,
        None,
        "match.accept",
        request_id,
    )
    .await?;

    // The listing follows its accepted match.
    advance_listing(
        services,
        actor,
        updated.listing_id.as_str(),
        EntityStatus::Matched,
        None,
        "listing.matched",
        request_id,
    )
    .await?;

    Ok(updated)
}

pub async fn reject_match(
    services: &Services,
    actor: &Actor,
    id: &str,
    justification: Option<&str>,
    request_id: &str,
) -> Result<MatchRecommendation, CommandError> {
    let current = services.store.matches.get_or_fail(id).await?;
    ensure_party_or_privileged(actor, &current)?;
    advance_match(
        services,
        actor,
        id,
        EntityStatus::Canceled,
        justification,
        "match.reject",
        request_id,
    )
    .await
}

/// Schedule an accepted match: create the delivery task and advance the match
/// and listing. Idempotent per `(match_id, idempotency_key)`.
pub async fn schedule_match(
    services: &Services,
    actor: &Actor,
    id: &str,
    request: ScheduleMatchRequest,
    request_id: &str,
) -> Result<DeliveryTask, CommandError> {
    actor.require_any(&[Role::Operator])?;
    request.validate()?;

    let m = services.store.matches.get_or_fail(id).await?;

    // Idempotent replay: same key and payload returns the existing task
    // unchanged; same key with a different payload is a violation.
    if let Some(existing) = services
        .store
        .task_for_idempotency_key(id, &request.idempotency_key)
        .await?
    {
        if existing.payload_fingerprint == request.fingerprint() {
            info!(task_id = %existing.id, "idempotent schedule replay");
            return Ok(existing);
        }
        return Err(CommandError::IdempotencyViolation(format!(
            "idempotency key '{}' was already used with a different payload",
            request.idempotency_key
        )));
    }

    // A blocked match needs a recorded override before it can be scheduled.
    if !m.compliance.allows_scheduling() {
        return Err(CommandError::ComplianceViolation(format!(
            "match is blocked by compliance rules [{}]; an override is required",
            m.compliance.blocked_by.join(", ")
        )));
    }

    let updated_match = advance_match(
        services,
        actor,
        id,
        EntityStatus::Scheduled,
        None,
        "match.schedule",
        request_id,
    )
    .await?;

    advance_listing(
        services,
        actor,
        updated_match.listing_id.as_str(),
        EntityStatus::Scheduled,
        None,
        "listing.scheduled",
        request_id,
    )
    .await?;

    let now = Utc::now();
    let task = DeliveryTask {
        id: TaskId::generate(),
        match_id: updated_match.id.clone(),
        listing_id: updated_match.listing_id.clone(),
        demand_id: updated_match.demand_id.clone(),
        driver_id: request.driver_id.clone(),
        status: EntityStatus::Scheduled,
        scheduled_pickup: request.scheduled_pickup,
        scheduled_delivery: request.scheduled_delivery,
        actual_pickup: None,
        actual_delivery: None,
        current_location: None,
        idempotency_key: request.idempotency_key.clone(),
        payload_fingerprint: request.fingerprint(),
        version: 0,
        created_at: now,
        updated_at: now,
    };
    let task = services.store.tasks.put(task).await?;
    info!(task_id = %task.id, match_id = %task.match_id, "delivery task scheduled");

    services
        .audit(AuditEventInput {
            entity_type: EntityType::Task,
            entity_id: task.id.to_string(),
            actor_id: actor.user_id.to_string(),
            actor_role: Role::Operator,
            action: "task.create".to_string(),
            before: None,
            after: serde_json::to_value(&task).ok(),
            justification: None,
            request_id: Some(request_id.to_string()),
        })
        .await;
    services
        .publish(DomainEvent::TaskScheduled {
            task_id: task.id.clone(),
            match_id: task.match_id.clone(),
            driver_id: task.driver_id.clone(),
        })
        .await;

    Ok(task)
}
