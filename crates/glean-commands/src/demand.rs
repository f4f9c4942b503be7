use chrono::Utc;
use glean_domain::{
    Address, Category, DemandId, DemandPost, EntityStatus, EntityType, PriorityLevel, Role,
    TimeWindow,
};
use glean_orchestrator::Trigger;
use glean_store::{AuditEventInput, DomainEvent, Repository, MAX_QUERY_LIMIT};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::actor::Actor;
use crate::context::Services;
use crate::error::CommandError;

// ── Requests ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateDemandRequest {
    pub categories: Vec<Category>,
    pub quantity_needed: f64,
    pub unit: String,
    pub capacity: f64,
    pub acceptance_window: TimeWindow,
    pub delivery_address: Address,
    #[serde(default)]
    pub priority: PriorityLevel,
    pub notes: Option<String>,
}

impl CreateDemandRequest {
    fn validate(&self) -> Result<(), CommandError> {
        if self.categories.is_empty() {
            return Err(CommandError::validation("at least one category is required"));
        }
        if self.quantity_needed <= 0.0 {
            return Err(CommandError::validation("quantity_needed must be positive"));
        }
        if self.capacity <= 0.0 {
            return Err(CommandError::validation("capacity must be positive"));
        }
        if !self.acceptance_window.is_valid() {
            return Err(CommandError::validation("acceptance window end must be after start"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDemandRequest {
    pub categories: Option<Vec<Category>>,
    pub quantity_needed: Option<f64>,
    pub unit: Option<String>,
    pub capacity: Option<f64>,
    pub acceptance_window: Option<TimeWindow>,
    pub delivery_address: Option<Address>,
    pub priority: Option<PriorityLevel>,
    pub notes: Option<String>,
}

impl UpdateDemandRequest {
    fn validate(&self) -> Result<(), CommandError> {
        if let Some(categories) = &self.categories {
            if categories.is_empty() {
                return Err(CommandError::validation("at least one category is required"));
            }
        }
        if matches!(self.capacity, Some(c) if c <= 0.0) {
            return Err(CommandError::validation("capacity must be positive"));
        }
        if matches!(self.quantity_needed, Some(q) if q <= 0.0) {
            return Err(CommandError::validation("quantity_needed must be positive"));
        }
        if let Some(window) = &self.acceptance_window {
            if !window.is_valid() {
                return Err(CommandError::validation("acceptance window end must be after start"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DemandFilter {
    pub status: Option<EntityStatus>,
    #[serde(alias = "userId")]
    pub user_id: Option<String>,
    pub limit: Option<u32>,
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn create_demand(
    services: &Services,
    actor: &Actor,
    request: CreateDemandRequest,
    request_id: &str,
) -> Result<DemandPost, CommandError> {
    actor.require_any(&[Role::Recipient, Role::Operator])?;
    request.validate()?;

    let (delivery_location, geohash) = services.geocode(&request.delivery_address).await;

    let now = Utc::now();
    let demand = DemandPost {
        id: DemandId::generate(),
        recipient_id: actor.user_id.clone(),
        categories: request.categories,
        quantity_needed: request.quantity_needed,
        unit: request.unit,
        capacity: request.capacity,
        acceptance_window: request.acceptance_window,
        delivery_address: request.delivery_address,
        delivery_location,
        geohash,
        priority: request.priority,
        notes: request.notes,
        status: EntityStatus::Posted,
        version: 0,
        created_at: now,
        updated_at: now,
    };

    let stored = services.store.demands.put(demand).await?;
    info!(demand_id = %stored.id, recipient_id = %actor.user_id, "demand created");

    services
        .audit(AuditEventInput {
            entity_type: EntityType::Demand,
            entity_id: stored.id.to_string(),
            actor_id: actor.user_id.to_string(),
            actor_role: Role::Recipient,
            action: "demand.create".to_string(),
            before: None,
            after: serde_json::to_value(&stored).ok(),
            justification: None,
            request_id: Some(request_id.to_string()),
        })
        .await;
    services
        .publish(DomainEvent::DemandCreated {
            demand_id: stored.id.clone(),
            recipient_id: stored.recipient_id.clone(),
        })
        .await;
    services
        .orchestrator
        .dispatch(Trigger::DemandCreated { demand_id: stored.id.clone() })
        .await;

    Ok(stored)
}

pub async fn get_demand(
    services: &Services,
    _actor: &Actor,
    id: &str,
) -> Result<DemandPost, CommandError> {
    Ok(services.store.demands.get_or_fail(id).await?)
}

pub async fn list_demands(
    services: &Services,
    actor: &Actor,
    filter: DemandFilter,
) -> Result<Vec<DemandPost>, CommandError> {
    let limit = filter.limit.unwrap_or(100).min(MAX_QUERY_LIMIT);

    let demands = match (&filter.user_id, filter.status) {
        (Some(user_id), status) => {
            if user_id.as_str() != actor.user_id.as_str() {
                actor.require_any(&[Role::Operator, Role::Compliance])?;
            }
            let owned = services.store.demands.query_by_owner(user_id, limit).await?;
            match status {
                Some(status) => owned.into_iter().filter(|d| d.status == status).collect(),
                None => owned,
            }
        }
        (None, Some(status)) => services.store.demands.query_by_status(status, limit).await?,
        (None, None) => {
            services
                .store
                .demands
                .query_by_status(EntityStatus::Posted, limit)
                .await?
        }
    };
    Ok(demands)
}

pub async fn update_demand(
    services: &Services,
    actor: &Actor,
    id: &str,
    request: UpdateDemandRequest,
    request_id: &str,
) -> Result<DemandPost, CommandError> {
    let current = services.store.demands.get_or_fail(id).await?;
    actor.require_owner_or(&current.recipient_id, &[Role::Operator])?;
    request.validate()?;

    if current.status.is_terminal() {
        return Err(CommandError::InvalidStateTransition(format!(
            "cannot update a {} demand",
            current.status
        )));
    }

    let mut patch = serde_json::to_value(&request)
        .map_err(|e| CommandError::Internal(e.to_string()))?;
    if let Some(address) = &request.delivery_address {
        let (location, geohash) = services.geocode(address).await;
        if let serde_json::Value::Object(map) = &mut patch {
            map.insert("delivery_location".to_string(), serde_json::json!(location));
            map.insert("geohash".to_string(), serde_json::json!(geohash));
        }
    }

    let before = serde_json::to_value(&current).ok();
    let updated = services.store.demands.update_fields(id, patch, current.version).await?;

    services
        .audit(AuditEventInput {
            entity_type: EntityType::Demand,
            entity_id: updated.id.to_string(),
            actor_id: actor.user_id.to_string(),
            actor_role: if actor.owns(&current.recipient_id) { Role::Recipient } else { Role::Operator },
            action: "demand.update".to_string(),
            before,
            after: serde_json::to_value(&updated).ok(),
            justification: None,
            request_id: Some(request_id.to_string()),
        })
        .await;

    Ok(updated)
}

/// Terminal close by the recipient once the need is met.
pub async fn close_demand(
    services: &Services,
    actor: &Actor,
    id: &str,
    request_id: &str,
) -> Result<DemandPost, CommandError> {
    set_demand_status(services, actor, id, EntityStatus::Closed, None, "demand.close", request_id)
        .await
}

pub async fn cancel_demand(
    services: &Services,
    actor: &Actor,
    id: &str,
    justification: Option<&str>,
    request_id: &str,
) -> Result<DemandPost, CommandError> {
    set_demand_status(
        services,
        actor,
        id,
        EntityStatus::Canceled,
        justification,
        "demand.cancel",
        request_id,
    )
    .await
}

async fn set_demand_status(
    services: &Services,
    actor: &Actor,
    id: &str,
    to: EntityStatus,
    justification: Option<&str>,
    action: &str,
    request_id: &str,
) -> Result<DemandPost, CommandError> {
    let current = services.store.demands.get_or_fail(id).await?;
    let is_owner = actor.require_owner_or(&current.recipient_id, &[Role::Operator])?;
    let role = actor.transition_role(current.status, to, is_owner, justification)?;

    let before = serde_json::to_value(&current).ok();
    let updated = services
        .store
        .demands
        .update_fields(id, serde_json::json!({ "status": to }), current.version)
        .await?;

    services
        .audit(AuditEventInput {
            entity_type: EntityType::Demand,
            entity_id: updated.id.to_string(),
            actor_id: actor.user_id.to_string(),
            actor_role: role,
            action: action.to_string(),
            before,
            after: serde_json::to_value(&updated).ok(),
            justification: justification.map(String::from),
            request_id: Some(request_id.to_string()),
        })
        .await;
    services
        .publish(DomainEvent::DemandStatusChanged {
            demand_id: updated.id.clone(),
            from: current.status,
            to,
        })
        .await;

    Ok(updated)
}
