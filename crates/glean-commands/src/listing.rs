use chrono::{DateTime, Utc};
use glean_domain::{
    Address, Category, EntityStatus, EntityType, ListingId, Quantity, Role, SurplusListing,
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
pub struct CreateListingRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub quantity: Quantity,
    pub pickup_address: Address,
    pub pickup_window: TimeWindow,
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub requires_refrigeration: bool,
    #[serde(default)]
    pub handling_requirements: Vec<String>,
    pub quality_notes: Option<String>,
}

impl CreateListingRequest {
    fn validate(&self) -> Result<(), CommandError> {
        if self.title.trim().is_empty() {
            return Err(CommandError::validation("title must not be empty"));
        }
        if self.quantity.amount <= 0.0 {
            return Err(CommandError::validation("quantity must be positive"));
        }
        if self.quantity.unit.trim().is_empty() {
            return Err(CommandError::validation("quantity unit must not be empty"));
        }
        if !self.pickup_window.is_valid() {
            return Err(CommandError::validation("pickup window end must be after start"));
        }
        Ok(())
    }
}

/// Partial update; the field shapes mirror the entity so absent (and null)
/// fields never overwrite present values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateListingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub quantity: Option<Quantity>,
    pub pickup_address: Option<Address>,
    pub pickup_window: Option<TimeWindow>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub requires_refrigeration: Option<bool>,
    pub handling_requirements: Option<Vec<String>>,
    pub quality_notes: Option<String>,
}

impl UpdateListingRequest {
    fn validate(&self) -> Result<(), CommandError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(CommandError::validation("title must not be empty"));
            }
        }
        if let Some(quantity) = &self.quantity {
            if quantity.amount <= 0.0 {
                return Err(CommandError::validation("quantity must be positive"));
            }
        }
        if let Some(window) = &self.pickup_window {
            if !window.is_valid() {
                return Err(CommandError::validation("pickup window end must be after start"));
            }
        }
        Ok(())
    }

    /// Whether any matching-relevant field is being touched.
    fn is_material(&self) -> bool {
        self.category.is_some()
            || self.quantity.is_some()
            || self.pickup_address.is_some()
            || self.pickup_window.is_some()
            || self.expiration_date.is_some()
            || self.requires_refrigeration.is_some()
            || self.handling_requirements.is_some()
            || self.quality_notes.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingFilter {
    pub status: Option<EntityStatus>,
    #[serde(alias = "userId")]
    pub user_id: Option<String>,
    pub limit: Option<u32>,
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn create_listing(
    services: &Services,
    actor: &Actor,
    request: CreateListingRequest,
    request_id: &str,
) -> Result<SurplusListing, CommandError> {
    actor.require_any(&[Role::Supplier, Role::Operator])?;
    request.validate()?;

    let (pickup_location, geohash) = services.geocode(&request.pickup_address).await;

    let now = Utc::now();
    let listing = SurplusListing {
        id: ListingId::generate(),
        supplier_id: actor.user_id.clone(),
        title: request.title,
        description: request.description,
        category: request.category,
        quantity: request.quantity,
        pickup_address: request.pickup_address,
        pickup_location,
        geohash,
        pickup_window: request.pickup_window,
        expiration_date: request.expiration_date,
        requires_refrigeration: request.requires_refrigeration,
        handling_requirements: request.handling_requirements,
        quality_notes: request.quality_notes,
        enrichment: Default::default(),
        status: EntityStatus::Posted,
        version: 0,
        created_at: now,
        updated_at: now,
    };

    let stored = services.store.listings.put(listing).await?;
    info!(listing_id = %stored.id, supplier_id = %actor.user_id, "listing created");

    services
        .audit(AuditEventInput {
            entity_type: EntityType::Listing,
            entity_id: stored.id.to_string(),
            actor_id: actor.user_id.to_string(),
            actor_role: Role::Supplier,
            action: "listing.create".to_string(),
            before: None,
            after: serde_json::to_value(&stored).ok(),
            justification: None,
            request_id: Some(request_id.to_string()),
        })
        .await;
    services
        .publish(DomainEvent::ListingCreated {
            listing_id: stored.id.clone(),
            supplier_id: stored.supplier_id.clone(),
        })
        .await;
    services
        .orchestrator
        .dispatch(Trigger::ListingCreated { listing_id: stored.id.clone() })
        .await;

    Ok(stored)
}

pub async fn get_listing(
    services: &Services,
    _actor: &Actor,
    id: &str,
) -> Result<SurplusListing, CommandError> {
    Ok(services.store.listings.get_or_fail(id).await?)
}

pub async fn list_listings(
    services: &Services,
    actor: &Actor,
    filter: ListingFilter,
) -> Result<Vec<SurplusListing>, CommandError> {
    let limit = filter.limit.unwrap_or(100).min(MAX_QUERY_LIMIT);

    let listings = match (&filter.user_id, filter.status) {
        (Some(user_id), status) => {
            if user_id.as_str() != actor.user_id.as_str() {
                actor.require_any(&[Role::Operator, Role::Compliance])?;
            }
            let owned = services.store.listings.query_by_owner(user_id, limit).await?;
            match status {
                Some(status) => owned.into_iter().filter(|l| l.status == status).collect(),
                None => owned,
            }
        }
        (None, Some(status)) => services.store.listings.query_by_status(status, limit).await?,
        (None, None) => {
            services
                .store
                .listings
                .query_by_status(EntityStatus::Posted, limit)
                .await?
        }
    };
    Ok(listings)
}

pub async fn update_listing(
    services: &Services,
    actor: &Actor,
    id: &str,
    request: UpdateListingRequest,
    request_id: &str,
) -> Result<SurplusListing, CommandError> {
    let current = services.store.listings.get_or_fail(id).await?;
    actor.require_owner_or(&current.supplier_id, &[Role::Operator])?;
    request.validate()?;

    if current.status.is_terminal() {
        return Err(CommandError::InvalidStateTransition(format!(
            "cannot update a {} listing",
            current.status
        )));
    }

    let mut patch = serde_json::to_value(&request)
        .map_err(|e| CommandError::Internal(e.to_string()))?;

    // An address change re-geocodes so the stored geohash is never stale.
    if let Some(address) = &request.pickup_address {
        let (location, geohash) = services.geocode(address).await;
        if let serde_json::Value::Object(map) = &mut patch {
            map.insert("pickup_location".to_string(), serde_json::json!(location));
            map.insert("geohash".to_string(), serde_json::json!(geohash));
        }
    }

    let before = serde_json::to_value(&current).ok();
    let updated = services
        .store
        .listings
        .update_fields(id, patch, current.version)
        .await?;

    services
        .audit(AuditEventInput {
            entity_type: EntityType::Listing,
            entity_id: updated.id.to_string(),
            actor_id: actor.user_id.to_string(),
            actor_role: if actor.owns(&current.supplier_id) { Role::Supplier } else { Role::Operator },
            action: "listing.update".to_string(),
            before,
            after: serde_json::to_value(&updated).ok(),
            justification: None,
            request_id: Some(request_id.to_string()),
        })
        .await;

    let material = request.is_material();
    services
        .publish(DomainEvent::ListingUpdated { listing_id: updated.id.clone(), material })
        .await;
    if material {
        services
            .orchestrator
            .dispatch(Trigger::ListingUpdated { listing_id: updated.id.clone() })
            .await;
    }

    Ok(updated)
}

pub async fn cancel_listing(
    services: &Services,
    actor: &Actor,
    id: &str,
    justification: Option<&str>,
    request_id: &str,
) -> Result<SurplusListing, CommandError> {
    let current = services.store.listings.get_or_fail(id).await?;
    let is_owner = actor.require_owner_or(&current.supplier_id, &[Role::Operator])?;

    let role = actor.transition_role(
        current.status,
        EntityStatus::Canceled,
        is_owner,
        justification,
    )?;

    // A listing with a live task must be resolved through the task first.
    let active_task = services
        .store
        .tasks
        .list(MAX_QUERY_LIMIT)
        .await?
        .into_iter()
        .any(|t| t.listing_id.as_str() == id && !t.status.is_terminal());
    if active_task {
        return Err(CommandError::Conflict(
            "listing has an active delivery task; cancel the task first".to_string(),
        ));
    }

    let before = serde_json::to_value(&current).ok();
    let updated = services
        .store
        .listings
        .update_fields(id, serde_json::json!({ "status": EntityStatus::Canceled }), current.version)
        .await?;

    services
        .audit(AuditEventInput {
            entity_type: EntityType::Listing,
            entity_id: updated.id.to_string(),
            actor_id: actor.user_id.to_string(),
            actor_role: role,
            action: "listing.cancel".to_string(),
            before,
            after: serde_json::to_value(&updated).ok(),
            justification: justification.map(String::from),
            request_id: Some(request_id.to_string()),
        })
        .await;
    services
        .publish(DomainEvent::ListingStatusChanged {
            listing_id: updated.id.clone(),
            from: current.status,
            to: EntityStatus::Canceled,
        })
        .await;

    Ok(updated)
}
