use glean_domain::{EntityStatus, EntityType, MatchRecommendation, SurplusListing};
use glean_store::{AuditEventInput, DomainEvent, Repository};

use crate::actor::Actor;
use crate::context::Services;
use crate::error::CommandError;

// Shared status-advancement plumbing: one transition check, one optimistic
// write, one audit event, one domain event. A no-op when the entity already
// sits at the target status (multi-entity flows converge instead of failing
// on self-transitions).

pub(crate) async fn advance_listing(
    services: &Services,
    actor: &Actor,
    listing_id: &str,
    to: EntityStatus,
    justification: Option<&str>,
    action: &str,
    request_id: &str,
) -> Result<SurplusListing, CommandError> {
    let current = services.store.listings.get_or_fail(listing_id).await?;
    if current.status == to {
        return Ok(current);
    }

    let is_owner = actor.owns(&current.supplier_id);
    let role = actor.transition_role(current.status, to, is_owner, justification)?;

    let before = serde_json::to_value(&current).ok();
    let updated = services
        .store
        .listings
        .update_fields(listing_id, serde_json::json!({ "status": to }), current.version)
        .await?;

    services
        .audit(AuditEventInput {
            entity_type: EntityType::Listing,
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
        .publish(DomainEvent::ListingStatusChanged {
            listing_id: updated.id.clone(),
            from: current.status,
            to,
        })
        .await;

    Ok(updated)
}

pub(crate) async fn advance_match(
    services: &Services,
    actor: &Actor,
    match_id: &str,
    to: EntityStatus,
    justification: Option<&str>,
    action: &str,
    request_id: &str,
) -> Result<MatchRecommendation, CommandError> {
    let current = services.store.matches.get_or_fail(match_id).await?;
    if current.status == to {
        return Ok(current);
    }

    let is_owner = actor.owns(&current.supplier_id) || actor.owns(&current.recipient_id);
    let role = actor.transition_role(current.status, to, is_owner, justification)?;

    let before = serde_json::to_value(&current).ok();
    let updated = services
        .store
        .matches
        .update_fields(match_id, serde_json::json!({ "status": to }), current.version)
        .await?;

    services
        .audit(AuditEventInput {
            entity_type: EntityType::Match,
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
        .publish(DomainEvent::MatchStatusChanged {
            match_id: updated.id.clone(),
            from: current.status,
            to,
        })
        .await;

    Ok(updated)
}
