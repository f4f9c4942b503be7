use std::collections::HashMap;

use glean_domain::{
    Address, DeliveryChannel, EntityType, NotificationType, Role, UserProfile,
};
use glean_store::{AuditEventInput, Repository};
use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::context::Services;
use crate::error::CommandError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub address: Option<Address>,
    pub preferences: Option<HashMap<NotificationType, Vec<DeliveryChannel>>>,
    /// Role changes are admin-only; others must omit this field.
    pub roles: Option<Vec<Role>>,
}

pub async fn get_profile(
    services: &Services,
    actor: &Actor,
    user_id: Option<&str>,
) -> Result<UserProfile, CommandError> {
    let target = user_id.unwrap_or(actor.user_id.as_str());
    if target != actor.user_id.as_str() {
        actor.require_any(&[Role::Operator, Role::Compliance])?;
    }
    Ok(services.store.profiles.get_or_fail(target).await?)
}

/// Create-or-merge the caller's profile. Present stored values are never
/// overwritten by absent request fields; an address change re-geocodes.
pub async fn upsert_profile(
    services: &Services,
    actor: &Actor,
    request: UpdateProfileRequest,
    request_id: &str,
) -> Result<UserProfile, CommandError> {
    if request.roles.is_some() && !actor.is_admin() {
        return Err(CommandError::forbidden("only admins may change roles"));
    }

    let existing = services.store.profiles.get(actor.user_id.as_str()).await?;

    let mut patch = serde_json::to_value(&request)
        .map_err(|e| CommandError::Internal(e.to_string()))?;
    if let Some(address) = &request.address {
        let (location, geohash) = services.geocode(address).await;
        if let serde_json::Value::Object(map) = &mut patch {
            map.insert("location".to_string(), serde_json::json!(location));
            map.insert("geohash".to_string(), serde_json::json!(geohash));
        }
    }

    let (before, updated) = match existing {
        Some(current) => {
            let before = serde_json::to_value(&current).ok();
            let updated = services
                .store
                .profiles
                .update_fields(actor.user_id.as_str(), patch, current.version)
                .await?;
            (before, updated)
        }
        None => {
            // First touch: seed from the identity assertion, then fold the
            // request in before the insert.
            let profile =
                UserProfile::new(actor.user_id.clone(), actor.email.clone(), actor.roles.clone());
            let mut value = serde_json::to_value(&profile)
                .map_err(|e| CommandError::Internal(e.to_string()))?;
            glean_domain::merge_update(&mut value, &patch);
            let seeded: UserProfile = serde_json::from_value(value)
                .map_err(|e| CommandError::Internal(e.to_string()))?;
            (None, services.store.profiles.put(seeded).await?)
        }
    };

    services
        .audit(AuditEventInput {
            entity_type: EntityType::Profile,
            entity_id: updated.id.to_string(),
            actor_id: actor.user_id.to_string(),
            actor_role: actor.roles.first().copied().unwrap_or(Role::Supplier),
            action: "profile.upsert".to_string(),
            before,
            after: serde_json::to_value(&updated).ok(),
            justification: None,
            request_id: Some(request_id.to_string()),
        })
        .await;

    Ok(updated)
}

/// The caller's notification inbox, newest first.
pub async fn list_notifications(
    services: &Services,
    actor: &Actor,
    limit: u32,
) -> Result<Vec<glean_domain::Notification>, CommandError> {
    Ok(services
        .store
        .notifications
        .query_by_owner(actor.user_id.as_str(), limit)
        .await?)
}

pub async fn mark_notification_read(
    services: &Services,
    actor: &Actor,
    id: &str,
) -> Result<glean_domain::Notification, CommandError> {
    let notification = services.store.notifications.get_or_fail(id).await?;
    if !actor.owns(&notification.user_id) {
        return Err(CommandError::forbidden("not your notification"));
    }
    Ok(services
        .store
        .notifications
        .update_fields(id, serde_json::json!({ "read": true }), notification.version)
        .await?)
}
