use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use glean_domain::{
    DeliveryChannel, EntityType, Notification, NotificationType, UserId, UserProfile,
};
use glean_store::Repository;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ProviderError;

/// Per-user notification delivery.
///
/// A persistent [`Notification`] entity is recorded regardless of delivery
/// outcome; external channels (email, sms) are handed to their transports
/// outside the core.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(
        &self,
        user_id: &UserId,
        kind: NotificationType,
        title: &str,
        message: &str,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Notification, ProviderError>;
}

/// Notifier that resolves channel preferences from the stored profile and
/// persists the notification entity.
pub struct StoreNotifier {
    profiles: Arc<dyn Repository<UserProfile>>,
    notifications: Arc<dyn Repository<Notification>>,
}

impl StoreNotifier {
    pub fn new(
        profiles: Arc<dyn Repository<UserProfile>>,
        notifications: Arc<dyn Repository<Notification>>,
    ) -> Self {
        Self { profiles, notifications }
    }
}

#[async_trait]
impl Notifier for StoreNotifier {
    async fn send(
        &self,
        user_id: &UserId,
        kind: NotificationType,
        title: &str,
        message: &str,
        entity_type: EntityType,
        entity_id: &str,
    ) -> Result<Notification, ProviderError> {
        // Unknown users still get the in-app record; preferences need a profile.
        let channels = match self.profiles.get(user_id.as_str()).await {
            Ok(Some(profile)) => profile.channels_for(kind),
            Ok(None) => vec![DeliveryChannel::InApp],
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "preference lookup failed, defaulting to in-app");
                vec![DeliveryChannel::InApp]
            }
        };

        for channel in &channels {
            match channel {
                DeliveryChannel::InApp => {}
                // External transports live outside the core; the recorded
                // channels tell them what to deliver.
                DeliveryChannel::Email | DeliveryChannel::Sms => {
                    debug!(user_id = %user_id, ?channel, ?kind, "queuing external delivery");
                }
            }
        }

        let now = Utc::now();
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.clone(),
            notification_type: kind,
            title: title.to_string(),
            message: message.to_string(),
            entity_type,
            entity_id: entity_id.to_string(),
            channels,
            read: false,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        self.notifications
            .put(notification)
            .await
            .map_err(|e| ProviderError::Internal(e.to_string()))
    }
}
