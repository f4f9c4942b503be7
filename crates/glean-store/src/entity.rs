use chrono::{DateTime, Utc};
use glean_domain::{
    DeliveryTask, DemandPost, EntityStatus, EntityType, MatchRecommendation, Notification,
    RoutePlan, SurplusListing, UserProfile,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A persistable entity: identity, optimistic version, timestamps, and the
/// optional attributes the logical secondary indexes key on.
pub trait StoredEntity:
    Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const ENTITY_TYPE: EntityType;

    fn entity_id(&self) -> &str;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
    fn created_at(&self) -> DateTime<Utc>;
    fn set_created_at(&mut self, at: DateTime<Utc>);
    fn set_updated_at(&mut self, at: DateTime<Utc>);
    fn updated_at(&self) -> DateTime<Utc>;

    /// Lifecycle status, for entities that have one.
    fn status(&self) -> Option<EntityStatus> {
        None
    }

    /// Logical owner (supplier/recipient/driver/user id).
    fn owner_id(&self) -> Option<&str> {
        None
    }

    /// Geohash of the entity's primary coordinates.
    fn geohash(&self) -> Option<&str> {
        None
    }

    /// Storage key, `<PREFIX>#<id>`.
    fn storage_key(&self) -> String {
        format!("{}#{}", Self::ENTITY_TYPE.storage_prefix(), self.entity_id())
    }
}

macro_rules! timestamps {
    () => {
        fn version(&self) -> u64 {
            self.version
        }
        fn set_version(&mut self, version: u64) {
            self.version = version;
        }
        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }
        fn set_created_at(&mut self, at: DateTime<Utc>) {
            self.created_at = at;
        }
        fn updated_at(&self) -> DateTime<Utc> {
            self.updated_at
        }
        fn set_updated_at(&mut self, at: DateTime<Utc>) {
            self.updated_at = at;
        }
    };
}

impl StoredEntity for UserProfile {
    const ENTITY_TYPE: EntityType = EntityType::Profile;

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }
    fn owner_id(&self) -> Option<&str> {
        Some(self.id.as_str())
    }
    fn geohash(&self) -> Option<&str> {
        self.geohash.as_deref()
    }
    timestamps!();
}

impl StoredEntity for SurplusListing {
    const ENTITY_TYPE: EntityType = EntityType::Listing;

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }
    fn status(&self) -> Option<EntityStatus> {
        Some(self.status)
    }
    fn owner_id(&self) -> Option<&str> {
        Some(self.supplier_id.as_str())
    }
    fn geohash(&self) -> Option<&str> {
        self.geohash.as_deref()
    }
    timestamps!();
}

impl StoredEntity for DemandPost {
    const ENTITY_TYPE: EntityType = EntityType::Demand;

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }
    fn status(&self) -> Option<EntityStatus> {
        Some(self.status)
    }
    fn owner_id(&self) -> Option<&str> {
        Some(self.recipient_id.as_str())
    }
    fn geohash(&self) -> Option<&str> {
        self.geohash.as_deref()
    }
    timestamps!();
}

impl StoredEntity for MatchRecommendation {
    const ENTITY_TYPE: EntityType = EntityType::Match;

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }
    fn status(&self) -> Option<EntityStatus> {
        Some(self.status)
    }
    fn owner_id(&self) -> Option<&str> {
        Some(self.recipient_id.as_str())
    }
    timestamps!();
}

impl StoredEntity for DeliveryTask {
    const ENTITY_TYPE: EntityType = EntityType::Task;

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }
    fn status(&self) -> Option<EntityStatus> {
        Some(self.status)
    }
    fn owner_id(&self) -> Option<&str> {
        self.driver_id.as_ref().map(|d| d.as_str())
    }
    timestamps!();
}

impl StoredEntity for RoutePlan {
    const ENTITY_TYPE: EntityType = EntityType::RoutePlan;

    fn entity_id(&self) -> &str {
        self.id.as_str()
    }
    timestamps!();
}

impl StoredEntity for Notification {
    const ENTITY_TYPE: EntityType = EntityType::Notification;

    fn entity_id(&self) -> &str {
        &self.id
    }
    fn owner_id(&self) -> Option<&str> {
        Some(self.user_id.as_str())
    }
    timestamps!();
}
