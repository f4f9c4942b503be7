use std::path::Path;
use std::sync::Arc;

use glean_domain::{
    DeliveryTask, DemandPost, MatchRecommendation, Notification, RoutePlan, SurplusListing,
    UserProfile,
};

use crate::audit::AuditLog;
use crate::error::StoreError;
use crate::events::{EventBus, InMemoryEventBus};
use crate::memory::{InMemoryAuditLog, InMemoryRepository};
use crate::redb_store::RedbStore;
use crate::repo::{Repository, MAX_QUERY_LIMIT};

/// The full persistence surface, one repository per entity plus the audit log
/// and event bus. Everything is trait-object backed so tests, ephemeral
/// serving and redb persistence compose freely.
#[derive(Clone)]
pub struct Datastore {
    pub profiles: Arc<dyn Repository<UserProfile>>,
    pub listings: Arc<dyn Repository<SurplusListing>>,
    pub demands: Arc<dyn Repository<DemandPost>>,
    pub matches: Arc<dyn Repository<MatchRecommendation>>,
    pub tasks: Arc<dyn Repository<DeliveryTask>>,
    pub routes: Arc<dyn Repository<RoutePlan>>,
    pub notifications: Arc<dyn Repository<Notification>>,
    pub audit: Arc<dyn AuditLog>,
    pub events: Arc<dyn EventBus>,
}

impl Datastore {
    /// Everything in memory. State dies with the process.
    pub fn in_memory(retention_days: i64) -> Self {
        Self {
            profiles: Arc::new(InMemoryRepository::<UserProfile>::new()),
            listings: Arc::new(InMemoryRepository::<SurplusListing>::new()),
            demands: Arc::new(InMemoryRepository::<DemandPost>::new()),
            matches: Arc::new(InMemoryRepository::<MatchRecommendation>::new()),
            tasks: Arc::new(InMemoryRepository::<DeliveryTask>::new()),
            routes: Arc::new(InMemoryRepository::<RoutePlan>::new()),
            notifications: Arc::new(InMemoryRepository::<Notification>::new()),
            audit: Arc::new(InMemoryAuditLog::new(retention_days)),
            events: Arc::new(InMemoryEventBus::new()),
        }
    }

    /// Entities and audit trail in redb; the event bus stays in-process
    /// (it is a write-only fan-out sink, not a system of record).
    pub fn open_redb(path: &Path, retention_days: i64) -> Result<Self, StoreError> {
        let store = RedbStore::open(path)?;
        Ok(Self {
            profiles: Arc::new(store.repository::<UserProfile>()),
            listings: Arc::new(store.repository::<SurplusListing>()),
            demands: Arc::new(store.repository::<DemandPost>()),
            matches: Arc::new(store.repository::<MatchRecommendation>()),
            tasks: Arc::new(store.repository::<DeliveryTask>()),
            routes: Arc::new(store.repository::<RoutePlan>()),
            notifications: Arc::new(store.repository::<Notification>()),
            audit: Arc::new(store.audit_log(retention_days)),
            events: Arc::new(InMemoryEventBus::new()),
        })
    }

    // ── Link lookups ──────────────────────────────────────────────────────────
    // Matches and tasks are queried by their cross-entity links; these scans
    // stand in for the link index.

    pub async fn matches_for_listing(
        &self,
        listing_id: &str,
    ) -> Result<Vec<MatchRecommendation>, StoreError> {
        Ok(self
            .matches
            .list(MAX_QUERY_LIMIT)
            .await?
            .into_iter()
            .filter(|m| m.listing_id.as_str() == listing_id)
            .collect())
    }

    pub async fn matches_for_demand(
        &self,
        demand_id: &str,
    ) -> Result<Vec<MatchRecommendation>, StoreError> {
        Ok(self
            .matches
            .list(MAX_QUERY_LIMIT)
            .await?
            .into_iter()
            .filter(|m| m.demand_id.as_str() == demand_id)
            .collect())
    }

    /// The task previously created for `(match_id, idempotency_key)`, if any.
    pub async fn task_for_idempotency_key(
        &self,
        match_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<DeliveryTask>, StoreError> {
        Ok(self
            .tasks
            .list(MAX_QUERY_LIMIT)
            .await?
            .into_iter()
            .find(|t| t.match_id.as_str() == match_id && t.idempotency_key == idempotency_key))
    }

    pub async fn task_for_match(&self, match_id: &str) -> Result<Option<DeliveryTask>, StoreError> {
        Ok(self
            .tasks
            .list(MAX_QUERY_LIMIT)
            .await?
            .into_iter()
            .find(|t| t.match_id.as_str() == match_id))
    }
}
