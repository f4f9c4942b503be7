use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use glean_domain::EntityStatus;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::audit::{build_event, AuditEvent, AuditEventInput, AuditLog};
use crate::entity::StoredEntity;
use crate::error::StoreError;
use crate::repo::{apply_patch, apply_put, clamp_limit, Repository};

// ── In-memory repository ──────────────────────────────────────────────────────

/// In-memory implementation of [`Repository`].
///
/// All data is lost on process exit. Suitable for tests and ephemeral serving.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository<T> {
    inner: Arc<RwLock<HashMap<String, T>>>,
}

impl<T> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self { inner: Arc::new(RwLock::new(HashMap::new())) }
    }
}

fn newest_first<T: StoredEntity>(mut entities: Vec<T>) -> Vec<T> {
    entities.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    entities
}

#[async_trait]
impl<T: StoredEntity> Repository<T> for InMemoryRepository<T> {
    async fn put(&self, entity: T) -> Result<T, StoreError> {
        let mut guard = self.inner.write().await;
        let id = entity.entity_id().to_string();
        let stored = apply_put(guard.get(&id), entity, Utc::now())?;
        guard.insert(id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard.get(id).cloned())
    }

    async fn update_fields(
        &self,
        id: &str,
        patch: Value,
        expected_version: u64,
    ) -> Result<T, StoreError> {
        // Held across the read-modify-write so the version check is atomic.
        let mut guard = self.inner.write().await;
        let current = guard
            .get(id)
            .ok_or_else(|| StoreError::not_found(T::ENTITY_TYPE, id))?;
        let updated = apply_patch(current, &patch, expected_version)?;
        let stored = apply_put(guard.get(id), updated, Utc::now())?;
        guard.insert(id.to_string(), stored.clone());
        Ok(stored)
    }

    async fn batch_get(&self, ids: &[String]) -> Result<Vec<T>, StoreError> {
        let guard = self.inner.read().await;
        Ok(ids.iter().filter_map(|id| guard.get(id).cloned()).collect())
    }

    async fn list(&self, limit: u32) -> Result<Vec<T>, StoreError> {
        let guard = self.inner.read().await;
        let mut all = newest_first(guard.values().cloned().collect());
        all.truncate(clamp_limit(limit));
        Ok(all)
    }

    async fn query_by_status(
        &self,
        status: EntityStatus,
        limit: u32,
    ) -> Result<Vec<T>, StoreError> {
        let guard = self.inner.read().await;
        let mut hits = newest_first(
            guard
                .values()
                .filter(|e| e.status() == Some(status))
                .cloned()
                .collect(),
        );
        hits.truncate(clamp_limit(limit));
        Ok(hits)
    }

    async fn query_by_owner(&self, owner_id: &str, limit: u32) -> Result<Vec<T>, StoreError> {
        let guard = self.inner.read().await;
        let mut hits = newest_first(
            guard
                .values()
                .filter(|e| e.owner_id() == Some(owner_id))
                .cloned()
                .collect(),
        );
        hits.truncate(clamp_limit(limit));
        Ok(hits)
    }

    async fn query_by_geohash_prefix(
        &self,
        prefix: &str,
        limit: u32,
    ) -> Result<Vec<T>, StoreError> {
        let guard = self.inner.read().await;
        let mut hits = newest_first(
            guard
                .values()
                .filter(|e| e.geohash().map_or(false, |g| g.starts_with(prefix)))
                .cloned()
                .collect(),
        );
        hits.truncate(clamp_limit(limit));
        Ok(hits)
    }
}

// ── In-memory audit log ───────────────────────────────────────────────────────

/// Append-only in-memory audit log.
#[derive(Debug, Clone)]
pub struct InMemoryAuditLog {
    events: Arc<RwLock<Vec<AuditEvent>>>,
    retention: Duration,
}

impl InMemoryAuditLog {
    pub fn new(retention_days: i64) -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            retention: Duration::days(retention_days),
        }
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn write_event(&self, input: AuditEventInput) -> Result<AuditEvent, StoreError> {
        let event = build_event(input, Utc::now(), self.retention);
        let mut guard = self.events.write().await;
        guard.push(event.clone());
        Ok(event)
    }

    async fn entity_history(
        &self,
        entity_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<AuditEvent>, StoreError> {
        let guard = self.events.read().await;
        let mut hits: Vec<AuditEvent> = guard
            .iter()
            .filter(|e| e.entity_id == entity_id)
            .filter(|e| from.map_or(true, |f| e.timestamp >= f))
            .filter(|e| to.map_or(true, |t| e.timestamp <= t))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        hits.truncate(clamp_limit(limit));
        Ok(hits)
    }

    async fn actor_history(&self, actor_id: &str, limit: u32) -> Result<Vec<AuditEvent>, StoreError> {
        let guard = self.events.read().await;
        let mut hits: Vec<AuditEvent> = guard
            .iter()
            .filter(|e| e.actor_id == actor_id)
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        hits.truncate(clamp_limit(limit));
        Ok(hits)
    }
}
