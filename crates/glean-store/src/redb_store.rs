use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use glean_domain::EntityStatus;
use redb::{Database, ReadableTable, TableDefinition};
use serde_json::Value;

use crate::audit::{build_event, AuditEvent, AuditEventInput, AuditLog};
use crate::entity::StoredEntity;
use crate::error::StoreError;
use crate::repo::{apply_patch, apply_put, clamp_limit, Repository};

const ENTITIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entities");
const AUDIT: TableDefinition<u64, &[u8]> = TableDefinition::new("audit_events");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// Persistent store backed by a redb database file.
///
/// All entities share one table keyed `<TYPE>#<id>` with JSON values; the
/// exclusive write transaction provides the conditional-write atomicity.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) a redb database at `path`.
    ///
    /// Parent directories are created automatically.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        let db = Database::create(path).map_err(|e| StoreError::Internal(e.to_string()))?;

        // Ensure tables exist
        {
            let wtxn = db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
            wtxn.open_table(ENTITIES).map_err(|e| StoreError::Internal(e.to_string()))?;
            wtxn.open_table(AUDIT).map_err(|e| StoreError::Internal(e.to_string()))?;
            wtxn.open_table(META).map_err(|e| StoreError::Internal(e.to_string()))?;
            wtxn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        }

        Ok(Self { db: Arc::new(db) })
    }

    pub fn repository<T: StoredEntity>(&self) -> RedbRepository<T> {
        RedbRepository { db: self.db.clone(), _marker: PhantomData }
    }

    pub fn audit_log(&self, retention_days: i64) -> RedbAuditLog {
        RedbAuditLog { db: self.db.clone(), retention: Duration::days(retention_days) }
    }
}

// ── Entity repository ─────────────────────────────────────────────────────────

pub struct RedbRepository<T> {
    db: Arc<Database>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for RedbRepository<T> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), _marker: PhantomData }
    }
}

fn storage_key<T: StoredEntity>(id: &str) -> String {
    format!("{}#{}", T::ENTITY_TYPE.storage_prefix(), id)
}

/// End-exclusive range that covers every key of one entity type: `#` sorts
/// directly below `$` in ASCII.
fn type_range<T: StoredEntity>() -> (String, String) {
    let prefix = T::ENTITY_TYPE.storage_prefix();
    (format!("{}#", prefix), format!("{}$", prefix))
}

impl<T: StoredEntity> RedbRepository<T> {
    fn read_all(&self) -> Result<Vec<T>, StoreError> {
        let rtxn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let table = rtxn.open_table(ENTITIES).map_err(|e| StoreError::Internal(e.to_string()))?;
        let (start, end) = type_range::<T>();
        let mut results = Vec::new();
        for entry in table
            .range(start.as_str()..end.as_str())
            .map_err(|e| StoreError::Internal(e.to_string()))?
        {
            let (_k, v) = entry.map_err(|e| StoreError::Internal(e.to_string()))?;
            let entity: T = serde_json::from_slice(v.value())?;
            results.push(entity);
        }
        Ok(results)
    }

    fn read_one(&self, id: &str) -> Result<Option<T>, StoreError> {
        let rtxn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let table = rtxn.open_table(ENTITIES).map_err(|e| StoreError::Internal(e.to_string()))?;
        let key = storage_key::<T>(id);
        match table.get(key.as_str()).map_err(|e| StoreError::Internal(e.to_string()))? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Read-modify-write inside one exclusive write transaction.
    fn write_entity(
        &self,
        id: &str,
        mutate: impl FnOnce(Option<T>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let key = storage_key::<T>(id);
        let wtxn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        let stored = {
            let mut table =
                wtxn.open_table(ENTITIES).map_err(|e| StoreError::Internal(e.to_string()))?;
            let current: Option<T> = match table
                .get(key.as_str())
                .map_err(|e| StoreError::Internal(e.to_string()))?
            {
                Some(guard) => Some(serde_json::from_slice(guard.value())?),
                None => None,
            };
            let stored = mutate(current)?;
            let bytes = serde_json::to_vec(&stored)?;
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(|e| StoreError::Internal(e.to_string()))?;
            stored
        };
        wtxn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(stored)
    }
}

fn newest_first<T: StoredEntity>(mut entities: Vec<T>) -> Vec<T> {
    entities.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    entities
}

#[async_trait]
impl<T: StoredEntity> Repository<T> for RedbRepository<T> {
    async fn put(&self, entity: T) -> Result<T, StoreError> {
        let id = entity.entity_id().to_string();
        self.write_entity(&id, move |current| apply_put(current.as_ref(), entity, Utc::now()))
    }

    async fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        self.read_one(id)
    }

    async fn update_fields(
        &self,
        id: &str,
        patch: Value,
        expected_version: u64,
    ) -> Result<T, StoreError> {
        let id_owned = id.to_string();
        self.write_entity(id, move |current| {
            let current = current
                .ok_or_else(|| StoreError::not_found(T::ENTITY_TYPE, id_owned.clone()))?;
            let updated = apply_patch(&current, &patch, expected_version)?;
            apply_put(Some(&current), updated, Utc::now())
        })
    }

    async fn batch_get(&self, ids: &[String]) -> Result<Vec<T>, StoreError> {
        let mut found = Vec::new();
        for id in ids {
            if let Some(entity) = self.read_one(id)? {
                found.push(entity);
            }
        }
        Ok(found)
    }

    async fn list(&self, limit: u32) -> Result<Vec<T>, StoreError> {
        let mut all = newest_first(self.read_all()?);
        all.truncate(clamp_limit(limit));
        Ok(all)
    }

    async fn query_by_status(
        &self,
        status: EntityStatus,
        limit: u32,
    ) -> Result<Vec<T>, StoreError> {
        let mut hits = newest_first(
            self.read_all()?
                .into_iter()
                .filter(|e| e.status() == Some(status))
                .collect(),
        );
        hits.truncate(clamp_limit(limit));
        Ok(hits)
    }

    async fn query_by_owner(&self, owner_id: &str, limit: u32) -> Result<Vec<T>, StoreError> {
        let mut hits = newest_first(
            self.read_all()?
                .into_iter()
                .filter(|e| e.owner_id() == Some(owner_id))
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
        let mut hits = newest_first(
            self.read_all()?
                .into_iter()
                .filter(|e| e.geohash().map_or(false, |g| g.starts_with(prefix)))
                .collect(),
        );
        hits.truncate(clamp_limit(limit));
        Ok(hits)
    }
}

// ── Audit log ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RedbAuditLog {
    db: Arc<Database>,
    retention: Duration,
}

impl RedbAuditLog {
    fn read_all(&self) -> Result<Vec<AuditEvent>, StoreError> {
        let rtxn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let table = rtxn.open_table(AUDIT).map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut events = Vec::new();
        for entry in table.iter().map_err(|e| StoreError::Internal(e.to_string()))? {
            let (_k, v) = entry.map_err(|e| StoreError::Internal(e.to_string()))?;
            events.push(serde_json::from_slice(v.value())?);
        }
        Ok(events)
    }
}

#[async_trait]
impl AuditLog for RedbAuditLog {
    async fn write_event(&self, input: AuditEventInput) -> Result<AuditEvent, StoreError> {
        let event = build_event(input, Utc::now(), self.retention);
        let bytes = serde_json::to_vec(&event)?;
        let wtxn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        {
            let mut meta = wtxn.open_table(META).map_err(|e| StoreError::Internal(e.to_string()))?;
            let seq = meta
                .get("audit_seq")
                .map_err(|e| StoreError::Internal(e.to_string()))?
                .map(|g| g.value())
                .unwrap_or(0);
            let new_seq = seq + 1;
            meta.insert("audit_seq", new_seq)
                .map_err(|e| StoreError::Internal(e.to_string()))?;

            let mut audit = wtxn.open_table(AUDIT).map_err(|e| StoreError::Internal(e.to_string()))?;
            audit
                .insert(new_seq, bytes.as_slice())
                .map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        wtxn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(event)
    }

    async fn entity_history(
        &self,
        entity_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<AuditEvent>, StoreError> {
        let mut hits: Vec<AuditEvent> = self
            .read_all()?
            .into_iter()
            .filter(|e| e.entity_id == entity_id)
            .filter(|e| from.map_or(true, |f| e.timestamp >= f))
            .filter(|e| to.map_or(true, |t| e.timestamp <= t))
            .collect();
        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        hits.truncate(clamp_limit(limit));
        Ok(hits)
    }

    async fn actor_history(&self, actor_id: &str, limit: u32) -> Result<Vec<AuditEvent>, StoreError> {
        let mut hits: Vec<AuditEvent> = self
            .read_all()?
            .into_iter()
            .filter(|e| e.actor_id == actor_id)
            .collect();
        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        hits.truncate(clamp_limit(limit));
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glean_domain::*;
    use tempfile::TempDir;

    fn dummy_demand(id: &str) -> DemandPost {
        let now = Utc::now();
        DemandPost {
            id: DemandId::new(id),
            recipient_id: UserId::new("rec-1"),
            categories: vec![Category::PerishableFood],
            quantity_needed: 50.0,
            unit: "lbs".to_string(),
            capacity: 200.0,
            acceptance_window: TimeWindow::new(now, now + Duration::hours(8)),
            delivery_address: Address {
                line1: "2 Broadway".into(),
                city: "Oakland".into(),
                region: "CA".into(),
                postal_code: "94607".into(),
                country: None,
            },
            delivery_location: Some(GeoPoint::new(37.8044, -122.2712)),
            geohash: Some("9q9p1x".to_string()),
            priority: PriorityLevel::Normal,
            notes: None,
            status: EntityStatus::Posted,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn open_store(dir: &TempDir) -> RedbStore {
        RedbStore::open(&dir.path().join("state.redb")).unwrap()
    }

    #[tokio::test]
    async fn put_and_get() {
        let dir = TempDir::new().unwrap();
        let repo = open_store(&dir).repository::<DemandPost>();
        let stored = repo.put(dummy_demand("d1")).await.unwrap();
        assert_eq!(stored.version, 1);

        let got = repo.get("d1").await.unwrap().unwrap();
        assert_eq!(got.id.as_str(), "d1");
    }

    #[tokio::test]
    async fn persistence_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.redb");

        // Write
        {
            let store = RedbStore::open(&path).unwrap();
            store.repository::<DemandPost>().put(dummy_demand("persistent")).await.unwrap();
        }

        // Re-open and verify
        {
            let store = RedbStore::open(&path).unwrap();
            let got = store.repository::<DemandPost>().get("persistent").await.unwrap();
            assert!(got.is_some(), "data should survive store reopen");
        }
    }

    #[tokio::test]
    async fn conflicting_write_rejected() {
        let dir = TempDir::new().unwrap();
        let repo = open_store(&dir).repository::<DemandPost>();
        let v1 = repo.put(dummy_demand("d1")).await.unwrap();

        let mut a = v1.clone();
        a.capacity = 300.0;
        repo.put(a).await.unwrap();

        let mut b = v1;
        b.capacity = 400.0;
        assert!(repo.put(b).await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn type_prefixes_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.repository::<DemandPost>().put(dummy_demand("same-id")).await.unwrap();

        // A different entity type under the same raw id lives under its own key.
        let listings = store.repository::<SurplusListing>();
        assert!(listings.get("same-id").await.unwrap().is_none());
        assert_eq!(store.repository::<DemandPost>().list(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn geohash_prefix_query() {
        let dir = TempDir::new().unwrap();
        let repo = open_store(&dir).repository::<DemandPost>();
        repo.put(dummy_demand("near")).await.unwrap();
        let mut far = dummy_demand("far");
        far.geohash = Some("dr5ru7".to_string());
        repo.put(far).await.unwrap();

        let hits = repo.query_by_geohash_prefix("9q9p", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id.as_str(), "near");
    }

    #[tokio::test]
    async fn audit_events_persist_with_expiry() {
        let dir = TempDir::new().unwrap();
        let log = open_store(&dir).audit_log(730);
        let written = log
            .write_event(AuditEventInput {
                entity_type: EntityType::Demand,
                entity_id: "d1".to_string(),
                actor_id: "op-1".to_string(),
                actor_role: Role::Operator,
                action: "demand.create".to_string(),
                before: None,
                after: Some(serde_json::json!({ "status": "posted" })),
                justification: None,
                request_id: Some("req-1".to_string()),
            })
            .await
            .unwrap();
        assert!(written.expires_at > written.timestamp);

        let history = log.entity_history("d1", None, None, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].diff.len(), 1);
    }
}
