use async_trait::async_trait;
use glean_domain::EntityStatus;
use serde_json::Value;

use crate::entity::StoredEntity;
use crate::error::StoreError;

/// Hard cap applied to every query `limit`.
pub const MAX_QUERY_LIMIT: u32 = 1000;

/// Clamp a caller-supplied limit to the internal cap.
pub(crate) fn clamp_limit(limit: u32) -> usize {
    limit.min(MAX_QUERY_LIMIT) as usize
}

/// Shared conditional-write logic for all backends: version check, version
/// bump, timestamp stamping. The backend supplies whatever is currently
/// stored and persists the returned entity.
pub(crate) fn apply_put<T: StoredEntity>(
    stored: Option<&T>,
    mut entity: T,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<T, StoreError> {
    match stored {
        None => {
            if entity.version() != 0 {
                return Err(StoreError::Conflict {
                    entity_type: T::ENTITY_TYPE,
                    id: entity.entity_id().to_string(),
                    expected: entity.version(),
                    found: 0,
                });
            }
            entity.set_version(1);
            entity.set_created_at(now);
            entity.set_updated_at(now);
            Ok(entity)
        }
        Some(current) => {
            if entity.version() != current.version() {
                return Err(StoreError::Conflict {
                    entity_type: T::ENTITY_TYPE,
                    id: entity.entity_id().to_string(),
                    expected: entity.version(),
                    found: current.version(),
                });
            }
            entity.set_version(current.version() + 1);
            entity.set_created_at(current.created_at());
            entity.set_updated_at(now);
            Ok(entity)
        }
    }
}

/// Shared field-patch logic: version check against `expected_version`, then
/// an object-key merge that ignores nulls and protected fields.
pub(crate) fn apply_patch<T: StoredEntity>(
    current: &T,
    patch: &Value,
    expected_version: u64,
) -> Result<T, StoreError> {
    if current.version() != expected_version {
        return Err(StoreError::Conflict {
            entity_type: T::ENTITY_TYPE,
            id: current.entity_id().to_string(),
            expected: expected_version,
            found: current.version(),
        });
    }

    let mut patch = patch.clone();
    if let Value::Object(map) = &mut patch {
        // Identity and bookkeeping fields are owned by the store.
        for key in ["id", "version", "created_at", "updated_at"] {
            map.remove(key);
        }
    }

    let mut value = serde_json::to_value(current)?;
    glean_domain::merge_update(&mut value, &patch);
    let mut updated: T = serde_json::from_value(value)?;
    updated.set_version(expected_version);
    Ok(updated)
}

/// Per-entity repository over the key-value store.
///
/// Writes are optimistic: `put` with `version == 0` inserts only when absent;
/// any other version is a conditional update against the stored version. The
/// winning write bumps the stored version by exactly 1; the losing write gets
/// [`StoreError::Conflict`] and may reload and retry.
#[async_trait]
pub trait Repository<T: StoredEntity>: Send + Sync + 'static {
    async fn put(&self, entity: T) -> Result<T, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<T>, StoreError>;

    async fn get_or_fail(&self, id: &str) -> Result<T, StoreError> {
        self.get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(T::ENTITY_TYPE, id))
    }

    /// Object-key merge of `patch` into the stored entity under the same
    /// optimistic contract as `put`. `null` patch values are ignored.
    async fn update_fields(
        &self,
        id: &str,
        patch: Value,
        expected_version: u64,
    ) -> Result<T, StoreError>;

    /// Best-effort multi-get; found entities in unspecified order.
    async fn batch_get(&self, ids: &[String]) -> Result<Vec<T>, StoreError>;

    async fn list(&self, limit: u32) -> Result<Vec<T>, StoreError>;

    async fn query_by_status(
        &self,
        status: EntityStatus,
        limit: u32,
    ) -> Result<Vec<T>, StoreError>;

    /// Entities owned by `owner_id`, newest first.
    async fn query_by_owner(&self, owner_id: &str, limit: u32) -> Result<Vec<T>, StoreError>;

    /// Entities whose geohash starts with `prefix`, newest first.
    async fn query_by_geohash_prefix(
        &self,
        prefix: &str,
        limit: u32,
    ) -> Result<Vec<T>, StoreError>;
}
