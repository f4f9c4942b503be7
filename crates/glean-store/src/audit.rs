use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use glean_domain::{EntityType, Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;

// ── Event shapes ──────────────────────────────────────────────────────────────

/// One changed field, by top-level key. A deleted key surfaces with
/// `new_value: None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Caller-provided portion of an audit event.
#[derive(Debug, Clone)]
pub struct AuditEventInput {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub actor_id: String,
    pub actor_role: Role,
    pub action: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub justification: Option<String>,
    pub request_id: Option<String>,
}

/// An immutable audit record. Append-only; `expires_at` governs eventual
/// physical deletion only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
    pub actor_role: Role,
    pub action: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub diff: Vec<FieldChange>,
    pub justification: Option<String>,
    pub request_id: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Field-wise symmetric difference of two canonical JSON snapshots.
pub fn compute_diff(before: Option<&Value>, after: Option<&Value>) -> Vec<FieldChange> {
    let empty = serde_json::Map::new();
    let before_map = before.and_then(Value::as_object).unwrap_or(&empty);
    let after_map = after.and_then(Value::as_object).unwrap_or(&empty);

    let mut keys: Vec<&String> = before_map.keys().chain(after_map.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut changes = Vec::new();
    for key in keys {
        let old_value = before_map.get(key);
        let new_value = after_map.get(key);
        if old_value == new_value {
            continue;
        }
        changes.push(FieldChange {
            field: key.clone(),
            old_value: old_value.cloned(),
            new_value: new_value.cloned(),
        });
    }
    changes
}

/// Assemble a complete event from caller input. Shared by all backends.
pub(crate) fn build_event(
    input: AuditEventInput,
    now: DateTime<Utc>,
    retention: Duration,
) -> AuditEvent {
    let diff = compute_diff(input.before.as_ref(), input.after.as_ref());
    AuditEvent {
        id: Uuid::new_v4(),
        entity_type: input.entity_type,
        entity_id: input.entity_id,
        timestamp: now,
        actor_id: input.actor_id,
        actor_role: input.actor_role,
        action: input.action,
        before: input.before,
        after: input.after,
        diff,
        justification: input.justification,
        request_id: input.request_id,
        expires_at: now + retention,
    }
}

// ── Trait ─────────────────────────────────────────────────────────────────────

/// Append-only audit trail. Write failures are the caller's to log — by
/// contract they must never fail the parent operation.
#[async_trait]
pub trait AuditLog: Send + Sync + 'static {
    async fn write_event(&self, input: AuditEventInput) -> Result<AuditEvent, StoreError>;

    /// Events for one entity, newest first, optionally bounded by timestamps.
    async fn entity_history(
        &self,
        entity_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<AuditEvent>, StoreError>;

    /// Events performed by one actor, newest first.
    async fn actor_history(&self, actor_id: &str, limit: u32)
        -> Result<Vec<AuditEvent>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn diff_reports_changed_added_and_deleted() {
        let before = json!({ "status": "posted", "title": "apples", "notes": "x" });
        let after = json!({ "status": "matched", "title": "apples", "extra": 1 });
        let diff = compute_diff(Some(&before), Some(&after));

        assert_eq!(diff.len(), 3);
        let by_field = |f: &str| diff.iter().find(|c| c.field == f).unwrap();

        assert_eq!(by_field("status").old_value, Some(json!("posted")));
        assert_eq!(by_field("status").new_value, Some(json!("matched")));
        // Deleted key: new value absent, not null.
        assert_eq!(by_field("notes").new_value, None);
        assert_eq!(by_field("extra").old_value, None);
    }

    #[test]
    fn diff_of_identical_snapshots_is_empty() {
        let v = json!({ "a": 1, "b": [1, 2] });
        assert!(compute_diff(Some(&v), Some(&v)).is_empty());
    }

    #[test]
    fn diff_with_no_before_reports_all_fields_added() {
        let after = json!({ "a": 1 });
        let diff = compute_diff(None, Some(&after));
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].old_value, None);
    }
}
