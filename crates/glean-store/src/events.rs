use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use glean_domain::{DemandId, EntityStatus, ListingId, MatchId, TaskId, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::repo::clamp_limit;

// ── Domain events ─────────────────────────────────────────────────────────────

/// Typed domain events fanned out to asynchronous consumers. Delivery is
/// at-least-once; consumers must be idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum DomainEvent {
    #[serde(rename = "listing.created")]
    ListingCreated { listing_id: ListingId, supplier_id: UserId },

    #[serde(rename = "listing.updated")]
    ListingUpdated {
        listing_id: ListingId,
        /// Whether a matching-relevant field changed (re-triggers the pipeline).
        material: bool,
    },

    #[serde(rename = "listing.status_changed")]
    ListingStatusChanged { listing_id: ListingId, from: EntityStatus, to: EntityStatus },

    #[serde(rename = "demand.created")]
    DemandCreated { demand_id: DemandId, recipient_id: UserId },

    #[serde(rename = "demand.status_changed")]
    DemandStatusChanged { demand_id: DemandId, from: EntityStatus, to: EntityStatus },

    #[serde(rename = "match.proposed")]
    MatchProposed {
        match_id: MatchId,
        listing_id: ListingId,
        demand_id: DemandId,
        score: f64,
    },

    #[serde(rename = "match.status_changed")]
    MatchStatusChanged { match_id: MatchId, from: EntityStatus, to: EntityStatus },

    #[serde(rename = "compliance.blocked")]
    ComplianceBlocked { match_id: MatchId, blocked_by: Vec<String> },

    #[serde(rename = "compliance.overridden")]
    ComplianceOverridden { match_id: MatchId, approver_id: UserId },

    #[serde(rename = "task.scheduled")]
    TaskScheduled { task_id: TaskId, match_id: MatchId, driver_id: Option<UserId> },

    #[serde(rename = "task.status_changed")]
    TaskStatusChanged { task_id: TaskId, from: EntityStatus, to: EntityStatus },

    #[serde(rename = "task.location_updated")]
    TaskLocationUpdated { task_id: TaskId },
}

/// A published event with its bus-assigned position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedEvent {
    pub seq: u64,
    pub id: Uuid,
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: DomainEvent,
}

// ── Bus ───────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait EventBus: Send + Sync + 'static {
    async fn publish(&self, event: DomainEvent) -> Result<PublishedEvent, StoreError>;

    /// Events strictly after `after_seq`, oldest first.
    async fn since(&self, after_seq: u64, limit: u32) -> Result<Vec<PublishedEvent>, StoreError>;
}

/// In-process event bus: an append-only sequence polled by consumers.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventBus {
    inner: Arc<RwLock<Vec<PublishedEvent>>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: DomainEvent) -> Result<PublishedEvent, StoreError> {
        let mut guard = self.inner.write().await;
        let published = PublishedEvent {
            seq: guard.len() as u64 + 1,
            id: Uuid::new_v4(),
            at: Utc::now(),
            event,
        };
        guard.push(published.clone());
        Ok(published)
    }

    async fn since(&self, after_seq: u64, limit: u32) -> Result<Vec<PublishedEvent>, StoreError> {
        let guard = self.inner.read().await;
        Ok(guard
            .iter()
            .filter(|e| e.seq > after_seq)
            .take(clamp_limit(limit))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_assigns_increasing_seq() {
        let bus = InMemoryEventBus::new();
        let first = bus
            .publish(DomainEvent::ListingCreated {
                listing_id: ListingId::new("l1"),
                supplier_id: UserId::new("s1"),
            })
            .await
            .unwrap();
        let second = bus
            .publish(DomainEvent::ListingUpdated {
                listing_id: ListingId::new("l1"),
                material: true,
            })
            .await
            .unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
    }

    #[tokio::test]
    async fn since_returns_only_later_events() {
        let bus = InMemoryEventBus::new();
        for _ in 0..3 {
            bus.publish(DomainEvent::TaskLocationUpdated { task_id: TaskId::new("t1") })
                .await
                .unwrap();
        }
        let tail = bus.since(1, 10).await.unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].seq, 2);
    }

    #[test]
    fn events_serialize_with_dotted_type_tag() {
        let event = DomainEvent::MatchProposed {
            match_id: MatchId::new("m1"),
            listing_id: ListingId::new("l1"),
            demand_id: DemandId::new("d1"),
            score: 87.5,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "match.proposed");
        assert_eq!(value["score"], 87.5);
    }
}
