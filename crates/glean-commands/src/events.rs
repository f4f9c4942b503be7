use glean_store::{EventBus, PublishedEvent};
use serde::Deserialize;

use crate::actor::Actor;
use crate::context::Services;
use crate::error::CommandError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsQuery {
    /// Last sequence number the consumer has seen.
    pub since: Option<u64>,
    pub limit: Option<u32>,
}

/// Poll the event bus. Delivery is at-least-once; consumers track their own
/// cursor and must be idempotent.
pub async fn poll_events(
    services: &Services,
    _actor: &Actor,
    query: EventsQuery,
) -> Result<Vec<PublishedEvent>, CommandError> {
    Ok(services
        .store
        .events
        .since(query.since.unwrap_or(0), query.limit.unwrap_or(100))
        .await?)
}
