use glean_domain::{DemandId, EnrichmentStatus, ListingId, MatchId};
use serde::{Deserialize, Serialize};

/// The lifecycle signals that start a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    ListingCreated { listing_id: ListingId },
    /// Fired only for material field changes.
    ListingUpdated { listing_id: ListingId },
    DemandCreated { demand_id: DemandId },
}

impl Trigger {
    pub fn is_listing(&self) -> bool {
        matches!(self, Trigger::ListingCreated { .. } | Trigger::ListingUpdated { .. })
    }

    pub fn entity_id(&self) -> &str {
        match self {
            Trigger::ListingCreated { listing_id } | Trigger::ListingUpdated { listing_id } => {
                listing_id.as_str()
            }
            Trigger::DemandCreated { demand_id } => demand_id.as_str(),
        }
    }
}

/// Outcome of one pipeline run. Errors are collected per stage, not fatal:
/// the run reports what it could and leaves entities recoverable for the
/// next trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationReport {
    pub trigger: Trigger,
    pub enrichment: Option<EnrichmentStatus>,
    pub candidates: usize,
    pub scored: usize,
    pub matches_created: Vec<MatchId>,
    pub blocked: Vec<MatchId>,
    /// Pairs skipped because a recommendation already exists — re-runs are
    /// deterministic.
    pub skipped_existing: usize,
    pub errors: Vec<String>,
}

impl OrchestrationReport {
    pub fn new(trigger: Trigger) -> Self {
        Self {
            trigger,
            enrichment: None,
            candidates: 0,
            scored: 0,
            matches_created: Vec::new(),
            blocked: Vec::new(),
            skipped_existing: 0,
            errors: Vec::new(),
        }
    }
}
