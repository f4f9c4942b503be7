use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{DemandId, EntityType, ListingId, MatchId, RoutePlanId, TaskId, UserId};
use crate::types::{
    Address, Category, ComplianceCheck, ComplianceState, DeliveryChannel, EnrichmentStatus,
    EntityStatus, GeoPoint, NotificationType, PriorityLevel, ProviderStatus, Quantity, Role,
    TimeWindow,
};

// ── UserProfile ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<Role>,
    pub address: Option<Address>,
    pub location: Option<GeoPoint>,
    /// Present exactly when `location` is present.
    pub geohash: Option<String>,
    /// Per-type channel preferences. Types without an entry default to in-app.
    #[serde(default)]
    pub preferences: HashMap<NotificationType, Vec<DeliveryChannel>>,
    /// 0..=100; nudged by delivery outcomes.
    pub reliability_score: f64,
    pub deliveries_completed: u64,
    pub deliveries_failed: u64,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(id: UserId, email: impl Into<String>, roles: Vec<Role>) -> Self {
        let now = Utc::now();
        Self {
            id,
            email: email.into(),
            display_name: String::new(),
            roles,
            address: None,
            location: None,
            geohash: None,
            preferences: HashMap::new(),
            reliability_score: 80.0,
            deliveries_completed: 0,
            deliveries_failed: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Channels for a notification type; in-app when no preference is stored.
    pub fn channels_for(&self, kind: NotificationType) -> Vec<DeliveryChannel> {
        self.preferences
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| vec![DeliveryChannel::InApp])
    }
}

// ── Enrichment record ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EnrichmentRecord {
    pub status: EnrichmentStatus,
    pub ai_risk_score: Option<f64>,
    #[serde(default)]
    pub ai_flags: Vec<String>,
}

// ── SurplusListing ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurplusListing {
    pub id: ListingId,
    pub supplier_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub quantity: Quantity,
    pub pickup_address: Address,
    pub pickup_location: Option<GeoPoint>,
    /// Present exactly when `pickup_location` is present.
    pub geohash: Option<String>,
    pub pickup_window: TimeWindow,
    pub expiration_date: Option<DateTime<Utc>>,
    pub requires_refrigeration: bool,
    #[serde(default)]
    pub handling_requirements: Vec<String>,
    pub quality_notes: Option<String>,
    #[serde(default)]
    pub enrichment: EnrichmentRecord,
    pub status: EntityStatus,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── DemandPost ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandPost {
    pub id: DemandId,
    pub recipient_id: UserId,
    pub categories: Vec<Category>,
    pub quantity_needed: f64,
    pub unit: String,
    /// Upper bound on what this recipient can receive.
    pub capacity: f64,
    pub acceptance_window: TimeWindow,
    pub delivery_address: Address,
    pub delivery_location: Option<GeoPoint>,
    /// Present exactly when `delivery_location` is present.
    pub geohash: Option<String>,
    pub priority: PriorityLevel,
    pub notes: Option<String>,
    pub status: EntityStatus,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── MatchRecommendation ───────────────────────────────────────────────────────

/// Per-criterion sub-scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub distance: f64,
    pub time: f64,
    pub category: f64,
    pub capacity: f64,
    pub reliability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceOverride {
    pub approver_id: UserId,
    pub justification: String,
    pub approved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ComplianceRecord {
    pub state: ComplianceState,
    #[serde(default)]
    pub checks: Vec<ComplianceCheck>,
    #[serde(default)]
    pub blocked_by: Vec<String>,
    #[serde(default)]
    pub ruleset_version: String,
    #[serde(rename = "override")]
    pub override_record: Option<ComplianceOverride>,
}

impl ComplianceRecord {
    /// A blocked match may only proceed to scheduling with an override.
    pub fn allows_scheduling(&self) -> bool {
        match self.state {
            ComplianceState::Passed => true,
            ComplianceState::Blocked | ComplianceState::Pending => {
                self.override_record.is_some()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecommendation {
    pub id: MatchId,
    pub listing_id: ListingId,
    pub demand_id: DemandId,
    pub supplier_id: UserId,
    pub recipient_id: UserId,
    /// 0..=100, two-decimal granularity.
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub distance_miles: f64,
    pub status: EntityStatus,
    pub compliance: ComplianceRecord,
    pub route_plan_id: Option<RoutePlanId>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── DeliveryTask ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryTask {
    pub id: TaskId,
    pub match_id: MatchId,
    pub listing_id: ListingId,
    pub demand_id: DemandId,
    pub driver_id: Option<UserId>,
    pub status: EntityStatus,
    pub scheduled_pickup: DateTime<Utc>,
    pub scheduled_delivery: DateTime<Utc>,
    pub actual_pickup: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
    /// Last reported driver position while in transit.
    pub current_location: Option<GeoPoint>,
    /// Client-supplied scheduling idempotency key, unique per match.
    pub idempotency_key: String,
    /// SHA-256 of the canonical scheduling payload; a replayed key with a
    /// different fingerprint is an idempotency violation.
    pub payload_fingerprint: String,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── RoutePlan ─────────────────────────────────────────────────────────────────

/// Immutable record of one route computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    pub id: RoutePlanId,
    pub from: GeoPoint,
    pub to: GeoPoint,
    pub distance_miles: f64,
    pub duration_minutes: f64,
    pub polyline: Option<String>,
    pub provider: String,
    pub provider_status: ProviderStatus,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── Notification ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: UserId,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub channels: Vec<DeliveryChannel>,
    pub read: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
