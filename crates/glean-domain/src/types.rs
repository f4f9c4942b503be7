use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ── Roles ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Supplier,
    Recipient,
    Driver,
    Compliance,
    Operator,
    Admin,
    /// Internal actor used by the orchestrator and scheduled jobs; never
    /// granted to an authenticated user.
    System,
}

impl Role {
    /// Roles that can own an entity (via its supplier/recipient/driver field).
    pub fn is_ownable(&self) -> bool {
        matches!(self, Role::Supplier | Role::Recipient | Role::Driver)
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Operator | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Supplier => "supplier",
            Role::Recipient => "recipient",
            Role::Driver => "driver",
            Role::Compliance => "compliance",
            Role::Operator => "operator",
            Role::Admin => "admin",
            Role::System => "system",
        };
        write!(f, "{}", s)
    }
}

// ── Lifecycle status ──────────────────────────────────────────────────────────

/// Shared lifecycle status for listings, demands, matches and tasks.
///
/// Valid transitions are given by [`crate::transitions::TRANSITION_TABLE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Posted,
    Matched,
    Scheduled,
    PickedUp,
    Delivered,
    Canceled,
    Failed,
    Expired,
    Closed,
}

impl EntityStatus {
    /// Terminal statuses have no outgoing rows except the admin recovery rows.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EntityStatus::Delivered
                | EntityStatus::Canceled
                | EntityStatus::Failed
                | EntityStatus::Expired
                | EntityStatus::Closed
        )
    }
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityStatus::Posted => "posted",
            EntityStatus::Matched => "matched",
            EntityStatus::Scheduled => "scheduled",
            EntityStatus::PickedUp => "picked_up",
            EntityStatus::Delivered => "delivered",
            EntityStatus::Canceled => "canceled",
            EntityStatus::Failed => "failed",
            EntityStatus::Expired => "expired",
            EntityStatus::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

// ── Categories ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    PerishableFood,
    NonPerishableFood,
    Beverages,
    Water,
    MedicalSupplies,
    HygieneProducts,
    Blankets,
    Tents,
    Clothing,
    BabySupplies,
    PetSupplies,
    CleaningSupplies,
}

/// Category families used for partial-credit matching: a listing in the same
/// family as a demanded category scores 0.7 instead of 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryFamily {
    Food,
    Medical,
    Shelter,
    Supplies,
}

impl Category {
    pub fn family(&self) -> CategoryFamily {
        match self {
            Category::PerishableFood
            | Category::NonPerishableFood
            | Category::Beverages
            | Category::Water => CategoryFamily::Food,
            Category::MedicalSupplies | Category::HygieneProducts => CategoryFamily::Medical,
            Category::Blankets | Category::Tents | Category::Clothing => CategoryFamily::Shelter,
            Category::BabySupplies | Category::PetSupplies | Category::CleaningSupplies => {
                CategoryFamily::Supplies
            }
        }
    }
}

// ── Priority ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLevel {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

// ── Geometry ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    pub city: String,
    /// State or province code, e.g. "CA". Drives the degraded-geocode
    /// centroid fallback.
    pub region: String,
    pub postal_code: String,
    pub country: Option<String>,
}

impl Address {
    /// Single-line form used for geocoder requests and cache keys.
    pub fn formatted(&self) -> String {
        format!("{}, {}, {} {}", self.line1, self.city, self.region, self.postal_code)
    }
}

// ── Time windows ──────────────────────────────────────────────────────────────

/// A half-open UTC interval `[start, end)`. All stored times are UTC; any
/// local-time conversion happens outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.end > self.start
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Overlap duration with `other`; zero when disjoint.
    pub fn overlap(&self, other: &TimeWindow) -> Duration {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if end > start {
            end - start
        } else {
            Duration::zero()
        }
    }
}

// ── Quantities ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub amount: f64,
    pub unit: String,
}

impl Quantity {
    pub fn new(amount: f64, unit: impl Into<String>) -> Self {
        Self { amount, unit: unit.into() }
    }
}

// ── Compliance vocabulary (persisted on matches) ──────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ComplianceState {
    #[default]
    Pending,
    Passed,
    Blocked,
}

impl std::fmt::Display for ComplianceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ComplianceState::Pending => "pending",
            ComplianceState::Passed => "passed",
            ComplianceState::Blocked => "blocked",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckSeverity {
    Info,
    Warning,
    Error,
}

/// Outcome of one compliance rule against one listing/demand pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceCheck {
    pub rule_id: String,
    pub rule_name: String,
    pub passed: bool,
    pub severity: CheckSeverity,
    pub message: String,
}

// ── Provider / enrichment status ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Ok,
    /// Produced by a fallback path; usable but flagged for operator awareness.
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentStatus {
    #[default]
    Pending,
    Completed,
    Degraded,
}

// ── Notifications ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    MatchProposed,
    ComplianceBlocked,
    TaskScheduled,
    TaskStatusChanged,
    ListingExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryChannel {
    InApp,
    Email,
    Sms,
}
