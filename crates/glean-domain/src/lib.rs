pub mod entities;
pub mod error;
pub mod ids;
pub mod merge;
pub mod transitions;
pub mod types;

mod tests;

pub use entities::{
    ComplianceOverride, ComplianceRecord, DeliveryTask, DemandPost, EnrichmentRecord,
    MatchRecommendation, Notification, RoutePlan, ScoreBreakdown, SurplusListing, UserProfile,
};
pub use error::DomainError;
pub use ids::{DemandId, EntityType, ListingId, MatchId, RoutePlanId, TaskId, UserId};
pub use merge::merge_update;
pub use transitions::{
    allowed_transitions, can_transition, is_terminal, next_actions, transition, NextAction,
    TransitionCtx, TransitionRule, TRANSITION_TABLE,
};
pub use types::{
    Address, Category, CategoryFamily, CheckSeverity, ComplianceCheck, ComplianceState,
    DeliveryChannel, EnrichmentStatus, EntityStatus, GeoPoint, NotificationType, PriorityLevel,
    ProviderStatus, Quantity, Role, TimeWindow,
};
