use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                $name(s.into())
            }

            /// Mint a fresh random id.
            pub fn generate() -> Self {
                $name(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Identity-provider subject; never minted locally.
    UserId
);
string_id!(ListingId);
string_id!(DemandId);
string_id!(MatchId);
string_id!(TaskId);
string_id!(RoutePlanId);

// ── Entity type ───────────────────────────────────────────────────────────────

/// The persisted entity kinds. `storage_prefix` is the partition-key prefix
/// in the key-value store (`<PREFIX>#<id>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Profile,
    Listing,
    Demand,
    Match,
    Task,
    RoutePlan,
    Notification,
}

impl EntityType {
    pub fn storage_prefix(&self) -> &'static str {
        match self {
            EntityType::Profile => "USER",
            EntityType::Listing => "LISTING",
            EntityType::Demand => "DEMAND",
            EntityType::Match => "MATCH",
            EntityType::Task => "TASK",
            EntityType::RoutePlan => "ROUTE",
            EntityType::Notification => "NOTIFICATION",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityType::Profile => "profile",
            EntityType::Listing => "listing",
            EntityType::Demand => "demand",
            EntityType::Match => "match",
            EntityType::Task => "task",
            EntityType::RoutePlan => "route_plan",
            EntityType::Notification => "notification",
        };
        write!(f, "{}", s)
    }
}
