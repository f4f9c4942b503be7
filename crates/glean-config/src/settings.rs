use serde::{Deserialize, Serialize};

// ── Server ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: "127.0.0.1".to_string(), port: 8080 }
    }
}

// ── Matching ──────────────────────────────────────────────────────────────────

/// Weights for the five match sub-scores. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub distance: f64,
    pub time: f64,
    pub category: f64,
    pub capacity: f64,
    pub reliability: f64,
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.distance + self.time + self.category + self.capacity + self.reliability
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { distance: 0.30, time: 0.25, category: 0.20, capacity: 0.15, reliability: 0.10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingSettings {
    /// Pairs at or beyond this great-circle distance are never matched.
    pub max_radius_miles: f64,
    pub top_recommendations: usize,
    pub weights: ScoreWeights,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self { max_radius_miles: 50.0, top_recommendations: 5, weights: ScoreWeights::default() }
    }
}

// ── Compliance ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSettings {
    pub max_refrigeration_window_hours: i64,
    pub min_expiration_buffer_hours: i64,
    /// Beyond this the distance rule warns; it never blocks.
    pub max_distance_miles: f64,
    /// Matched case-insensitively against listing quality notes.
    pub blocked_keywords: Vec<String>,
}

impl Default for ComplianceSettings {
    fn default() -> Self {
        Self {
            max_refrigeration_window_hours: 2,
            min_expiration_buffer_hours: 24,
            max_distance_miles: 100.0,
            blocked_keywords: ["spoiled", "moldy", "damaged", "rotten", "contaminated"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

// ── Providers ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub geocode_timeout_secs: u64,
    pub route_timeout_secs: u64,
    pub enrich_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    /// When absent the deterministic local geocoder/router is used.
    pub geocode_base_url: Option<String>,
    /// When absent the keyword-heuristic enricher is used.
    pub enrich_base_url: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            geocode_timeout_secs: 10,
            route_timeout_secs: 10,
            enrich_timeout_secs: 30,
            cache_ttl_secs: 900,
            geocode_base_url: None,
            enrich_base_url: None,
        }
    }
}

// ── Audit / ops ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSettings {
    pub retention_days: i64,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self { retention_days: 730 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpsSettings {
    /// A non-terminal task or match untouched for this long shows up on the
    /// stuck-entities report.
    pub stuck_after_hours: i64,
}

impl Default for OpsSettings {
    fn default() -> Self {
        Self { stuck_after_hours: 24 }
    }
}

// ── Root ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    pub server: ServerSettings,
    pub matching: MatchingSettings,
    pub compliance: ComplianceSettings,
    pub providers: ProviderSettings,
    pub audit: AuditSettings,
    pub ops: OpsSettings,
}
