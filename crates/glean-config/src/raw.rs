use serde::Deserialize;

use crate::settings::ScoreWeights;

// Raw YAML mirror of `Settings`: every field optional so a config file only
// names what it overrides.

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSettings {
    #[serde(default)]
    pub server: RawServer,
    #[serde(default)]
    pub matching: RawMatching,
    #[serde(default)]
    pub compliance: RawCompliance,
    #[serde(default)]
    pub providers: RawProviders,
    #[serde(default)]
    pub audit: RawAudit,
    #[serde(default)]
    pub ops: RawOps,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawServer {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMatching {
    pub max_radius_miles: Option<f64>,
    pub top_recommendations: Option<usize>,
    pub weights: Option<ScoreWeights>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCompliance {
    pub max_refrigeration_window_hours: Option<i64>,
    pub min_expiration_buffer_hours: Option<i64>,
    pub max_distance_miles: Option<f64>,
    pub blocked_keywords: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawProviders {
    pub geocode_timeout_secs: Option<u64>,
    pub route_timeout_secs: Option<u64>,
    pub enrich_timeout_secs: Option<u64>,
    pub cache_ttl_secs: Option<u64>,
    pub geocode_base_url: Option<String>,
    pub enrich_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawAudit {
    pub retention_days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawOps {
    pub stuck_after_hours: Option<i64>,
}
