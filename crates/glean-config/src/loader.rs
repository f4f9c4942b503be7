use std::path::Path;

use tracing::debug;

use crate::error::ConfigError;
use crate::raw::RawSettings;
use crate::settings::Settings;

/// Load settings from an optional YAML file, apply defaults for everything
/// unset, and validate.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let raw = match path {
        Some(p) => {
            debug!("Loading settings from {}", p.display());
            let content = std::fs::read_to_string(p).map_err(|e| ConfigError::Io {
                path: p.display().to_string(),
                source: e,
            })?;
            serde_yaml::from_str::<RawSettings>(&content).map_err(|e| ConfigError::YamlParse {
                path: p.display().to_string(),
                source: e,
            })?
        }
        None => RawSettings::default(),
    };

    let settings = apply_defaults(raw);
    validate(&settings)?;
    Ok(settings)
}

fn apply_defaults(raw: RawSettings) -> Settings {
    let mut s = Settings::default();

    if let Some(bind) = raw.server.bind {
        s.server.bind = bind;
    }
    if let Some(port) = raw.server.port {
        s.server.port = port;
    }

    if let Some(r) = raw.matching.max_radius_miles {
        s.matching.max_radius_miles = r;
    }
    if let Some(n) = raw.matching.top_recommendations {
        s.matching.top_recommendations = n;
    }
    if let Some(w) = raw.matching.weights {
        s.matching.weights = w;
    }

    if let Some(h) = raw.compliance.max_refrigeration_window_hours {
        s.compliance.max_refrigeration_window_hours = h;
    }
    if let Some(h) = raw.compliance.min_expiration_buffer_hours {
        s.compliance.min_expiration_buffer_hours = h;
    }
    if let Some(d) = raw.compliance.max_distance_miles {
        s.compliance.max_distance_miles = d;
    }
    if let Some(keywords) = raw.compliance.blocked_keywords {
        // Matching is case-insensitive; normalize once here.
        s.compliance.blocked_keywords =
            keywords.into_iter().map(|k| k.to_lowercase()).collect();
    }

    if let Some(t) = raw.providers.geocode_timeout_secs {
        s.providers.geocode_timeout_secs = t;
    }
    if let Some(t) = raw.providers.route_timeout_secs {
        s.providers.route_timeout_secs = t;
    }
    if let Some(t) = raw.providers.enrich_timeout_secs {
        s.providers.enrich_timeout_secs = t;
    }
    if let Some(t) = raw.providers.cache_ttl_secs {
        s.providers.cache_ttl_secs = t;
    }
    s.providers.geocode_base_url = raw.providers.geocode_base_url;
    s.providers.enrich_base_url = raw.providers.enrich_base_url;

    if let Some(d) = raw.audit.retention_days {
        s.audit.retention_days = d;
    }
    if let Some(h) = raw.ops.stuck_after_hours {
        s.ops.stuck_after_hours = h;
    }

    s
}

fn validate(s: &Settings) -> Result<(), ConfigError> {
    let weight_sum = s.matching.weights.sum();
    if (weight_sum - 1.0).abs() > 1e-6 {
        return Err(ConfigError::Invalid {
            name: "matching.weights".to_string(),
            message: format!("must sum to 1.0, got {}", weight_sum),
        });
    }
    if s.matching.max_radius_miles <= 0.0 {
        return Err(ConfigError::Invalid {
            name: "matching.max_radius_miles".to_string(),
            message: "must be positive".to_string(),
        });
    }
    if s.matching.top_recommendations == 0 {
        return Err(ConfigError::Invalid {
            name: "matching.top_recommendations".to_string(),
            message: "must be at least 1".to_string(),
        });
    }
    if s.compliance.max_refrigeration_window_hours <= 0 {
        return Err(ConfigError::Invalid {
            name: "compliance.max_refrigeration_window_hours".to_string(),
            message: "must be positive".to_string(),
        });
    }
    if s.audit.retention_days <= 0 {
        return Err(ConfigError::Invalid {
            name: "audit.retention_days".to_string(),
            message: "must be positive".to_string(),
        });
    }
    Ok(())
}
