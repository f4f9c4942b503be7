use std::time::Duration;

use async_trait::async_trait;
use glean_domain::{Address, GeoPoint};
use glean_geo::haversine_miles;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::error::ProviderError;

// ── Results ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    pub point: GeoPoint,
    pub formatted_address: String,
    /// 0..=1; fallback results carry low confidence.
    pub confidence: f64,
    pub provider: String,
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteResult {
    pub distance_miles: f64,
    pub duration_minutes: f64,
    pub polyline: Option<String>,
    pub provider: String,
    pub degraded: bool,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

/// Geocoding and road routing. Implementations must return a usable result
/// even when the upstream service fails, marking it `degraded` — hard errors
/// are reserved for misconfiguration with no fallback at all.
#[async_trait]
pub trait LocationProvider: Send + Sync + 'static {
    async fn geocode(&self, address: &Address) -> Result<GeocodeResult, ProviderError>;

    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteResult, ProviderError>;
}

// ── Conservative fallbacks ────────────────────────────────────────────────────

/// Region (state) centroids for the degraded geocode path. Unknown regions
/// fall back to the continental-US centroid.
const REGION_CENTROIDS: &[(&str, f64, f64)] = &[
    ("CA", 36.7783, -119.4179),
    ("NY", 42.9538, -75.5268),
    ("TX", 31.4757, -99.3312),
    ("FL", 28.6305, -82.4497),
    ("WA", 47.3826, -120.4472),
    ("IL", 40.0417, -89.1965),
    ("GA", 32.6415, -83.4426),
    ("OR", 43.9336, -120.5583),
];

const US_CENTROID: (f64, f64) = (39.8283, -98.5795);

/// Assumed road speed for duration fallbacks, in mph.
const FALLBACK_SPEED_MPH: f64 = 35.0;

/// Road distance exceeds great-circle distance; 1.25 is a common planning
/// factor for urban networks.
const ROAD_FACTOR: f64 = 1.25;

fn region_centroid(region: &str) -> GeoPoint {
    let region = region.trim().to_uppercase();
    REGION_CENTROIDS
        .iter()
        .find(|(code, _, _)| *code == region)
        .map(|(_, lat, lon)| GeoPoint::new(*lat, *lon))
        .unwrap_or_else(|| GeoPoint::new(US_CENTROID.0, US_CENTROID.1))
}

/// Degraded geocode: the region centroid, flagged for operator awareness.
pub(crate) fn fallback_geocode(address: &Address) -> GeocodeResult {
    GeocodeResult {
        point: region_centroid(&address.region),
        formatted_address: address.formatted(),
        confidence: 0.1,
        provider: "region-centroid".to_string(),
        degraded: true,
    }
}

/// Degraded route: haversine with a road factor and an assumed speed.
pub(crate) fn fallback_route(from: GeoPoint, to: GeoPoint) -> RouteResult {
    let distance_miles = haversine_miles(from, to) * ROAD_FACTOR;
    RouteResult {
        distance_miles,
        duration_minutes: distance_miles / FALLBACK_SPEED_MPH * 60.0,
        polyline: None,
        provider: "haversine".to_string(),
        degraded: true,
    }
}

// ── Local deterministic provider ──────────────────────────────────────────────

/// A stub provider that simulates geocoding locally.
///
/// Addresses hash deterministically to a point near their region centroid, so
/// matching and routing behave consistently in tests and offline serving.
/// Performs no network I/O.
#[derive(Debug, Default, Clone)]
pub struct GridLocationProvider;

impl GridLocationProvider {
    pub fn new() -> Self {
        Self
    }

    fn synthetic_point(address: &Address) -> GeoPoint {
        let centroid = region_centroid(&address.region);
        // FNV-style fold of the formatted address into two stable offsets
        // within roughly ±0.25 degrees of the centroid.
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in address.formatted().bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        let lat_off = ((hash >> 32) % 1000) as f64 / 2000.0 - 0.25;
        let lon_off = (hash % 1000) as f64 / 2000.0 - 0.25;
        GeoPoint::new(centroid.lat + lat_off, centroid.lon + lon_off)
    }
}

#[async_trait]
impl LocationProvider for GridLocationProvider {
    async fn geocode(&self, address: &Address) -> Result<GeocodeResult, ProviderError> {
        debug!(address = %address.formatted(), "GridLocationProvider: geocode");
        Ok(GeocodeResult {
            point: Self::synthetic_point(address),
            formatted_address: address.formatted(),
            confidence: 0.4,
            provider: "local-grid".to_string(),
            degraded: false,
        })
    }

    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteResult, ProviderError> {
        let distance_miles = haversine_miles(from, to) * ROAD_FACTOR;
        Ok(RouteResult {
            distance_miles,
            duration_minutes: distance_miles / FALLBACK_SPEED_MPH * 60.0,
            polyline: None,
            provider: "local-grid".to_string(),
            degraded: false,
        })
    }
}

// ── HTTP provider ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    lat: f64,
    lon: f64,
    display_name: Option<String>,
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    distance_miles: f64,
    duration_minutes: f64,
    polyline: Option<String>,
}

/// Geocoder/router backed by an HTTP service, with per-call timeouts, a TTL
/// geocode memo cache, and the conservative fallbacks on any failure.
pub struct HttpLocationProvider {
    base_url: String,
    client: reqwest::Client,
    geocode_timeout: Duration,
    route_timeout: Duration,
    geocode_cache: TtlCache<String, GeocodeResult>,
}

impl HttpLocationProvider {
    pub fn new(
        base_url: String,
        geocode_timeout_secs: u64,
        route_timeout_secs: u64,
        cache_ttl_secs: u64,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            geocode_timeout: Duration::from_secs(geocode_timeout_secs),
            route_timeout: Duration::from_secs(route_timeout_secs),
            geocode_cache: TtlCache::new(Duration::from_secs(cache_ttl_secs)),
        }
    }

    async fn geocode_upstream(&self, address: &Address) -> Result<GeocodeResult, ProviderError> {
        let response = self
            .client
            .get(format!("{}/geocode", self.base_url))
            .query(&[("q", address.formatted())])
            .timeout(self.geocode_timeout)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let body: GeocodeResponse =
            response.json().await.map_err(|e| ProviderError::Http(e.to_string()))?;

        Ok(GeocodeResult {
            point: GeoPoint::new(body.lat, body.lon),
            formatted_address: body.display_name.unwrap_or_else(|| address.formatted()),
            confidence: body.confidence.unwrap_or(0.8),
            provider: "http".to_string(),
            degraded: false,
        })
    }

    async fn route_upstream(
        &self,
        from: GeoPoint,
        to: GeoPoint,
    ) -> Result<RouteResult, ProviderError> {
        let response = self
            .client
            .get(format!("{}/route", self.base_url))
            .query(&[
                ("from_lat", from.lat.to_string()),
                ("from_lon", from.lon.to_string()),
                ("to_lat", to.lat.to_string()),
                ("to_lon", to.lon.to_string()),
            ])
            .timeout(self.route_timeout)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let body: RouteResponse =
            response.json().await.map_err(|e| ProviderError::Http(e.to_string()))?;

        Ok(RouteResult {
            distance_miles: body.distance_miles,
            duration_minutes: body.duration_minutes,
            polyline: body.polyline,
            provider: "http".to_string(),
            degraded: false,
        })
    }
}

#[async_trait]
impl LocationProvider for HttpLocationProvider {
    async fn geocode(&self, address: &Address) -> Result<GeocodeResult, ProviderError> {
        let key = address.formatted().to_lowercase();
        if let Some(hit) = self.geocode_cache.get(&key).await {
            return Ok(hit);
        }

        let result = match self.geocode_upstream(address).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, address = %address.formatted(), "geocode failed, using centroid fallback");
                fallback_geocode(address)
            }
        };

        // Degraded results are cached too: a flapping upstream should not be
        // re-queried for every write of the same address within the TTL.
        self.geocode_cache.insert(key, result.clone()).await;
        Ok(result)
    }

    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteResult, ProviderError> {
        match self.route_upstream(from, to).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(error = %e, "route failed, using haversine fallback");
                Ok(fallback_route(from, to))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sf_address() -> Address {
        Address {
            line1: "1 Market St".into(),
            city: "San Francisco".into(),
            region: "CA".into(),
            postal_code: "94105".into(),
            country: None,
        }
    }

    #[tokio::test]
    async fn grid_geocode_is_deterministic() {
        let provider = GridLocationProvider::new();
        let a = provider.geocode(&sf_address()).await.unwrap();
        let b = provider.geocode(&sf_address()).await.unwrap();
        assert_eq!(a.point, b.point);
        assert!(!a.degraded);
        // Near the CA centroid, not the national one.
        assert!((a.point.lat - 36.7783).abs() < 1.0);
    }

    #[tokio::test]
    async fn http_geocode_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geocode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "lat": 37.7749,
                "lon": -122.4194,
                "display_name": "Market St, SF",
                "confidence": 0.92,
            })))
            .mount(&server)
            .await;

        let provider = HttpLocationProvider::new(server.uri(), 10, 10, 60);
        let result = provider.geocode(&sf_address()).await.unwrap();
        assert!(!result.degraded);
        assert_eq!(result.point.lat, 37.7749);
        assert_eq!(result.formatted_address, "Market St, SF");
    }

    #[tokio::test]
    async fn http_geocode_falls_back_to_centroid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geocode"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = HttpLocationProvider::new(server.uri(), 10, 10, 60);
        let result = provider.geocode(&sf_address()).await.unwrap();
        assert!(result.degraded);
        assert_eq!(result.provider, "region-centroid");
        // CA centroid, low confidence.
        assert!((result.point.lat - 36.7783).abs() < 1e-6);
        assert!(result.confidence < 0.5);
    }

    #[tokio::test]
    async fn http_geocode_caches_within_ttl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geocode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "lat": 1.0,
                "lon": 2.0,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpLocationProvider::new(server.uri(), 10, 10, 300);
        provider.geocode(&sf_address()).await.unwrap();
        provider.geocode(&sf_address()).await.unwrap();
        // wiremock verifies expect(1) on drop.
    }

    #[tokio::test]
    async fn http_route_falls_back_to_haversine() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/route"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = HttpLocationProvider::new(server.uri(), 10, 10, 60);
        let from = GeoPoint::new(37.7749, -122.4194);
        let to = GeoPoint::new(37.8044, -122.2712);
        let route = provider.route(from, to).await.unwrap();
        assert!(route.degraded);
        assert!(route.distance_miles > 8.0 && route.distance_miles < 13.0);
        assert!(route.duration_minutes > 0.0);
    }
}
