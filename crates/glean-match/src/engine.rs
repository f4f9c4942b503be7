use chrono::{DateTime, Utc};
use glean_config::MatchingSettings;
use glean_domain::{
    DemandId, DemandPost, EntityStatus, ListingId, ScoreBreakdown, SurplusListing, UserId,
    UserProfile,
};
use glean_geo::haversine_miles;
use tracing::debug;

// ── Pair shapes ───────────────────────────────────────────────────────────────

/// A listing/demand pair that survived the filter stage.
#[derive(Debug, Clone)]
pub struct CandidatePair {
    pub listing: SurplusListing,
    pub demand: DemandPost,
    pub distance_miles: f64,
}

/// A fully scored pair, ready to persist as a recommendation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPair {
    pub listing_id: ListingId,
    pub demand_id: DemandId,
    pub supplier_id: UserId,
    pub recipient_id: UserId,
    pub distance_miles: f64,
    pub breakdown: ScoreBreakdown,
    /// 0..=100, two-decimal granularity.
    pub score: f64,
}

fn matchable(status: EntityStatus) -> bool {
    matches!(status, EntityStatus::Posted | EntityStatus::Matched)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// Filter → score → rank over listing/demand pairs.
#[derive(Debug, Clone)]
pub struct MatchingEngine {
    cfg: MatchingSettings,
}

impl MatchingEngine {
    pub fn new(cfg: MatchingSettings) -> Self {
        Self { cfg }
    }

    pub fn max_radius_miles(&self) -> f64 {
        self.cfg.max_radius_miles
    }

    /// Keep pairs where both sides are matchable, both have coordinates, and
    /// the great-circle distance is strictly inside the radius (a pair at
    /// exactly the radius would score zero on distance anyway).
    pub fn filter(&self, listings: &[SurplusListing], demands: &[DemandPost]) -> Vec<CandidatePair> {
        let mut pairs = Vec::new();
        for listing in listings {
            if !matchable(listing.status) {
                continue;
            }
            let Some(from) = listing.pickup_location else { continue };
            for demand in demands {
                if !matchable(demand.status) {
                    continue;
                }
                let Some(to) = demand.delivery_location else { continue };
                let distance_miles = haversine_miles(from, to);
                if distance_miles >= self.cfg.max_radius_miles {
                    continue;
                }
                pairs.push(CandidatePair {
                    listing: listing.clone(),
                    demand: demand.clone(),
                    distance_miles,
                });
            }
        }
        debug!(candidates = pairs.len(), "filter stage complete");
        pairs
    }

    pub fn score(
        &self,
        pair: &CandidatePair,
        supplier: Option<&UserProfile>,
        recipient: Option<&UserProfile>,
        now: DateTime<Utc>,
    ) -> ScoredPair {
        let _ = now; // windows are absolute; `now` fixes the scoring snapshot
        let breakdown = ScoreBreakdown {
            distance: self.distance_score(pair.distance_miles),
            time: time_score(&pair.listing, &pair.demand),
            category: category_score(&pair.listing, &pair.demand),
            capacity: capacity_score(&pair.listing, &pair.demand),
            reliability: reliability_score(supplier, recipient),
        };

        let weights = &self.cfg.weights;
        let weighted = weights.distance * breakdown.distance
            + weights.time * breakdown.time
            + weights.category * breakdown.category
            + weights.capacity * breakdown.capacity
            + weights.reliability * breakdown.reliability;

        ScoredPair {
            listing_id: pair.listing.id.clone(),
            demand_id: pair.demand.id.clone(),
            supplier_id: pair.listing.supplier_id.clone(),
            recipient_id: pair.demand.recipient_id.clone(),
            distance_miles: pair.distance_miles,
            breakdown,
            score: round2(weighted * 100.0).clamp(0.0, 100.0),
        }
    }

    /// Descending score; ties by ascending distance then ascending listing id
    /// so rankings are deterministic. Returns the top-N.
    pub fn rank(&self, mut scored: Vec<ScoredPair>) -> Vec<ScoredPair> {
        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.distance_miles.total_cmp(&b.distance_miles))
                .then_with(|| a.listing_id.cmp(&b.listing_id))
        });
        scored.truncate(self.cfg.top_recommendations);
        scored
    }

    fn distance_score(&self, distance_miles: f64) -> f64 {
        let radius = self.cfg.max_radius_miles;
        1.0 - distance_miles.min(radius) / radius
    }
}

// ── Sub-scores ────────────────────────────────────────────────────────────────

/// Pickup-window coverage: overlap with the acceptance window over the pickup
/// window's own duration, clipped to [0, 1]. Zero when disjoint or when the
/// pickup window is empty.
fn time_score(listing: &SurplusListing, demand: &DemandPost) -> f64 {
    let pickup = listing.pickup_window;
    let pickup_ms = pickup.duration().num_milliseconds();
    if pickup_ms <= 0 {
        return 0.0;
    }
    let overlap_ms = pickup.overlap(&demand.acceptance_window).num_milliseconds();
    (overlap_ms as f64 / pickup_ms as f64).clamp(0.0, 1.0)
}

/// 1.0 on direct category membership, 0.7 for a same-family category,
/// otherwise 0.
fn category_score(listing: &SurplusListing, demand: &DemandPost) -> f64 {
    if demand.categories.contains(&listing.category) {
        return 1.0;
    }
    let family = listing.category.family();
    if demand.categories.iter().any(|c| c.family() == family) {
        return 0.7;
    }
    0.0
}

/// Full credit from 70% utilization upward; linear below; zero when the
/// listing would overflow the recipient's capacity.
fn capacity_score(listing: &SurplusListing, demand: &DemandPost) -> f64 {
    if demand.capacity <= 0.0 {
        return 0.0;
    }
    let quantity = listing.quantity.amount;
    if quantity > demand.capacity {
        return 0.0;
    }
    let utilization = quantity / demand.capacity;
    if utilization >= 0.7 {
        1.0
    } else {
        utilization / 0.7
    }
}

/// Mean of the loaded profiles' reliability (0..=1); a neutral 0.5 when
/// neither profile is available.
fn reliability_score(supplier: Option<&UserProfile>, recipient: Option<&UserProfile>) -> f64 {
    let scores: Vec<f64> = [supplier, recipient]
        .into_iter()
        .flatten()
        .map(|p| (p.reliability_score / 100.0).clamp(0.0, 1.0))
        .collect();
    if scores.is_empty() {
        0.5
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use glean_domain::*;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn listing(id: &str, lat: f64, lon: f64) -> SurplusListing {
        let now = base_time();
        SurplusListing {
            id: ListingId::new(id),
            supplier_id: UserId::new("sup-1"),
            title: "produce".to_string(),
            description: None,
            category: Category::PerishableFood,
            quantity: Quantity::new(100.0, "lbs"),
            pickup_address: Address {
                line1: "1 Market St".into(),
                city: "San Francisco".into(),
                region: "CA".into(),
                postal_code: "94105".into(),
                country: None,
            },
            pickup_location: Some(GeoPoint::new(lat, lon)),
            geohash: Some("9q8yyk".to_string()),
            pickup_window: TimeWindow::new(
                now + Duration::hours(2),
                now + Duration::hours(4),
            ),
            expiration_date: None,
            requires_refrigeration: false,
            handling_requirements: vec![],
            quality_notes: None,
            enrichment: EnrichmentRecord::default(),
            status: EntityStatus::Posted,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn demand(id: &str, lat: f64, lon: f64) -> DemandPost {
        let now = base_time();
        DemandPost {
            id: DemandId::new(id),
            recipient_id: UserId::new("rec-1"),
            categories: vec![Category::PerishableFood],
            quantity_needed: 150.0,
            unit: "lbs".to_string(),
            capacity: 200.0,
            acceptance_window: TimeWindow::new(
                now + Duration::hours(1),
                now + Duration::hours(8),
            ),
            delivery_address: Address {
                line1: "2 Broadway".into(),
                city: "Oakland".into(),
                region: "CA".into(),
                postal_code: "94607".into(),
                country: None,
            },
            delivery_location: Some(GeoPoint::new(lat, lon)),
            geohash: Some("9q9p1x".to_string()),
            priority: PriorityLevel::Normal,
            notes: None,
            status: EntityStatus::Posted,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn engine() -> MatchingEngine {
        MatchingEngine::new(MatchingSettings::default())
    }

    #[test]
    fn filter_keeps_nearby_matchable_pairs() {
        let listings = vec![listing("l1", 37.7749, -122.4194)];
        let demands = vec![demand("d1", 37.8044, -122.2712)];
        let pairs = engine().filter(&listings, &demands);
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].distance_miles < 10.0);
    }

    #[test]
    fn filter_drops_terminal_and_remote() {
        let mut canceled = listing("l1", 37.7749, -122.4194);
        canceled.status = EntityStatus::Canceled;
        // Los Angeles is far outside the 50 mile default radius.
        let listings = vec![canceled, listing("l2", 34.0522, -118.2437)];
        let demands = vec![demand("d1", 37.8044, -122.2712)];
        assert!(engine().filter(&listings, &demands).is_empty());
    }

    #[test]
    fn filter_drops_missing_coordinates() {
        let mut no_coords = listing("l1", 0.0, 0.0);
        no_coords.pickup_location = None;
        let demands = vec![demand("d1", 37.8044, -122.2712)];
        assert!(engine().filter(&[no_coords], &demands).is_empty());
    }

    #[test]
    fn exactly_at_radius_is_excluded() {
        let eng = engine();
        // 50 miles ≈ 0.7246 degrees of latitude.
        let deg = 50.0 / 69.0;
        let listings = vec![listing("l1", 37.0, -122.0)];
        let demands = vec![demand("d1", 37.0 + deg, -122.0)];
        let pairs = eng.filter(&listings, &demands);
        // The pair sits within float error of the boundary; either it was
        // filtered, or its distance score is ~0.
        if let Some(pair) = pairs.first() {
            let scored = eng.score(pair, None, None, base_time());
            assert!(scored.breakdown.distance < 0.01);
        }
    }

    #[test]
    fn scenario_produce_to_foodbank_scores_high() {
        let eng = engine();
        let pairs = eng.filter(
            &[listing("l1", 37.7749, -122.4194)],
            &[demand("d1", 37.8044, -122.2712)],
        );
        let scored = eng.score(&pairs[0], None, None, base_time());

        // Pickup window fully inside the acceptance window.
        assert_eq!(scored.breakdown.time, 1.0);
        assert_eq!(scored.breakdown.category, 1.0);
        // 100 of 200 capacity → 0.5 utilization, linear region.
        assert!((scored.breakdown.capacity - 0.5 / 0.7).abs() < 1e-9);
        // No profiles loaded.
        assert_eq!(scored.breakdown.reliability, 0.5);
        assert!(scored.breakdown.distance > 0.8);

        assert!(scored.score > 70.0 && scored.score <= 100.0, "score {}", scored.score);
        // Two-decimal granularity.
        assert_eq!(scored.score, round2(scored.score));
    }

    #[test]
    fn subscores_stay_in_unit_interval() {
        let eng = engine();
        let mut big = listing("l1", 37.7749, -122.4194);
        big.quantity.amount = 10_000.0;
        let pairs = eng.filter(&[big], &[demand("d1", 37.8044, -122.2712)]);
        let scored = eng.score(&pairs[0], None, None, base_time());
        for value in [
            scored.breakdown.distance,
            scored.breakdown.time,
            scored.breakdown.category,
            scored.breakdown.capacity,
            scored.breakdown.reliability,
        ] {
            assert!((0.0..=1.0).contains(&value));
        }
        // Overflow quantity zeroes capacity.
        assert_eq!(scored.breakdown.capacity, 0.0);
    }

    #[test]
    fn capacity_boundary_at_seventy_percent() {
        let eng = engine();
        let mut exact = listing("l1", 37.7749, -122.4194);
        exact.quantity.amount = 140.0; // 140/200 = 0.7
        let pairs = eng.filter(&[exact], &[demand("d1", 37.8044, -122.2712)]);
        let scored = eng.score(&pairs[0], None, None, base_time());
        assert_eq!(scored.breakdown.capacity, 1.0);

        let mut at_capacity = listing("l2", 37.7749, -122.4194);
        at_capacity.quantity.amount = 200.0; // exactly at capacity → full credit
        let pairs = eng.filter(&[at_capacity], &[demand("d1", 37.8044, -122.2712)]);
        assert_eq!(eng.score(&pairs[0], None, None, base_time()).breakdown.capacity, 1.0);
    }

    #[test]
    fn disjoint_windows_score_zero_time() {
        let eng = engine();
        let mut late = listing("l1", 37.7749, -122.4194);
        let now = base_time();
        late.pickup_window = TimeWindow::new(now + Duration::hours(20), now + Duration::hours(22));
        let pairs = eng.filter(&[late], &[demand("d1", 37.8044, -122.2712)]);
        assert_eq!(eng.score(&pairs[0], None, None, now).breakdown.time, 0.0);
    }

    #[test]
    fn family_match_scores_partial_credit() {
        let eng = engine();
        let mut water_demand = demand("d1", 37.8044, -122.2712);
        water_demand.categories = vec![Category::Water];
        let pairs = eng.filter(&[listing("l1", 37.7749, -122.4194)], &[water_demand]);
        // perishable_food vs water: same food family.
        assert_eq!(eng.score(&pairs[0], None, None, base_time()).breakdown.category, 0.7);

        let mut tent_demand = demand("d2", 37.8044, -122.2712);
        tent_demand.categories = vec![Category::Tents];
        let pairs = eng.filter(&[listing("l1", 37.7749, -122.4194)], &[tent_demand]);
        assert_eq!(eng.score(&pairs[0], None, None, base_time()).breakdown.category, 0.0);
    }

    #[test]
    fn reliability_uses_loaded_profiles() {
        let eng = engine();
        let pairs = eng.filter(
            &[listing("l1", 37.7749, -122.4194)],
            &[demand("d1", 37.8044, -122.2712)],
        );

        let mut supplier = UserProfile::new(UserId::new("sup-1"), "s@x.org", vec![Role::Supplier]);
        supplier.reliability_score = 90.0;
        let mut recipient = UserProfile::new(UserId::new("rec-1"), "r@x.org", vec![Role::Recipient]);
        recipient.reliability_score = 70.0;

        let scored = eng.score(&pairs[0], Some(&supplier), Some(&recipient), base_time());
        assert!((scored.breakdown.reliability - 0.8).abs() < 1e-9);

        let only_supplier = eng.score(&pairs[0], Some(&supplier), None, base_time());
        assert!((only_supplier.breakdown.reliability - 0.9).abs() < 1e-9);
    }

    #[test]
    fn rank_orders_and_breaks_ties_deterministically() {
        let eng = engine();
        let make = |listing_id: &str, score: f64, distance: f64| ScoredPair {
            listing_id: ListingId::new(listing_id),
            demand_id: DemandId::new("d1"),
            supplier_id: UserId::new("s1"),
            recipient_id: UserId::new("r1"),
            distance_miles: distance,
            breakdown: ScoreBreakdown {
                distance: 0.5,
                time: 0.5,
                category: 0.5,
                capacity: 0.5,
                reliability: 0.5,
            },
            score,
        };

        let ranked = eng.rank(vec![
            make("lb", 80.0, 5.0),
            make("la", 80.0, 5.0),
            make("lc", 90.0, 20.0),
            make("ld", 80.0, 2.0),
        ]);

        let ids: Vec<&str> = ranked.iter().map(|p| p.listing_id.as_str()).collect();
        assert_eq!(ids, vec!["lc", "ld", "la", "lb"]);
    }

    #[test]
    fn rank_truncates_to_top_n() {
        let mut cfg = MatchingSettings::default();
        cfg.top_recommendations = 2;
        let eng = MatchingEngine::new(cfg);
        let pairs: Vec<ScoredPair> = (0..5)
            .map(|i| ScoredPair {
                listing_id: ListingId::new(format!("l{}", i)),
                demand_id: DemandId::new("d1"),
                supplier_id: UserId::new("s1"),
                recipient_id: UserId::new("r1"),
                distance_miles: i as f64,
                breakdown: ScoreBreakdown {
                    distance: 0.0,
                    time: 0.0,
                    category: 0.0,
                    capacity: 0.0,
                    reliability: 0.0,
                },
                score: i as f64 * 10.0,
            })
            .collect();
        let ranked = eng.rank(pairs);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].score, 40.0);
    }
}
