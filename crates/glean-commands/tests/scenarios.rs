//! End-to-end command flows against in-memory services with an inline
//! pipeline and a fixture geocoder.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use glean_commands::{compliance, demand, listing, matches, ops, profile, tasks};
use glean_commands::{Actor, Services};
use glean_config::Settings;
use glean_domain::{
    Address, Category, ComplianceState, EntityStatus, GeoPoint, Quantity, Role, TimeWindow, UserId,
};
use glean_geo::haversine_miles;
use glean_orchestrator::Orchestrator;
use glean_providers::{
    GeocodeResult, KeywordEnrichment, LocationProvider, ProviderError, Providers, RouteResult,
    StoreNotifier,
};
use glean_store::{AuditLog as _, Datastore, Repository as _};

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// City-keyed geocoder so scenario coordinates are exact. Unknown cities
/// degrade to a national centroid, like a real provider's fallback path.
struct FixtureLocation;

#[async_trait]
impl LocationProvider for FixtureLocation {
    async fn geocode(&self, address: &Address) -> Result<GeocodeResult, ProviderError> {
        let (point, degraded) = match address.city.as_str() {
            "San Francisco" => (GeoPoint::new(37.7749, -122.4194), false),
            "Oakland" => (GeoPoint::new(37.8044, -122.2712), false),
            "Sacramento" => (GeoPoint::new(38.5816, -121.4944), false),
            _ => (GeoPoint::new(39.8283, -98.5795), true),
        };
        Ok(GeocodeResult {
            point,
            formatted_address: address.formatted(),
            confidence: if degraded { 0.1 } else { 0.9 },
            provider: if degraded { "region-centroid" } else { "fixture" }.to_string(),
            degraded,
        })
    }

    async fn route(&self, from: GeoPoint, to: GeoPoint) -> Result<RouteResult, ProviderError> {
        let distance_miles = haversine_miles(from, to) * 1.25;
        Ok(RouteResult {
            distance_miles,
            duration_minutes: distance_miles / 35.0 * 60.0,
            polyline: None,
            provider: "fixture".to_string(),
            degraded: false,
        })
    }
}

fn services() -> Services {
    let settings = Settings::default();
    let store = Datastore::in_memory(settings.audit.retention_days);
    let providers = Providers {
        location: Arc::new(FixtureLocation),
        enrichment: Arc::new(KeywordEnrichment::new()),
        notifier: Arc::new(StoreNotifier::new(
            store.profiles.clone(),
            store.notifications.clone(),
        )),
    };
    let orchestrator = Arc::new(
        Orchestrator::new(store.clone(), providers.clone(), &settings).with_inline_dispatch(),
    );
    Services { store, providers, orchestrator, settings: Arc::new(settings) }
}

fn supplier() -> Actor {
    Actor::new("sup-1", "supplier@example.org", vec![Role::Supplier])
}
fn recipient() -> Actor {
    Actor::new("rec-1", "recipient@example.org", vec![Role::Recipient])
}
fn operator() -> Actor {
    Actor::new("op-1", "ops@example.org", vec![Role::Operator])
}
fn driver() -> Actor {
    Actor::new("drv-1", "driver@example.org", vec![Role::Driver])
}
fn compliance_officer() -> Actor {
    Actor::new("comp-1", "compliance@example.org", vec![Role::Compliance])
}

fn address(city: &str) -> Address {
    Address {
        line1: "1 Main St".into(),
        city: city.into(),
        region: "CA".into(),
        postal_code: "94000".into(),
        country: None,
    }
}

fn listing_request(quality_notes: Option<&str>) -> listing::CreateListingRequest {
    let now = Utc::now();
    listing::CreateListingRequest {
        title: "surplus produce".into(),
        description: Some("mixed vegetables".into()),
        category: Category::PerishableFood,
        quantity: Quantity::new(100.0, "lbs"),
        pickup_address: address("San Francisco"),
        pickup_window: TimeWindow::new(now + Duration::hours(2), now + Duration::hours(4)),
        expiration_date: None,
        requires_refrigeration: false,
        handling_requirements: vec![],
        quality_notes: quality_notes.map(String::from),
    }
}

fn demand_request() -> demand::CreateDemandRequest {
    let now = Utc::now();
    demand::CreateDemandRequest {
        categories: vec![Category::PerishableFood],
        quantity_needed: 150.0,
        unit: "lbs".into(),
        capacity: 200.0,
        acceptance_window: TimeWindow::new(now + Duration::hours(1), now + Duration::hours(8)),
        delivery_address: address("Oakland"),
        priority: Default::default(),
        notes: None,
    }
}

fn schedule_request(key: &str) -> matches::ScheduleMatchRequest {
    let now = Utc::now();
    matches::ScheduleMatchRequest {
        idempotency_key: key.into(),
        driver_id: Some(UserId::new("drv-1")),
        scheduled_pickup: now + Duration::hours(2),
        scheduled_delivery: now + Duration::hours(5),
    }
}

// ── Scenario 1: match → accept → schedule → deliver ───────────────────────────

#[tokio::test]
async fn match_accept_schedule_deliver() {
    let services = services();

    let l = listing::create_listing(&services, &supplier(), listing_request(None), "req-1")
        .await
        .unwrap();
    let d = demand::create_demand(&services, &recipient(), demand_request(), "req-2")
        .await
        .unwrap();

    // The demand trigger swept the geo index and proposed exactly one match.
    let found = services.store.matches_for_demand(d.id.as_str()).await.unwrap();
    assert_eq!(found.len(), 1);
    let m = &found[0];
    assert_eq!(m.listing_id, l.id);
    assert!(m.score > 70.0, "score {}", m.score);
    assert_eq!(m.compliance.state, ComplianceState::Passed);
    assert!(m.route_plan_id.is_some());

    // Operator accepts, listing follows.
    let accepted = matches::accept_match(&services, &operator(), m.id.as_str(), "req-3")
        .await
        .unwrap();
    assert_eq!(accepted.status, EntityStatus::Matched);
    assert_eq!(
        services.store.listings.get_or_fail(l.id.as_str()).await.unwrap().status,
        EntityStatus::Matched
    );

    // Schedule with idempotency key k1.
    let task =
        matches::schedule_match(&services, &operator(), m.id.as_str(), schedule_request("k1"), "req-4")
            .await
            .unwrap();
    assert_eq!(task.status, EntityStatus::Scheduled);

    // Replaying the same key returns the same task unchanged.
    let replay =
        matches::schedule_match(&services, &operator(), m.id.as_str(), schedule_request("k1"), "req-5")
            .await
            .unwrap();
    assert_eq!(replay.id, task.id);
    assert_eq!(replay.version, task.version);

    // The same key with a different payload is an idempotency violation.
    let mut tampered = schedule_request("k1");
    tampered.scheduled_delivery = tampered.scheduled_delivery + Duration::hours(1);
    let err = matches::schedule_match(&services, &operator(), m.id.as_str(), tampered, "req-6")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "IDEMPOTENCY_VIOLATION");

    // Driver picks up, then delivers.
    let picked = tasks::update_task_status(
        &services,
        &driver(),
        task.id.as_str(),
        tasks::TaskStatusRequest { status: EntityStatus::PickedUp, justification: None },
        "req-7",
    )
    .await
    .unwrap();
    assert!(picked.actual_pickup.is_some());

    let delivered = tasks::update_task_status(
        &services,
        &driver(),
        task.id.as_str(),
        tasks::TaskStatusRequest { status: EntityStatus::Delivered, justification: None },
        "req-8",
    )
    .await
    .unwrap();
    assert_eq!(delivered.status, EntityStatus::Delivered);
    assert!(delivered.actual_delivery.is_some());

    // The listing and match reached delivered too.
    assert_eq!(
        services.store.listings.get_or_fail(l.id.as_str()).await.unwrap().status,
        EntityStatus::Delivered
    );
    assert_eq!(
        services.store.matches.get_or_fail(m.id.as_str()).await.unwrap().status,
        EntityStatus::Delivered
    );

    // The audit trail recorded the full journey for the listing.
    let history = services
        .store
        .audit
        .entity_history(l.id.as_str(), None, None, 50)
        .await
        .unwrap();
    assert!(history.len() >= 4, "expected a full audit trail, got {}", history.len());
}

// ── Scenario 2: compliance block and override ─────────────────────────────────

#[tokio::test]
async fn compliance_block_then_override() {
    let services = services();

    let l = listing::create_listing(
        &services,
        &supplier(),
        listing_request(Some("some items are moldy")),
        "req-1",
    )
    .await
    .unwrap();
    demand::create_demand(&services, &recipient(), demand_request(), "req-2")
        .await
        .unwrap();

    let found = services.store.matches_for_listing(l.id.as_str()).await.unwrap();
    assert_eq!(found.len(), 1);
    let m = &found[0];
    assert_eq!(m.compliance.state, ComplianceState::Blocked);
    assert!(m.compliance.blocked_by.contains(&"QUAL-001".to_string()));

    // The reviewer sees it in the queue.
    let queue = compliance::compliance_queue(&services, &compliance_officer()).await.unwrap();
    assert_eq!(queue.len(), 1);

    // Accept works, scheduling does not.
    matches::accept_match(&services, &operator(), m.id.as_str(), "req-3").await.unwrap();
    let err = matches::schedule_match(&services, &operator(), m.id.as_str(), schedule_request("k1"), "req-4")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "COMPLIANCE_VIOLATION");

    // A justified override unblocks it.
    let approved = compliance::approve_match(
        &services,
        &compliance_officer(),
        m.id.as_str(),
        "inspected on site, affected crate removed",
        "req-5",
    )
    .await
    .unwrap();
    assert_eq!(approved.compliance.state, ComplianceState::Passed);
    assert!(approved.compliance.override_record.is_some());

    let task = matches::schedule_match(&services, &operator(), m.id.as_str(), schedule_request("k1"), "req-6")
        .await
        .unwrap();
    assert_eq!(task.status, EntityStatus::Scheduled);

    // The override is in the audit trail (invariant: no blocked match is
    // scheduled without one).
    let history = services
        .store
        .audit
        .entity_history(m.id.as_str(), None, None, 50)
        .await
        .unwrap();
    assert!(history.iter().any(|e| e.action == "compliance.override"
        && e.justification.as_deref() == Some("inspected on site, affected crate removed")));
}

// ── Scenario 3: optimistic conflict ───────────────────────────────────────────

#[tokio::test]
async fn concurrent_cancel_conflicts() {
    let services = services();
    let l = listing::create_listing(&services, &supplier(), listing_request(None), "req-1")
        .await
        .unwrap();

    // Two writers observed the same version; exactly one wins.
    let current = services.store.listings.get_or_fail(l.id.as_str()).await.unwrap();
    let patch = serde_json::json!({ "status": EntityStatus::Canceled });
    services
        .store
        .listings
        .update_fields(l.id.as_str(), patch.clone(), current.version)
        .await
        .unwrap();
    let second = services
        .store
        .listings
        .update_fields(l.id.as_str(), patch, current.version)
        .await
        .unwrap_err();
    let command_err: glean_commands::CommandError = second.into();
    assert_eq!(command_err.code(), "CONFLICT");
}

// ── Scenario 4: provider degradation ──────────────────────────────────────────

#[tokio::test]
async fn degraded_geocode_still_stores_and_matches() {
    let services = services();

    let mut request = listing_request(None);
    request.pickup_address = address("Nowhereville");
    let l = listing::create_listing(&services, &supplier(), request, "req-1")
        .await
        .unwrap();

    // Fallback coordinates and a geohash were stored (never a stale slot).
    assert!(l.pickup_location.is_some());
    assert!(l.geohash.is_some());

    // The pipeline ran to completion: enrichment landed on the listing.
    let stored = services.store.listings.get_or_fail(l.id.as_str()).await.unwrap();
    assert_ne!(stored.enrichment.status, glean_domain::EnrichmentStatus::Pending);
}

// ── Scenario 5: expired window ────────────────────────────────────────────────

#[tokio::test]
async fn expired_window_receives_no_matches() {
    let services = services();

    let mut request = listing_request(None);
    request.pickup_window =
        TimeWindow::new(Utc::now() - Duration::hours(1), Utc::now() + Duration::hours(1));
    let l = listing::create_listing(&services, &supplier(), request, "req-1")
        .await
        .unwrap();
    demand::create_demand(&services, &recipient(), demand_request(), "req-2")
        .await
        .unwrap();

    assert!(services.store.matches_for_listing(l.id.as_str()).await.unwrap().is_empty());
}

// ── Scenario 6: driver off-task ───────────────────────────────────────────────

#[tokio::test]
async fn other_driver_is_forbidden() {
    let services = services();

    let l = listing::create_listing(&services, &supplier(), listing_request(None), "req-1")
        .await
        .unwrap();
    demand::create_demand(&services, &recipient(), demand_request(), "req-2")
        .await
        .unwrap();
    let m = services.store.matches_for_listing(l.id.as_str()).await.unwrap()[0].clone();
    matches::accept_match(&services, &operator(), m.id.as_str(), "req-3").await.unwrap();
    let task = matches::schedule_match(&services, &operator(), m.id.as_str(), schedule_request("k1"), "req-4")
        .await
        .unwrap();

    let impostor = Actor::new("drv-2", "other@example.org", vec![Role::Driver]);
    let err = tasks::update_task_status(
        &services,
        &impostor,
        task.id.as_str(),
        tasks::TaskStatusRequest { status: EntityStatus::PickedUp, justification: None },
        "req-5",
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "AUTHORIZATION_ERROR");
}

// ── Supplementary flows ───────────────────────────────────────────────────────

#[tokio::test]
async fn owner_cancel_requires_justification() {
    let services = services();
    let l = listing::create_listing(&services, &supplier(), listing_request(None), "req-1")
        .await
        .unwrap();

    let err = listing::cancel_listing(&services, &supplier(), l.id.as_str(), None, "req-2")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE_TRANSITION");

    let canceled = listing::cancel_listing(
        &services,
        &supplier(),
        l.id.as_str(),
        Some("no longer available"),
        "req-3",
    )
    .await
    .unwrap();
    assert_eq!(canceled.status, EntityStatus::Canceled);

    // A stranger supplier cannot cancel someone else's listing.
    let l2 = listing::create_listing(&services, &supplier(), listing_request(None), "req-4")
        .await
        .unwrap();
    let stranger = Actor::new("sup-9", "x@example.org", vec![Role::Supplier]);
    let err = listing::cancel_listing(&services, &stranger, l2.id.as_str(), Some("mine now"), "req-5")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "AUTHORIZATION_ERROR");
}

#[tokio::test]
async fn delivery_updates_reliability_counters() {
    let services = services();

    // Seed profiles so the counters have somewhere to land.
    profile::upsert_profile(&services, &supplier(), Default::default(), "req-0").await.unwrap();
    profile::upsert_profile(&services, &recipient(), Default::default(), "req-0").await.unwrap();
    profile::upsert_profile(&services, &driver(), Default::default(), "req-0").await.unwrap();

    let l = listing::create_listing(&services, &supplier(), listing_request(None), "req-1")
        .await
        .unwrap();
    demand::create_demand(&services, &recipient(), demand_request(), "req-2").await.unwrap();
    let m = services.store.matches_for_listing(l.id.as_str()).await.unwrap()[0].clone();
    matches::accept_match(&services, &operator(), m.id.as_str(), "req-3").await.unwrap();
    let task = matches::schedule_match(&services, &operator(), m.id.as_str(), schedule_request("k1"), "req-4")
        .await
        .unwrap();

    for status in [EntityStatus::PickedUp, EntityStatus::Delivered] {
        tasks::update_task_status(
            &services,
            &driver(),
            task.id.as_str(),
            tasks::TaskStatusRequest { status, justification: None },
            "req-5",
        )
        .await
        .unwrap();
    }

    let sup_profile = services.store.profiles.get_or_fail("sup-1").await.unwrap();
    assert_eq!(sup_profile.deliveries_completed, 1);
    assert!(sup_profile.reliability_score > 80.0);
    let drv_profile = services.store.profiles.get_or_fail("drv-1").await.unwrap();
    assert_eq!(drv_profile.deliveries_completed, 1);
}

#[tokio::test]
async fn ops_dashboard_and_override() {
    let services = services();

    let l = listing::create_listing(&services, &supplier(), listing_request(None), "req-1")
        .await
        .unwrap();
    demand::create_demand(&services, &recipient(), demand_request(), "req-2").await.unwrap();
    let m = services.store.matches_for_listing(l.id.as_str()).await.unwrap()[0].clone();
    matches::accept_match(&services, &operator(), m.id.as_str(), "req-3").await.unwrap();
    let task = matches::schedule_match(&services, &operator(), m.id.as_str(), schedule_request("k1"), "req-4")
        .await
        .unwrap();
    tasks::update_task_status(
        &services,
        &driver(),
        task.id.as_str(),
        tasks::TaskStatusRequest { status: EntityStatus::PickedUp, justification: None },
        "req-5",
    )
    .await
    .unwrap();

    let board = ops::dashboard(&services, &operator()).await.unwrap();
    assert_eq!(board.tasks_by_status.get("picked_up"), Some(&1));

    // Wrong-scan recovery: picked_up back to scheduled, justified.
    let rolled_back = ops::override_task(
        &services,
        &operator(),
        task.id.as_str(),
        ops::TaskOverrideRequest {
            status: EntityStatus::Scheduled,
            justification: "scanned at the wrong stop".into(),
        },
        "req-6",
    )
    .await
    .unwrap();
    assert_eq!(rolled_back.status, EntityStatus::Scheduled);

    // Dashboards are operator-only.
    assert!(ops::dashboard(&services, &driver()).await.is_err());
}
