use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::Utc;
use glean_compliance::{ComplianceEngine, ComplianceInput};
use glean_config::Settings;
use glean_domain::{
    DemandPost, EnrichmentRecord, EnrichmentStatus, EntityStatus, EntityType, GeoPoint,
    MatchRecommendation, NotificationType, Role, RoutePlan, RoutePlanId, SurplusListing,
};
use glean_geo::prefixes_for_radius;
use glean_match::{CandidatePair, MatchingEngine, ScoredPair};
use glean_providers::{KeywordEnrichment, Providers};
use glean_store::{
    AuditEventInput, AuditLog, Datastore, DomainEvent, EventBus, Repository, MAX_QUERY_LIMIT,
};
use tracing::{debug, info, warn};

use crate::error::OrchestratorError;
use crate::report::{OrchestrationReport, Trigger};

const SYSTEM_ACTOR: &str = "system";

fn matchable(status: EntityStatus) -> bool {
    matches!(status, EntityStatus::Posted | EntityStatus::Matched)
}

/// A listing whose pickup window has already started can never pass TIME-001,
/// so it is dropped before any recommendation is persisted.
fn pickup_still_open(listing: &SurplusListing, now: chrono::DateTime<Utc>) -> bool {
    listing.pickup_window.start >= now
}

/// The event-driven pipeline: enrichment → candidate selection → matching →
/// per-pair compliance/route/persist → notification.
///
/// Stage failures other than enrichment are collected into the report and the
/// trigger entity is left recoverable; a later trigger resumes. Cancellation
/// propagates between stages by dropping the run future.
#[derive(Clone)]
pub struct Orchestrator {
    store: Datastore,
    providers: Providers,
    matching: MatchingEngine,
    compliance: ComplianceEngine,
    enrich_timeout: Duration,
    inline: bool,
}

impl Orchestrator {
    pub fn new(store: Datastore, providers: Providers, settings: &Settings) -> Self {
        Self {
            store,
            providers,
            matching: MatchingEngine::new(settings.matching.clone()),
            compliance: ComplianceEngine::new(settings.compliance.clone()),
            enrich_timeout: Duration::from_secs(settings.providers.enrich_timeout_secs),
            inline: false,
        }
    }

    /// Run triggers on the caller's task instead of spawning. Used by tests
    /// and batch tooling that need the run to finish before returning.
    pub fn with_inline_dispatch(mut self) -> Self {
        self.inline = true;
        self
    }

    /// Hand a trigger to the pipeline. Spawned by default; inline when
    /// configured. Failures are logged, never propagated to the caller —
    /// the trigger entity stays recoverable.
    pub async fn dispatch(&self, trigger: Trigger) {
        if self.inline {
            if let Err(e) = self.run(trigger.clone()).await {
                warn!(error = %e, ?trigger, "pipeline run failed");
            }
        } else {
            let this = self.clone();
            tokio::spawn(async move {
                if let Err(e) = this.run(trigger.clone()).await {
                    warn!(error = %e, ?trigger, "pipeline run failed");
                }
            });
        }
    }

    pub async fn run(&self, trigger: Trigger) -> Result<OrchestrationReport, OrchestratorError> {
        let mut report = OrchestrationReport::new(trigger.clone());
        info!(?trigger, "pipeline start");

        match &trigger {
            Trigger::ListingCreated { listing_id } | Trigger::ListingUpdated { listing_id } => {
                let listing = self.store.listings.get_or_fail(listing_id.as_str()).await?;

                // 1. Enrichment — never fails the pipeline.
                let listing = self.enrich_listing(listing, &mut report).await;

                if !matchable(listing.status) {
                    debug!(listing_id = %listing.id, status = %listing.status, "listing not matchable, stopping");
                    return Ok(report);
                }
                if !pickup_still_open(&listing, Utc::now()) {
                    debug!(listing_id = %listing.id, "pickup window already open, no recommendations");
                    return Ok(report);
                }

                // 2. Candidate selection via the geo index.
                let demands = self.candidate_demands(&listing).await?;

                // 3–5. Match, gate, persist, notify.
                let pairs = self.matching.filter(std::slice::from_ref(&listing), &demands);
                self.gate_and_persist(pairs, &mut report).await?;
            }
            Trigger::DemandCreated { demand_id } => {
                let demand = self.store.demands.get_or_fail(demand_id.as_str()).await?;
                if !matchable(demand.status) {
                    return Ok(report);
                }
                let listings = self.candidate_listings(&demand).await?;
                let pairs = self.matching.filter(&listings, std::slice::from_ref(&demand));
                self.gate_and_persist(pairs, &mut report).await?;
            }
        }

        info!(
            created = report.matches_created.len(),
            blocked = report.blocked.len(),
            errors = report.errors.len(),
            "pipeline complete"
        );
        Ok(report)
    }

    // ── Stage 1: enrichment ───────────────────────────────────────────────────

    async fn enrich_listing(
        &self,
        listing: SurplusListing,
        report: &mut OrchestrationReport,
    ) -> SurplusListing {
        let outcome = match tokio::time::timeout(
            self.enrich_timeout,
            self.providers.enrichment.enrich(&listing),
        )
        .await
        {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(listing_id = %listing.id, error = %e, "enrichment provider failed, degrading");
                KeywordEnrichment::scan(&listing, EnrichmentStatus::Degraded)
            }
            Err(_) => {
                warn!(
                    listing_id = %listing.id,
                    timeout_secs = self.enrich_timeout.as_secs(),
                    "enrichment timed out, degrading"
                );
                KeywordEnrichment::scan(&listing, EnrichmentStatus::Degraded)
            }
        };

        let record = EnrichmentRecord {
            status: match outcome.status {
                EnrichmentStatus::Completed => EnrichmentStatus::Completed,
                _ => EnrichmentStatus::Degraded,
            },
            ai_risk_score: Some(outcome.risk_score),
            ai_flags: outcome.risk_flags.clone(),
        };
        report.enrichment = Some(record.status);

        // Union-merge extracted handling requirements into the listing.
        let mut handling = listing.handling_requirements.clone();
        for req in &outcome.handling_requirements {
            if !handling.iter().any(|h| h.eq_ignore_ascii_case(req)) {
                handling.push(req.clone());
            }
        }

        let patch = serde_json::json!({
            "enrichment": record,
            "handling_requirements": handling,
        });

        let before = serde_json::to_value(&listing.enrichment).ok();
        let persisted = match self
            .store
            .listings
            .update_fields(listing.id.as_str(), patch.clone(), listing.version)
            .await
        {
            Ok(updated) => Some(updated),
            Err(e) if e.is_conflict() => {
                // Someone wrote the listing mid-run; retry once on the fresh
                // version before giving up.
                match self.store.listings.get(listing.id.as_str()).await {
                    Ok(Some(fresh)) => self
                        .store
                        .listings
                        .update_fields(listing.id.as_str(), patch, fresh.version)
                        .await
                        .ok(),
                    _ => None,
                }
            }
            Err(e) => {
                warn!(listing_id = %listing.id, error = %e, "enrichment persist failed");
                None
            }
        };

        match persisted {
            Some(updated) => {
                self.audit(AuditEventInput {
                    entity_type: EntityType::Listing,
                    entity_id: updated.id.to_string(),
                    actor_id: SYSTEM_ACTOR.to_string(),
                    actor_role: Role::System,
                    action: "listing.enriched".to_string(),
                    before,
                    after: serde_json::to_value(&updated.enrichment).ok(),
                    justification: None,
                    request_id: None,
                })
                .await;
                updated
            }
            None => {
                report.errors.push(format!("enrichment persist failed for {}", listing.id));
                listing
            }
        }
    }

    // ── Stage 2: candidate selection ──────────────────────────────────────────

    async fn candidate_demands(
        &self,
        listing: &SurplusListing,
    ) -> Result<Vec<DemandPost>, OrchestratorError> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut demands = Vec::new();

        match listing.pickup_location {
            Some(center) => {
                for prefix in prefixes_for_radius(center, self.matching.max_radius_miles()) {
                    let hits = self
                        .store
                        .demands
                        .query_by_geohash_prefix(&prefix, MAX_QUERY_LIMIT)
                        .await?;
                    for demand in hits {
                        if matchable(demand.status) && seen.insert(demand.id.to_string()) {
                            demands.push(demand);
                        }
                    }
                }
            }
            None => {
                // No coordinates to sweep around; fall back to the status index.
                for status in [EntityStatus::Posted, EntityStatus::Matched] {
                    for demand in self.store.demands.query_by_status(status, MAX_QUERY_LIMIT).await? {
                        if seen.insert(demand.id.to_string()) {
                            demands.push(demand);
                        }
                    }
                }
            }
        }

        debug!(listing_id = %listing.id, candidates = demands.len(), "candidate demands selected");
        Ok(demands)
    }

    async fn candidate_listings(
        &self,
        demand: &DemandPost,
    ) -> Result<Vec<SurplusListing>, OrchestratorError> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut listings = Vec::new();

        let now = Utc::now();
        match demand.delivery_location {
            Some(center) => {
                for prefix in prefixes_for_radius(center, self.matching.max_radius_miles()) {
                    let hits = self
                        .store
                        .listings
                        .query_by_geohash_prefix(&prefix, MAX_QUERY_LIMIT)
                        .await?;
                    for listing in hits {
                        if matchable(listing.status)
                            && pickup_still_open(&listing, now)
                            && seen.insert(listing.id.to_string())
                        {
                            listings.push(listing);
                        }
                    }
                }
            }
            None => {
                for status in [EntityStatus::Posted, EntityStatus::Matched] {
                    for listing in
                        self.store.listings.query_by_status(status, MAX_QUERY_LIMIT).await?
                    {
                        if pickup_still_open(&listing, now) && seen.insert(listing.id.to_string()) {
                            listings.push(listing);
                        }
                    }
                }
            }
        }

        debug!(demand_id = %demand.id, candidates = listings.len(), "candidate listings selected");
        Ok(listings)
    }

    // ── Stages 3–5: match, gate, persist, notify ──────────────────────────────

    async fn gate_and_persist(
        &self,
        pairs: Vec<CandidatePair>,
        report: &mut OrchestrationReport,
    ) -> Result<(), OrchestratorError> {
        report.candidates = pairs.len();
        if pairs.is_empty() {
            return Ok(());
        }

        // Profiles for the reliability sub-score, best effort.
        let mut profile_ids: Vec<String> = pairs
            .iter()
            .flat_map(|p| {
                [p.listing.supplier_id.to_string(), p.demand.recipient_id.to_string()]
            })
            .collect();
        profile_ids.sort();
        profile_ids.dedup();
        let profiles: HashMap<String, glean_domain::UserProfile> = self
            .store
            .profiles
            .batch_get(&profile_ids)
            .await?
            .into_iter()
            .map(|p| (p.id.to_string(), p))
            .collect();

        let now = Utc::now();
        let by_key: HashMap<(String, String), &CandidatePair> = pairs
            .iter()
            .map(|p| ((p.listing.id.to_string(), p.demand.id.to_string()), p))
            .collect();

        let scored: Vec<ScoredPair> = pairs
            .iter()
            .map(|pair| {
                self.matching.score(
                    pair,
                    profiles.get(pair.listing.supplier_id.as_str()),
                    profiles.get(pair.demand.recipient_id.as_str()),
                    now,
                )
            })
            .collect();
        let ranked = self.matching.rank(scored);
        report.scored = ranked.len();

        // Pairs already recommended are skipped, keeping re-runs idempotent.
        let mut existing: HashSet<(String, String)> = HashSet::new();
        let mut listing_ids: Vec<&str> = ranked.iter().map(|s| s.listing_id.as_str()).collect();
        listing_ids.sort();
        listing_ids.dedup();
        for listing_id in listing_ids {
            for m in self.store.matches_for_listing(listing_id).await? {
                existing.insert((m.listing_id.to_string(), m.demand_id.to_string()));
            }
        }

        let mut created: Vec<MatchRecommendation> = Vec::new();
        for scored_pair in &ranked {
            let key = (scored_pair.listing_id.to_string(), scored_pair.demand_id.to_string());
            if existing.contains(&key) {
                report.skipped_existing += 1;
                continue;
            }
            let Some(pair) = by_key.get(&key) else { continue };

            match self.persist_recommendation(pair, scored_pair, now).await {
                Ok(recommendation) => {
                    if recommendation.compliance.state == glean_domain::ComplianceState::Blocked {
                        report.blocked.push(recommendation.id.clone());
                    }
                    report.matches_created.push(recommendation.id.clone());
                    created.push(recommendation);
                }
                Err(e) => {
                    warn!(
                        listing_id = %scored_pair.listing_id,
                        demand_id = %scored_pair.demand_id,
                        error = %e,
                        "recommendation not created"
                    );
                    report.errors.push(format!(
                        "pair {}/{}: {}",
                        scored_pair.listing_id, scored_pair.demand_id, e
                    ));
                }
            }
        }

        // 5. Notify both parties; failures are logged only.
        for recommendation in &created {
            self.notify_parties(recommendation).await;
        }

        Ok(())
    }

    /// Route → route plan → compliance → recommendation, one pair. A failed
    /// route lookup aborts the pair: no match without a route plan.
    async fn persist_recommendation(
        &self,
        pair: &CandidatePair,
        scored: &ScoredPair,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<MatchRecommendation, OrchestratorError> {
        let from = pair.listing.pickup_location.unwrap_or(GeoPoint::new(0.0, 0.0));
        let to = pair.demand.delivery_location.unwrap_or(GeoPoint::new(0.0, 0.0));

        let route = self.providers.location.route(from, to).await?;
        let route_plan = RoutePlan {
            id: RoutePlanId::generate(),
            from,
            to,
            distance_miles: route.distance_miles,
            duration_minutes: route.duration_minutes,
            polyline: route.polyline.clone(),
            provider: route.provider.clone(),
            provider_status: if route.degraded {
                glean_domain::ProviderStatus::Degraded
            } else {
                glean_domain::ProviderStatus::Ok
            },
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let route_plan = self.store.routes.put(route_plan).await?;

        let evaluation = self.compliance.evaluate(&ComplianceInput {
            listing: &pair.listing,
            demand: &pair.demand,
            distance_miles: Some(scored.distance_miles),
            now,
        });

        let recommendation = MatchRecommendation {
            id: glean_domain::MatchId::generate(),
            listing_id: scored.listing_id.clone(),
            demand_id: scored.demand_id.clone(),
            supplier_id: scored.supplier_id.clone(),
            recipient_id: scored.recipient_id.clone(),
            score: scored.score,
            breakdown: scored.breakdown,
            distance_miles: scored.distance_miles,
            status: EntityStatus::Posted,
            compliance: evaluation.to_record(),
            route_plan_id: Some(route_plan.id.clone()),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let recommendation = self.store.matches.put(recommendation).await?;

        self.audit(AuditEventInput {
            entity_type: EntityType::Match,
            entity_id: recommendation.id.to_string(),
            actor_id: SYSTEM_ACTOR.to_string(),
            actor_role: Role::System,
            action: "match.proposed".to_string(),
            before: None,
            after: serde_json::to_value(&recommendation).ok(),
            justification: None,
            request_id: None,
        })
        .await;

        let event = if recommendation.compliance.state == glean_domain::ComplianceState::Blocked {
            DomainEvent::ComplianceBlocked {
                match_id: recommendation.id.clone(),
                blocked_by: recommendation.compliance.blocked_by.clone(),
            }
        } else {
            DomainEvent::MatchProposed {
                match_id: recommendation.id.clone(),
                listing_id: recommendation.listing_id.clone(),
                demand_id: recommendation.demand_id.clone(),
                score: recommendation.score,
            }
        };
        if let Err(e) = self.store.events.publish(event).await {
            warn!(match_id = %recommendation.id, error = %e, "event publish failed");
        }

        Ok(recommendation)
    }

    async fn notify_parties(&self, recommendation: &MatchRecommendation) {
        let blocked = recommendation.compliance.state == glean_domain::ComplianceState::Blocked;
        let (kind, title) = if blocked {
            (NotificationType::ComplianceBlocked, "Match held for compliance review")
        } else {
            (NotificationType::MatchProposed, "New match proposed")
        };
        let message = if blocked {
            format!(
                "A potential match was held by compliance checks: {}",
                recommendation.compliance.blocked_by.join(", ")
            )
        } else {
            format!(
                "A match scored {:.0} was proposed {:.1} miles away",
                recommendation.score, recommendation.distance_miles
            )
        };

        for user in [&recommendation.supplier_id, &recommendation.recipient_id] {
            if let Err(e) = self
                .providers
                .notifier
                .send(
                    user,
                    kind,
                    title,
                    &message,
                    EntityType::Match,
                    recommendation.id.as_str(),
                )
                .await
            {
                warn!(user_id = %user, error = %e, "notification failed");
            }
        }
    }

    async fn audit(&self, input: AuditEventInput) {
        if let Err(e) = self.store.audit.write_event(input).await {
            warn!(error = %e, "audit write failed");
        }
    }
}
