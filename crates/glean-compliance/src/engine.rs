use chrono::{DateTime, Duration, Utc};
use glean_config::ComplianceSettings;
use glean_domain::{
    CheckSeverity, ComplianceCheck, ComplianceOverride, ComplianceRecord, ComplianceState,
    DemandPost, SurplusListing, UserId,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Advances whenever the rule set changes.
pub const RULESET_VERSION: &str = "2.1.0";

/// Handling tokens that satisfy the refrigeration rule.
const REFRIGERATION_TOKENS: &[&str] = &["refrigerated", "refrigeration", "cold_chain", "cooler"];

// ── Shapes ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct ComplianceInput<'a> {
    pub listing: &'a SurplusListing,
    pub demand: &'a DemandPost,
    /// Computed pair distance, when the matcher produced one.
    pub distance_miles: Option<f64>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceEvaluation {
    /// True iff no error-severity check failed.
    pub passed: bool,
    pub checks: Vec<ComplianceCheck>,
    /// Rule ids of failing error-severity checks.
    pub blocked_by: Vec<String>,
    pub ruleset_version: String,
    pub evaluated_at: DateTime<Utc>,
}

impl ComplianceEvaluation {
    /// The persistable compliance record for a match, without any override.
    pub fn to_record(&self) -> ComplianceRecord {
        ComplianceRecord {
            state: if self.passed { ComplianceState::Passed } else { ComplianceState::Blocked },
            checks: self.checks.clone(),
            blocked_by: self.blocked_by.clone(),
            ruleset_version: self.ruleset_version.clone(),
            override_record: None,
        }
    }
}

fn check(
    rule_id: &str,
    rule_name: &str,
    passed: bool,
    severity: CheckSeverity,
    message: impl Into<String>,
) -> ComplianceCheck {
    ComplianceCheck {
        rule_id: rule_id.to_string(),
        rule_name: rule_name.to_string(),
        passed,
        severity,
        message: message.into(),
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ComplianceEngine {
    cfg: ComplianceSettings,
}

impl ComplianceEngine {
    pub fn new(cfg: ComplianceSettings) -> Self {
        Self { cfg }
    }

    /// Run every rule. The evaluation passes iff no error-severity rule
    /// failed; warnings never block.
    pub fn evaluate(&self, input: &ComplianceInput<'_>) -> ComplianceEvaluation {
        let checks = vec![
            self.check_refrigeration(input),
            self.check_expiration(input),
            self.check_quality_notes(input),
            self.check_pickup_window(input),
            self.check_capacity(input),
            self.check_distance(input),
        ];

        let blocked_by: Vec<String> = checks
            .iter()
            .filter(|c| !c.passed && c.severity == CheckSeverity::Error)
            .map(|c| c.rule_id.clone())
            .collect();
        let passed = blocked_by.is_empty();

        debug!(
            listing_id = %input.listing.id,
            demand_id = %input.demand.id,
            passed,
            blocked = blocked_by.len(),
            "compliance evaluated"
        );

        ComplianceEvaluation {
            passed,
            checks,
            blocked_by,
            ruleset_version: RULESET_VERSION.to_string(),
            evaluated_at: input.now,
        }
    }

    /// REF-001: refrigerated goods need a short pickup window and a cold-chain
    /// handling token.
    fn check_refrigeration(&self, input: &ComplianceInput<'_>) -> ComplianceCheck {
        const ID: &str = "REF-001";
        const NAME: &str = "Refrigeration handling";

        let listing = input.listing;
        if !listing.requires_refrigeration {
            return check(ID, NAME, true, CheckSeverity::Error, "no refrigeration required");
        }

        let window = listing.pickup_window.duration();
        let max_window = Duration::hours(self.cfg.max_refrigeration_window_hours);
        if window > max_window {
            return check(
                ID,
                NAME,
                false,
                CheckSeverity::Error,
                format!(
                    "pickup window of {}h exceeds the {}h cold-chain limit",
                    window.num_hours(),
                    self.cfg.max_refrigeration_window_hours
                ),
            );
        }

        let has_token = listing.handling_requirements.iter().any(|req| {
            let req = req.to_lowercase();
            REFRIGERATION_TOKENS.iter().any(|t| req.contains(t))
        });
        if !has_token {
            return check(
                ID,
                NAME,
                false,
                CheckSeverity::Error,
                "refrigeration required but no cold-chain handling requirement declared",
            );
        }

        check(ID, NAME, true, CheckSeverity::Error, "cold chain declared within window limit")
    }

    /// EXP-001: expiration must leave at least the configured buffer.
    fn check_expiration(&self, input: &ComplianceInput<'_>) -> ComplianceCheck {
        const ID: &str = "EXP-001";
        const NAME: &str = "Expiration buffer";

        match input.listing.expiration_date {
            None => check(ID, NAME, true, CheckSeverity::Error, "no expiration date"),
            Some(expiration) => {
                let cutoff = input.now + Duration::hours(self.cfg.min_expiration_buffer_hours);
                if expiration >= cutoff {
                    check(ID, NAME, true, CheckSeverity::Error, "expiration leaves enough buffer")
                } else {
                    check(
                        ID,
                        NAME,
                        false,
                        CheckSeverity::Error,
                        format!(
                            "expires {} — inside the {}h buffer",
                            expiration.to_rfc3339(),
                            self.cfg.min_expiration_buffer_hours
                        ),
                    )
                }
            }
        }
    }

    /// QUAL-001: blocked keywords in quality notes.
    fn check_quality_notes(&self, input: &ComplianceInput<'_>) -> ComplianceCheck {
        const ID: &str = "QUAL-001";
        const NAME: &str = "Quality notes";

        let Some(notes) = &input.listing.quality_notes else {
            return check(ID, NAME, true, CheckSeverity::Error, "no quality notes");
        };
        let notes_lower = notes.to_lowercase();
        let hit = self
            .cfg
            .blocked_keywords
            .iter()
            .find(|k| notes_lower.contains(k.as_str()));

        match hit {
            Some(keyword) => check(
                ID,
                NAME,
                false,
                CheckSeverity::Error,
                format!("quality notes mention '{}'", keyword),
            ),
            None => check(ID, NAME, true, CheckSeverity::Error, "quality notes clear"),
        }
    }

    /// TIME-001: pickups cannot start in the past. A start exactly at `now`
    /// passes.
    fn check_pickup_window(&self, input: &ComplianceInput<'_>) -> ComplianceCheck {
        const ID: &str = "TIME-001";
        const NAME: &str = "Pickup window";

        if input.listing.pickup_window.start >= input.now {
            check(ID, NAME, true, CheckSeverity::Error, "pickup window is in the future")
        } else {
            check(ID, NAME, false, CheckSeverity::Error, "pickup window has already started")
        }
    }

    /// CAP-001: the listing must fit the recipient's capacity; very low
    /// utilization is worth a warning but never blocks.
    fn check_capacity(&self, input: &ComplianceInput<'_>) -> ComplianceCheck {
        const ID: &str = "CAP-001";
        const NAME: &str = "Recipient capacity";

        let quantity = input.listing.quantity.amount;
        let capacity = input.demand.capacity;
        if capacity <= 0.0 || quantity > capacity {
            return check(
                ID,
                NAME,
                false,
                CheckSeverity::Error,
                format!("quantity {} exceeds recipient capacity {}", quantity, capacity),
            );
        }
        let utilization = quantity / capacity;
        if utilization < 0.2 {
            return check(
                ID,
                NAME,
                false,
                CheckSeverity::Warning,
                format!("low capacity utilization ({:.0}%)", utilization * 100.0),
            );
        }
        check(ID, NAME, true, CheckSeverity::Error, "within recipient capacity")
    }

    /// DIST-001: long hauls warn; they never block.
    fn check_distance(&self, input: &ComplianceInput<'_>) -> ComplianceCheck {
        const ID: &str = "DIST-001";
        const NAME: &str = "Transport distance";

        match input.distance_miles {
            None => check(ID, NAME, true, CheckSeverity::Warning, "distance not computed"),
            Some(distance) if distance <= self.cfg.max_distance_miles => {
                check(ID, NAME, true, CheckSeverity::Warning, "within distance limit")
            }
            Some(distance) => check(
                ID,
                NAME,
                false,
                CheckSeverity::Warning,
                format!(
                    "{:.1} mi exceeds the {:.0} mi advisory limit",
                    distance, self.cfg.max_distance_miles
                ),
            ),
        }
    }

    /// Produce a passing copy of `evaluation` with every failing check
    /// annotated. The caller records the override on the match and in the
    /// audit log.
    pub fn approve_override(
        evaluation: &ComplianceEvaluation,
        approver_id: &UserId,
        justification: &str,
        now: DateTime<Utc>,
    ) -> (ComplianceEvaluation, ComplianceOverride) {
        let checks = evaluation
            .checks
            .iter()
            .map(|c| {
                if c.passed {
                    c.clone()
                } else {
                    let mut annotated = c.clone();
                    annotated.message =
                        format!("{} (overridden: {})", c.message, justification);
                    annotated
                }
            })
            .collect();

        let approved = ComplianceEvaluation {
            passed: true,
            checks,
            blocked_by: evaluation.blocked_by.clone(),
            ruleset_version: evaluation.ruleset_version.clone(),
            evaluated_at: evaluation.evaluated_at,
        };
        let record = ComplianceOverride {
            approver_id: approver_id.clone(),
            justification: justification.to_string(),
            approved_at: now,
        };
        (approved, record)
    }
}
