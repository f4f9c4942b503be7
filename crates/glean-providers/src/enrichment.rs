use std::time::Duration;

use async_trait::async_trait;
use glean_domain::{Category, EnrichmentStatus, SurplusListing};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ProviderError;

// ── Result ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentResult {
    pub normalized_category: Option<Category>,
    pub extracted_categories: Vec<Category>,
    /// Handling tokens to union into the listing.
    pub handling_requirements: Vec<String>,
    /// 0..=100.
    pub risk_score: f64,
    pub risk_flags: Vec<String>,
    pub confidence: f64,
    pub status: EnrichmentStatus,
}

/// Classify and risk-score a listing's free text.
///
/// Implementations degrade rather than fail: a timeout or upstream error
/// yields a heuristic result with `status: Degraded`. The orchestrator never
/// fails its pipeline on enrichment.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync + 'static {
    async fn enrich(&self, listing: &SurplusListing) -> Result<EnrichmentResult, ProviderError>;
}

// ── Keyword heuristic ─────────────────────────────────────────────────────────

const REFRIGERATION_KEYWORDS: &[&str] = &[
    "dairy", "milk", "cheese", "yogurt", "meat", "poultry", "seafood", "fish", "frozen",
    "refrigerated", "cold",
];
const FRAGILE_KEYWORDS: &[&str] = &["glass", "eggs", "fragile", "jars"];
const HEAVY_KEYWORDS: &[&str] = &["pallet", "bulk", "heavy"];
const RISK_KEYWORDS: &[&str] = &[
    "spoiled", "moldy", "damaged", "rotten", "contaminated", "expired", "leaking", "unsealed",
];

/// Rule-based fallback enrichment: scans title, description and quality notes
/// for keyword families. Also serves as the offline provider.
#[derive(Debug, Default, Clone)]
pub struct KeywordEnrichment;

impl KeywordEnrichment {
    pub fn new() -> Self {
        Self
    }

    fn corpus(listing: &SurplusListing) -> String {
        let mut text = listing.title.clone();
        if let Some(description) = &listing.description {
            text.push(' ');
            text.push_str(description);
        }
        if let Some(notes) = &listing.quality_notes {
            text.push(' ');
            text.push_str(notes);
        }
        text.to_lowercase()
    }

    /// Deterministic scan; `status` lets the caller distinguish a first-class
    /// heuristic run from a degraded fallback after an upstream failure.
    pub fn scan(listing: &SurplusListing, status: EnrichmentStatus) -> EnrichmentResult {
        let corpus = Self::corpus(listing);
        let hit = |keywords: &[&str]| keywords.iter().any(|k| corpus.contains(k));

        let mut handling = Vec::new();
        if listing.requires_refrigeration || hit(REFRIGERATION_KEYWORDS) {
            handling.push("refrigerated".to_string());
        }
        if hit(FRAGILE_KEYWORDS) {
            handling.push("fragile".to_string());
        }
        if hit(HEAVY_KEYWORDS) {
            handling.push("heavy".to_string());
        }

        let risk_flags: Vec<String> = RISK_KEYWORDS
            .iter()
            .filter(|k| corpus.contains(*k))
            .map(|k| format!("keyword:{}", k))
            .collect();
        let risk_score = (10.0 + risk_flags.len() as f64 * 20.0).min(90.0);

        EnrichmentResult {
            normalized_category: None,
            extracted_categories: vec![listing.category],
            handling_requirements: handling,
            risk_score,
            risk_flags,
            confidence: 0.5,
            status,
        }
    }
}

#[async_trait]
impl EnrichmentProvider for KeywordEnrichment {
    async fn enrich(&self, listing: &SurplusListing) -> Result<EnrichmentResult, ProviderError> {
        debug!(listing_id = %listing.id, "KeywordEnrichment: scan");
        Ok(Self::scan(listing, EnrichmentStatus::Completed))
    }
}

// ── HTTP (LLM) provider ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct EnrichResponse {
    normalized_category: Option<Category>,
    #[serde(default)]
    extracted_categories: Vec<Category>,
    #[serde(default)]
    handling_requirements: Vec<String>,
    risk_score: f64,
    #[serde(default)]
    risk_flags: Vec<String>,
    confidence: Option<f64>,
}

/// Enrichment backed by an LLM extraction service. Any failure (including the
/// hard call timeout) degrades to the keyword heuristic.
pub struct HttpEnrichmentProvider {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpEnrichmentProvider {
    pub fn new(base_url: String, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    async fn enrich_upstream(
        &self,
        listing: &SurplusListing,
    ) -> Result<EnrichmentResult, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v1/enrich", self.base_url))
            .json(&serde_json::json!({
                "title": listing.title,
                "description": listing.description,
                "quality_notes": listing.quality_notes,
                "category": listing.category,
                "requires_refrigeration": listing.requires_refrigeration,
            }))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?
            .error_for_status()
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let body: EnrichResponse =
            response.json().await.map_err(|e| ProviderError::Http(e.to_string()))?;

        Ok(EnrichmentResult {
            normalized_category: body.normalized_category,
            extracted_categories: body.extracted_categories,
            handling_requirements: body.handling_requirements,
            risk_score: body.risk_score.clamp(0.0, 100.0),
            risk_flags: body.risk_flags,
            confidence: body.confidence.unwrap_or(0.8),
            status: EnrichmentStatus::Completed,
        })
    }
}

#[async_trait]
impl EnrichmentProvider for HttpEnrichmentProvider {
    async fn enrich(&self, listing: &SurplusListing) -> Result<EnrichmentResult, ProviderError> {
        match self.enrich_upstream(listing).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(listing_id = %listing.id, error = %e, "enrichment failed, degrading to keyword scan");
                Ok(KeywordEnrichment::scan(listing, EnrichmentStatus::Degraded))
            }
        }
    }
}
