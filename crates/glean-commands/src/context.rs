use std::sync::Arc;

use glean_config::Settings;
use glean_domain::{Address, GeoPoint};
use glean_orchestrator::Orchestrator;
use glean_providers::Providers;
use glean_store::{AuditEventInput, AuditLog, Datastore, DomainEvent, EventBus};
use tracing::warn;

/// Everything a command handler needs, bundled for injection into the HTTP
/// layer and the CLI.
#[derive(Clone)]
pub struct Services {
    pub store: Datastore,
    pub providers: Providers,
    pub orchestrator: Arc<Orchestrator>,
    pub settings: Arc<Settings>,
}

impl Services {
    /// Wire providers and the pipeline around an existing datastore.
    pub fn build(store: Datastore, settings: Settings) -> Self {
        let settings = Arc::new(settings);
        let providers = Providers::from_settings(&settings.providers, &store);
        let orchestrator =
            Arc::new(Orchestrator::new(store.clone(), providers.clone(), &settings));
        Self { store, providers, orchestrator, settings }
    }

    /// Fully in-memory services: local providers, ephemeral store. Used for
    /// tests and `serve --ephemeral`.
    pub fn ephemeral(settings: Settings) -> Self {
        let store = Datastore::in_memory(settings.audit.retention_days);
        Self::build(store, settings)
    }

    /// Replace the spawned pipeline with an inline one so command calls only
    /// return once their triggered run finished. Deterministic for tests.
    pub fn with_inline_orchestration(mut self) -> Self {
        self.orchestrator = Arc::new(
            Orchestrator::new(self.store.clone(), self.providers.clone(), &self.settings)
                .with_inline_dispatch(),
        );
        self
    }

    /// Audit writes never fail the parent operation.
    pub(crate) async fn audit(&self, input: AuditEventInput) {
        if let Err(e) = self.store.audit.write_event(input).await {
            warn!(error = %e, "audit write failed");
        }
    }

    /// Event publishes are at-least-once and never fail the parent operation.
    pub(crate) async fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.store.events.publish(event).await {
            warn!(error = %e, "event publish failed");
        }
    }

    /// Geocode an address into coordinates plus the stored geohash. The
    /// provider degrades internally; only a hard provider failure leaves the
    /// coordinate (and therefore the geohash) absent.
    pub(crate) async fn geocode(&self, address: &Address) -> (Option<GeoPoint>, Option<String>) {
        match self.providers.location.geocode(address).await {
            Ok(result) => {
                let hash = glean_geo::encode(result.point.lat, result.point.lon, 6);
                (Some(result.point), Some(hash))
            }
            Err(e) => {
                warn!(error = %e, "geocode hard failure, storing without coordinates");
                (None, None)
            }
        }
    }
}
