pub mod cache;
pub mod enrichment;
pub mod error;
pub mod location;
pub mod notify;

use std::sync::Arc;

use glean_config::ProviderSettings;
use glean_store::Datastore;

pub use cache::TtlCache;
pub use enrichment::{
    EnrichmentProvider, EnrichmentResult, HttpEnrichmentProvider, KeywordEnrichment,
};
pub use error::ProviderError;
pub use location::{
    GeocodeResult, GridLocationProvider, HttpLocationProvider, LocationProvider, RouteResult,
};
pub use notify::{Notifier, StoreNotifier};

/// The external collaborators the core consumes, bundled for injection.
#[derive(Clone)]
pub struct Providers {
    pub location: Arc<dyn LocationProvider>,
    pub enrichment: Arc<dyn EnrichmentProvider>,
    pub notifier: Arc<dyn Notifier>,
}

impl Providers {
    /// HTTP-backed providers when base URLs are configured, deterministic
    /// local implementations otherwise. Notifications always go through the
    /// store so preferences and the notification record are honored.
    pub fn from_settings(settings: &ProviderSettings, store: &Datastore) -> Self {
        let location: Arc<dyn LocationProvider> = match &settings.geocode_base_url {
            Some(base) => Arc::new(HttpLocationProvider::new(
                base.clone(),
                settings.geocode_timeout_secs,
                settings.route_timeout_secs,
                settings.cache_ttl_secs,
            )),
            None => Arc::new(GridLocationProvider::new()),
        };

        let enrichment: Arc<dyn EnrichmentProvider> = match &settings.enrich_base_url {
            Some(base) => Arc::new(HttpEnrichmentProvider::new(
                base.clone(),
                settings.enrich_timeout_secs,
            )),
            None => Arc::new(KeywordEnrichment::new()),
        };

        let notifier: Arc<dyn Notifier> = Arc::new(StoreNotifier::new(
            store.profiles.clone(),
            store.notifications.clone(),
        ));

        Self { location, enrichment, notifier }
    }
}
