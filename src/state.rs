use dashmap::DashMap;
use uuid::Uuid;

use crate::config::Config;
use crate::directory::DriverDirectory;
use crate::gateway::sessions::SessionRegistry;
use crate::observability::metrics::Metrics;
use crate::store::RideStore;

/// All mutable shared state lives here and is injected into the gateway and
/// the dispatch engine; nothing reaches into module-level singletons.
pub struct AppState {
    pub rides: RideStore,
    pub drivers: DriverDirectory,
    pub sessions: SessionRegistry,
    /// Ride id → drivers the offer went out to, kept until the offer resolves.
    pub offers: DashMap<Uuid, Vec<Uuid>>,
    pub metrics: Metrics,
    pub dispatch_radius_meters: f64,
    pub session_buffer_size: usize,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            rides: RideStore::new(),
            drivers: DriverDirectory::new(config.max_dispatch_candidates),
            sessions: SessionRegistry::new(),
            offers: DashMap::new(),
            metrics: Metrics::new(),
            dispatch_radius_meters: config.dispatch_radius_meters,
            session_buffer_size: config.session_buffer_size,
        }
    }
}
