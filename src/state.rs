//! Shared tenancy services for the pipeline and routes. No globals; tests build their own.

use crate::connection::{ConnectionRegistry, Connector, PgConnector};
use crate::env::{ConfigSource, EnvCache};
use crate::mapping::MappingRegistry;
use crate::settings::TenancySettings;
use std::sync::Arc;

#[derive(Clone)]
pub struct TenancyState {
    pub mappings: Arc<MappingRegistry>,
    pub env_cache: Arc<EnvCache>,
    pub connections: Arc<ConnectionRegistry>,
    pub settings: Arc<TenancySettings>,
}

impl TenancyState {
    pub fn new(
        mappings: MappingRegistry,
        source: Arc<dyn ConfigSource>,
        connector: Arc<dyn Connector>,
        settings: TenancySettings,
    ) -> Self {
        TenancyState {
            mappings: Arc::new(mappings),
            env_cache: Arc::new(EnvCache::new(source, &settings)),
            connections: Arc::new(ConnectionRegistry::new(connector, &settings)),
            settings: Arc::new(settings),
        }
    }

    /// Production wiring: PostgreSQL connector sized from `settings`.
    pub fn with_postgres(
        mappings: MappingRegistry,
        source: Arc<dyn ConfigSource>,
        settings: TenancySettings,
    ) -> Self {
        let connector = Arc::new(PgConnector::new(&settings));
        Self::new(mappings, source, connector, settings)
    }
}
