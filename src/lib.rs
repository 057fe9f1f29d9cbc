//! Tenancy SDK: multi-tenant resolution, config, and connection layer.
//!
//! Resolves a request's host and identity signals to a tenant, serves that
//! tenant's cached environment config, and leases a pooled connection to the
//! tenant's own database. A reduced static resolver covers runtimes without
//! filesystem or database access.

pub mod connection;
pub mod context;
pub mod edge;
pub mod env;
pub mod error;
pub mod extractors;
pub mod mapping;
pub mod middleware;
pub mod resolver;
pub mod routes;
pub mod settings;
pub mod state;

pub use connection::{ConnectionLease, ConnectionRegistry, Connector, PgConnector, RegistryStats};
pub use context::TenantContext;
pub use edge::{edge_middleware, EdgeState, StaticTenantDescriptor, StaticTenantRegistry, TenantStatus};
pub use env::{validate, ConfigSource, EnvCache, FsConfigSource, MemoryConfigSource, TenantEnvConfig};
pub use error::{AppError, ConfigError, ErrorBody};
pub use extractors::{RequireAdminTenant, RequireTenant};
pub use mapping::{MappingRegistry, TenantMapping, TenantType};
pub use middleware::tenant_middleware;
pub use resolver::{identify, RequestSignals, Resolution, TenantDirectory, TENANT_ID_HEADER};
pub use routes::{common_routes, common_routes_with_stats};
pub use settings::TenancySettings;
pub use state::TenancyState;
