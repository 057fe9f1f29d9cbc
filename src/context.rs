//! Request-scoped tenant context attached by the pipeline.

use crate::env::TenantEnvConfig;
use crate::mapping::{TenantMapping, TenantType};
use serde::Serialize;

/// What downstream handlers learn about the resolved tenant.
///
/// Built once per request after resolution and config validation. Carries the
/// masked locator and the public config blob only; raw secrets never cross
/// this boundary.
#[derive(Clone, Debug, Serialize)]
pub struct TenantContext {
    pub tenant_id: String,
    pub domain: String,
    pub tenant_type: TenantType,
    pub config_ref: String,
    pub is_active: bool,
    /// Backing-store locator with credentials redacted.
    pub database_locator: Option<String>,
    /// Non-secret config keys, JSON-serialized for forwarding.
    pub public_config: serde_json::Value,
}

impl TenantContext {
    pub fn new(mapping: &TenantMapping, config: &TenantEnvConfig) -> Self {
        TenantContext {
            tenant_id: mapping.tenant_id().to_string(),
            domain: mapping.domain.clone(),
            tenant_type: mapping.tenant_type,
            config_ref: mapping.config_ref.clone(),
            is_active: mapping.is_active,
            database_locator: config.masked_database_url(),
            public_config: config.public_config(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.tenant_type == TenantType::Admin
    }
}
