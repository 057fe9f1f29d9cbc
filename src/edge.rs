//! Capability-reduced resolver for edge runtimes: in-memory registry, identity and status only.
//!
//! Runs where the full pipeline's dependencies (filesystem config, database
//! dial) cannot execute. Identification goes through the same precedence
//! engine as the full resolver; the only extra rule is the status gate, and
//! no variant here ever produces a live connection.

use crate::error::AppError;
use crate::mapping::normalize_domain;
use crate::middleware::failure_response;
use crate::resolver::{identify, RequestSignals, Resolution, TenantDirectory, TENANT_ID_HEADER};
use crate::settings::TenancySettings;
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Suspended,
    Pending,
    Archived,
}

impl TenantStatus {
    pub fn is_active(self) -> bool {
        self == TenantStatus::Active
    }
}

/// One statically provisioned tenant known to the edge tier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StaticTenantDescriptor {
    pub id: String,
    pub subdomain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub status: TenantStatus,
}

/// Small in-memory tenant list, indexed for the three lookup shapes.
#[derive(Default)]
pub struct StaticTenantRegistry {
    tenants: Vec<StaticTenantDescriptor>,
    by_domain: HashMap<String, usize>,
    by_subdomain: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl StaticTenantRegistry {
    pub fn new(tenants: Vec<StaticTenantDescriptor>) -> Self {
        let mut by_domain = HashMap::new();
        let mut by_subdomain = HashMap::new();
        let mut by_id = HashMap::new();
        for (idx, tenant) in tenants.iter().enumerate() {
            if let Some(domain) = &tenant.domain {
                by_domain.entry(normalize_domain(domain)).or_insert(idx);
            }
            by_subdomain
                .entry(tenant.subdomain.to_ascii_lowercase())
                .or_insert(idx);
            by_id.entry(tenant.id.clone()).or_insert(idx);
        }
        StaticTenantRegistry {
            tenants,
            by_domain,
            by_subdomain,
            by_id,
        }
    }

    pub fn get(&self, id: &str) -> Option<&StaticTenantDescriptor> {
        self.by_id.get(id).map(|&idx| &self.tenants[idx])
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }

    /// Identify and status-gate. Suspended, pending, and archived tenants are
    /// a distinct unavailable outcome, not an unknown one.
    pub fn resolve(&self, signals: &RequestSignals) -> Result<StaticTenantDescriptor, AppError> {
        match identify(self, signals) {
            Resolution::Match(tenant) => Ok(tenant),
            Resolution::Unavailable(_) => Err(AppError::TenantUnavailable(signals.domain())),
            Resolution::NotFound => Err(AppError::TenantNotFound(signals.domain())),
        }
    }
}

impl TenantDirectory for StaticTenantRegistry {
    type Entry = StaticTenantDescriptor;

    fn lookup_domain(&self, host: &str) -> Option<StaticTenantDescriptor> {
        self.by_domain.get(host).map(|&idx| self.tenants[idx].clone())
    }

    fn lookup_subdomain(&self, label: &str) -> Option<StaticTenantDescriptor> {
        self.by_subdomain
            .get(label)
            .map(|&idx| self.tenants[idx].clone())
    }

    fn lookup_id(&self, id: &str) -> Option<StaticTenantDescriptor> {
        self.by_id.get(id).map(|&idx| self.tenants[idx].clone())
    }

    fn entry_active(entry: &StaticTenantDescriptor) -> bool {
        entry.status.is_active()
    }
}

#[derive(Clone)]
pub struct EdgeState {
    pub registry: Arc<StaticTenantRegistry>,
    pub settings: Arc<TenancySettings>,
}

impl EdgeState {
    pub fn new(registry: StaticTenantRegistry, settings: TenancySettings) -> Self {
        EdgeState {
            registry: Arc::new(registry),
            settings: Arc::new(settings),
        }
    }
}

/// Edge twin of the full pipeline: same skip list and failure split, but the
/// attached context is the descriptor itself and nothing is dialed.
pub async fn edge_middleware(State(state): State<EdgeState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path();
    if state
        .settings
        .skip_prefixes
        .iter()
        .any(|prefix| path.starts_with(prefix.as_str()))
    {
        return next.run(req).await;
    }

    let signals = RequestSignals::from_request(&req);
    match state.registry.resolve(&signals) {
        Ok(tenant) => {
            if let Ok(value) = HeaderValue::from_str(&tenant.id) {
                req.headers_mut().insert(TENANT_ID_HEADER, value);
            }
            req.extensions_mut().insert(tenant);
            next.run(req).await
        }
        Err(err) => failure_response(&state.settings, &signals, err),
    }
}
