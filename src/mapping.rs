//! Tenant mapping registry: domain -> config binding, authored by external tooling and read-only here.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Kind of site a tenant serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantType {
    Admin,
    Website,
}

impl std::str::FromStr for TenantType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(TenantType::Admin),
            "website" => Ok(TenantType::Website),
            _ => Err(AppError::Processing(format!(
                "invalid tenant type: {} (expected admin or website)",
                s
            ))),
        }
    }
}

impl std::fmt::Display for TenantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TenantType::Admin => f.write_str("admin"),
            TenantType::Website => f.write_str("website"),
        }
    }
}

/// One record of the mapping document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantMapping {
    /// Registered custom domain, unique key of the document.
    pub domain: String,
    /// Reference to the tenant's config payload (e.g. a dotenv file name).
    pub config_ref: String,
    pub tenant_type: TenantType,
    pub is_active: bool,
}

impl TenantMapping {
    /// Tenant id derived from the mapping: the stem of `config_ref`
    /// (`"acme.cfg"` -> `"acme"`). Never taken from the client.
    pub fn tenant_id(&self) -> &str {
        let base = self
            .config_ref
            .rsplit('/')
            .next()
            .unwrap_or(&self.config_ref);
        base.split('.').next().unwrap_or(base)
    }
}

/// In-memory view of the mapping document, indexed by domain and derived id.
///
/// Inactive mappings are kept so an address owned by a disabled tenant can be
/// reported as unavailable instead of unknown.
#[derive(Clone, Default)]
pub struct MappingRegistry {
    by_domain: HashMap<String, TenantMapping>,
    by_id: HashMap<String, TenantMapping>,
}

impl MappingRegistry {
    /// Build from an ordered record list. Duplicate domains keep the first
    /// active record (warned), matching the one-active-mapping-per-domain rule.
    pub fn from_records(records: Vec<TenantMapping>) -> Self {
        let mut by_domain: HashMap<String, TenantMapping> = HashMap::new();
        let mut by_id: HashMap<String, TenantMapping> = HashMap::new();
        for mut rec in records {
            rec.domain = normalize_domain(&rec.domain);
            let id = rec.tenant_id().to_string();

            match by_domain.get(&rec.domain) {
                Some(existing) if existing.is_active && rec.is_active => {
                    tracing::warn!(domain = %rec.domain, "duplicate active mapping for domain, keeping first");
                    continue;
                }
                Some(existing) if existing.is_active => continue,
                _ => {}
            }
            by_domain.insert(rec.domain.clone(), rec.clone());

            match by_id.get(&id) {
                Some(existing) if existing.is_active && !rec.is_active => {}
                _ => {
                    by_id.insert(id, rec);
                }
            }
        }
        MappingRegistry { by_domain, by_id }
    }

    /// Read the mapping document (a JSON array of records) from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Processing(format!("mapping document {}: {}", path.display(), e))
        })?;
        let records: Vec<TenantMapping> = serde_json::from_str(&raw).map_err(|e| {
            AppError::Processing(format!("mapping document {}: {}", path.display(), e))
        })?;
        Ok(Self::from_records(records))
    }

    pub fn domain(&self, domain: &str) -> Option<&TenantMapping> {
        self.by_domain.get(&normalize_domain(domain))
    }

    pub fn id(&self, tenant_id: &str) -> Option<&TenantMapping> {
        self.by_id.get(tenant_id)
    }

    pub fn len(&self) -> usize {
        self.by_domain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_domain.is_empty()
    }
}

/// Lowercase and strip any port suffix so `Host: CMS.Acme.com:8443` matches a registered domain.
pub fn normalize_domain(host: &str) -> String {
    let host = host.trim();
    let host = host.rsplit_once(':').map_or(host, |(h, port)| {
        if port.chars().all(|c| c.is_ascii_digit()) {
            h
        } else {
            host
        }
    });
    host.to_ascii_lowercase()
}
