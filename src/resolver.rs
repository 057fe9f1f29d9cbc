//! Tenant identification: one precedence engine over host, header, path, and query signals.
//!
//! Both the full mapping registry and the static edge registry implement
//! [`TenantDirectory`], so there is exactly one documented strategy order:
//! custom domain, subdomain, `X-Tenant-ID` header, `/tenant/{id}` path prefix,
//! `?tenant=`/`?t=` query parameter. The first hit wins.

use crate::mapping::{normalize_domain, MappingRegistry, TenantMapping};
use axum::http::Request;

/// Header carrying an explicit tenant id override.
pub const TENANT_ID_HEADER: &str = "X-Tenant-ID";

/// First host labels that never identify a tenant.
pub const RESERVED_SUBDOMAINS: &[&str] = &["www", "api", "admin", "app", "mail", "ftp"];

/// Identity signals extracted once per request.
#[derive(Clone, Debug, Default)]
pub struct RequestSignals {
    pub host: Option<String>,
    pub tenant_header: Option<String>,
    pub path: String,
    pub query: Option<String>,
}

impl RequestSignals {
    pub fn from_request<B>(req: &Request<B>) -> Self {
        let host = req
            .headers()
            .get(axum::http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| req.uri().host().map(str::to_string));
        let tenant_header = req
            .headers()
            .get(TENANT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        RequestSignals {
            host,
            tenant_header,
            path: req.uri().path().to_string(),
            query: req.uri().query().map(str::to_string),
        }
    }

    /// Normalized host for logs and error bodies.
    pub fn domain(&self) -> String {
        self.host
            .as_deref()
            .map(normalize_domain)
            .unwrap_or_else(|| "unknown".into())
    }

    /// Tenant id from a `/tenant/{id}/...` path prefix.
    fn path_tenant(&self) -> Option<&str> {
        let rest = self.path.strip_prefix("/tenant/")?;
        let id = rest.split('/').next().unwrap_or(rest);
        (!id.is_empty()).then_some(id)
    }

    /// Tenant id from `?tenant=` or `?t=`.
    fn query_tenant(&self) -> Option<&str> {
        let query = self.query.as_deref()?;
        query.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            ((k == "tenant" || k == "t") && !v.is_empty()).then_some(v)
        })
    }
}

/// First label of the host, unless reserved or the host has no further labels.
fn subdomain_label(host: &str) -> Option<String> {
    let host = normalize_domain(host);
    let (label, rest) = host.split_once('.')?;
    if label.is_empty() || rest.is_empty() || RESERVED_SUBDOMAINS.contains(&label) {
        return None;
    }
    Some(label.to_string())
}

/// Lookup surface the precedence engine runs against.
pub trait TenantDirectory {
    type Entry: Clone;

    /// Exact registered-domain match. `host` is already normalized.
    fn lookup_domain(&self, host: &str) -> Option<Self::Entry>;
    /// Match by the first host label.
    fn lookup_subdomain(&self, label: &str) -> Option<Self::Entry>;
    /// Match by an explicit id from header, path, or query.
    fn lookup_id(&self, id: &str) -> Option<Self::Entry>;
    fn entry_active(entry: &Self::Entry) -> bool;
}

/// Outcome of identification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution<E> {
    /// An active tenant won a strategy.
    Match(E),
    /// An address strategy hit a known tenant that is not active.
    Unavailable(E),
    NotFound,
}

/// Run the strategies in precedence order against `dir`.
///
/// Address strategies (domain, subdomain) resolve inactive tenants to
/// [`Resolution::Unavailable`]: the address is owned, the tenant is off.
/// Override strategies (header, path, query) treat an unknown or inactive id
/// as a plain no-match and fall through to the next strategy.
pub fn identify<D: TenantDirectory>(dir: &D, signals: &RequestSignals) -> Resolution<D::Entry> {
    if let Some(raw_host) = signals.host.as_deref() {
        let host = normalize_domain(raw_host);
        if let Some(entry) = dir.lookup_domain(&host) {
            return gate::<D>(entry);
        }
        if let Some(label) = subdomain_label(raw_host) {
            if let Some(entry) = dir.lookup_subdomain(&label) {
                return gate::<D>(entry);
            }
        }
    }

    let overrides = [
        signals.tenant_header.as_deref(),
        signals.path_tenant(),
        signals.query_tenant(),
    ];
    for id in overrides.into_iter().flatten() {
        if let Some(entry) = dir.lookup_id(id) {
            if D::entry_active(&entry) {
                return Resolution::Match(entry);
            }
        }
    }
    Resolution::NotFound
}

fn gate<D: TenantDirectory>(entry: D::Entry) -> Resolution<D::Entry> {
    if D::entry_active(&entry) {
        Resolution::Match(entry)
    } else {
        Resolution::Unavailable(entry)
    }
}

impl TenantDirectory for MappingRegistry {
    type Entry = TenantMapping;

    fn lookup_domain(&self, host: &str) -> Option<TenantMapping> {
        self.domain(host).cloned()
    }

    // Subdomain labels double as derived tenant ids in the mapping document.
    fn lookup_subdomain(&self, label: &str) -> Option<TenantMapping> {
        self.id(label).cloned()
    }

    fn lookup_id(&self, id: &str) -> Option<TenantMapping> {
        self.id(id).cloned()
    }

    fn entry_active(entry: &TenantMapping) -> bool {
        entry.is_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::TenantType;

    fn mapping(domain: &str, config_ref: &str, active: bool) -> TenantMapping {
        TenantMapping {
            domain: domain.into(),
            config_ref: config_ref.into(),
            tenant_type: TenantType::Website,
            is_active: active,
        }
    }

    /// Registry with one tenant per strategy, so conflicting signals expose the order.
    fn conflict_registry() -> MappingRegistry {
        MappingRegistry::from_records(vec![
            mapping("custom.example.com", "domtenant.cfg", true),
            mapping("subtenant.app.com", "subtenant.cfg", true),
            mapping("hdrtenant.app.com", "hdrtenant.cfg", true),
            mapping("pathtenant.app.com", "pathtenant.cfg", true),
            mapping("qrytenant.app.com", "qrytenant.cfg", true),
        ])
    }

    fn winner(reg: &MappingRegistry, signals: &RequestSignals) -> Option<String> {
        match identify(reg, signals) {
            Resolution::Match(m) => Some(m.tenant_id().to_string()),
            _ => None,
        }
    }

    #[test]
    fn precedence_is_total_and_deterministic() {
        let reg = conflict_registry();
        // All five signals present and conflicting.
        let mut signals = RequestSignals {
            host: Some("custom.example.com".into()),
            tenant_header: Some("hdrtenant".into()),
            path: "/tenant/pathtenant/pages".into(),
            query: Some("tenant=qrytenant".into()),
        };
        assert_eq!(winner(&reg, &signals).as_deref(), Some("domtenant"));

        // Unregistered domain whose first label is a known id: subdomain strategy.
        signals.host = Some("subtenant.sites.net".into());
        assert_eq!(winner(&reg, &signals).as_deref(), Some("subtenant"));

        // Drop the host entirely: header outranks path and query.
        signals.host = None;
        assert_eq!(winner(&reg, &signals).as_deref(), Some("hdrtenant"));

        // Drop the header: path outranks query.
        signals.tenant_header = None;
        assert_eq!(winner(&reg, &signals).as_deref(), Some("pathtenant"));

        // Drop the path prefix: query is the last resort.
        signals.path = "/pages".into();
        assert_eq!(winner(&reg, &signals).as_deref(), Some("qrytenant"));

        signals.query = None;
        assert_eq!(identify(&reg, &signals), Resolution::NotFound);
    }

    #[test]
    fn domain_outranks_every_override() {
        let reg = conflict_registry();
        for (path, query, header) in [
            ("/tenant/pathtenant/x", None, None),
            ("/x", Some("tenant=qrytenant"), None),
            ("/x", Some("t=qrytenant"), None),
            ("/x", None, Some("hdrtenant")),
        ] {
            let signals = RequestSignals {
                host: Some("custom.example.com".into()),
                tenant_header: header.map(String::from),
                path: path.into(),
                query: query.map(String::from),
            };
            assert_eq!(winner(&reg, &signals).as_deref(), Some("domtenant"));
        }
    }

    #[test]
    fn subdomain_outranks_header_path_and_query() {
        let reg = conflict_registry();
        let signals = RequestSignals {
            host: Some("subtenant.sites.net".into()),
            tenant_header: Some("hdrtenant".into()),
            path: "/tenant/pathtenant/x".into(),
            query: Some("t=qrytenant".into()),
        };
        assert_eq!(winner(&reg, &signals).as_deref(), Some("subtenant"));
    }

    #[test]
    fn reserved_subdomains_never_match() {
        let reg = MappingRegistry::from_records(vec![
            mapping("www.app.com", "", true),
            mapping("api-x.app.com", "api.cfg", true),
        ]);
        for host in ["www.app.com", "api.app.com", "admin.app.com", "mail.app.com"] {
            let signals = RequestSignals {
                host: Some(host.into()),
                ..Default::default()
            };
            // "www.app.com" still matches as a registered custom domain; the
            // others must not resolve via their reserved first label.
            if host != "www.app.com" {
                assert_eq!(identify(&reg, &signals), Resolution::NotFound, "{host}");
            }
        }
    }

    #[test]
    fn unknown_override_falls_through_to_next_strategy() {
        let reg = conflict_registry();
        let signals = RequestSignals {
            host: None,
            tenant_header: Some("ghost".into()),
            path: "/tenant/pathtenant/x".into(),
            query: None,
        };
        assert_eq!(winner(&reg, &signals).as_deref(), Some("pathtenant"));
    }

    #[test]
    fn inactive_override_is_a_no_match() {
        let reg = MappingRegistry::from_records(vec![
            mapping("frozen.app.com", "frozen.cfg", false),
            mapping("qrytenant.app.com", "qrytenant.cfg", true),
        ]);
        let signals = RequestSignals {
            host: None,
            tenant_header: Some("frozen".into()),
            path: "/x".into(),
            query: Some("tenant=qrytenant".into()),
        };
        assert_eq!(winner(&reg, &signals).as_deref(), Some("qrytenant"));
    }

    #[test]
    fn inactive_domain_match_is_unavailable() {
        let reg = MappingRegistry::from_records(vec![mapping("beta.app.com", "beta.cfg", false)]);
        let signals = RequestSignals {
            host: Some("beta.app.com".into()),
            ..Default::default()
        };
        match identify(&reg, &signals) {
            Resolution::Unavailable(m) => assert_eq!(m.tenant_id(), "beta"),
            other => panic!("expected unavailable, got {:?}", other),
        }
    }

    #[test]
    fn host_with_port_still_matches_domain() {
        let reg = MappingRegistry::from_records(vec![mapping("cms.acme.com", "acme.cfg", true)]);
        let signals = RequestSignals {
            host: Some("cms.acme.com:8443".into()),
            ..Default::default()
        };
        assert_eq!(winner(&reg, &signals).as_deref(), Some("acme"));
    }
}
