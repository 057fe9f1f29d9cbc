//! Tunables for the tenancy layer. Every duration and bound here is configuration, not a constant.

use std::time::Duration;

/// Settings shared by the resolver, env cache, connection registry, and pipeline.
///
/// `Default` gives production-ish values; `from_env` overrides from `TENANCY_*`
/// variables so deployments can tune without a rebuild.
#[derive(Clone, Debug)]
pub struct TenancySettings {
    /// How long a loaded tenant config stays served from cache.
    pub env_cache_ttl: Duration,
    /// Upper bound on one config-source read.
    pub load_timeout: Duration,
    /// Disuse duration after which a pooled connection is swept.
    pub idle_timeout: Duration,
    /// Interval between idle sweeps.
    pub sweep_interval: Duration,
    /// Upper bound on dialing a tenant's database.
    pub connect_timeout: Duration,
    /// Per-tenant pool size (the per-tenant concurrent-connection bound).
    pub max_connections_per_tenant: u32,
    /// Path prefixes that bypass tenant identification entirely.
    pub skip_prefixes: Vec<String>,
    /// Requests under this prefix get JSON errors; everything else is browser-class.
    pub api_prefix: String,
    /// Development mode: fallback-domain retry and verbose diagnostics.
    pub dev_mode: bool,
    /// Domain substituted for one retry when resolution fails in dev mode.
    pub fallback_domain: Option<String>,
}

impl Default for TenancySettings {
    fn default() -> Self {
        TenancySettings {
            env_cache_ttl: Duration::from_secs(300),
            load_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            max_connections_per_tenant: 5,
            skip_prefixes: vec![
                "/health".into(),
                "/ready".into(),
                "/version".into(),
                "/stats".into(),
                "/static".into(),
                "/assets".into(),
                "/favicon.ico".into(),
                "/.well-known".into(),
            ],
            api_prefix: "/api".into(),
            dev_mode: false,
            fallback_domain: None,
        }
    }
}

impl TenancySettings {
    /// Build settings from `TENANCY_*` env vars, falling back to defaults per field.
    pub fn from_env() -> Self {
        let d = TenancySettings::default();
        TenancySettings {
            env_cache_ttl: env_secs("TENANCY_ENV_CACHE_TTL_SECS", d.env_cache_ttl),
            load_timeout: env_secs("TENANCY_LOAD_TIMEOUT_SECS", d.load_timeout),
            idle_timeout: env_secs("TENANCY_IDLE_TIMEOUT_SECS", d.idle_timeout),
            sweep_interval: env_secs("TENANCY_SWEEP_INTERVAL_SECS", d.sweep_interval),
            connect_timeout: env_secs("TENANCY_CONNECT_TIMEOUT_SECS", d.connect_timeout),
            max_connections_per_tenant: env_parse(
                "TENANCY_MAX_CONNECTIONS_PER_TENANT",
                d.max_connections_per_tenant,
            ),
            skip_prefixes: std::env::var("TENANCY_SKIP_PREFIXES")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or(d.skip_prefixes),
            api_prefix: std::env::var("TENANCY_API_PREFIX").unwrap_or(d.api_prefix),
            dev_mode: std::env::var("TENANCY_DEV_MODE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            fallback_domain: std::env::var("TENANCY_FALLBACK_DOMAIN")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
