//! TTL cache over a config source with per-ref single-flight loads.

use crate::env::{validate, ConfigSource, TenantEnvConfig};
use crate::error::{AppError, ConfigError};
use crate::settings::TenancySettings;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A published cache entry. Immutable; replaced wholesale on refresh or expiry.
struct CacheEntry {
    value: Arc<TenantEnvConfig>,
    expires_at: Instant,
}

#[derive(Default)]
struct Slot {
    entry: Option<CacheEntry>,
}

/// Hit/miss/size counters surfaced on the ops endpoint.
#[derive(Clone, Debug, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

/// Caches loaded tenant configs by `config_ref`.
///
/// Concurrent loads of one ref coalesce: the slot's async mutex is held across
/// the source read, so the first caller does the I/O and the rest find a fresh
/// entry when they acquire the lock. A failed load leaves the slot empty, so
/// the next request retries instead of seeing a poisoned entry.
pub struct EnvCache {
    source: Arc<dyn ConfigSource>,
    ttl: Duration,
    load_timeout: Duration,
    slots: Mutex<HashMap<String, Arc<tokio::sync::Mutex<Slot>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EnvCache {
    pub fn new(source: Arc<dyn ConfigSource>, settings: &TenancySettings) -> Self {
        EnvCache {
            source,
            ttl: settings.env_cache_ttl,
            load_timeout: settings.load_timeout,
            slots: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Serve `config_ref` from cache, loading (and validating) it on miss or expiry.
    pub async fn load(&self, config_ref: &str) -> Result<Arc<TenantEnvConfig>, AppError> {
        let slot = self.slot(config_ref);
        let mut guard = slot.lock().await;

        if let Some(entry) = &guard.entry {
            if entry.expires_at > Instant::now() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(entry.value.clone());
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let values = match tokio::time::timeout(self.load_timeout, self.source.read(config_ref))
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(ConfigError::Missing(format!("{}: load timed out", config_ref)).into())
            }
        };

        let config = TenantEnvConfig::new(config_ref, values);
        let missing = validate(&config);
        if !missing.is_empty() {
            tracing::warn!(config_ref, ?missing, "tenant config failed validation");
            return Err(ConfigError::Invalid {
                config_ref: config_ref.to_string(),
                missing: missing.into_iter().map(String::from).collect(),
            }
            .into());
        }

        let value = Arc::new(config);
        guard.entry = Some(CacheEntry {
            value: value.clone(),
            expires_at: Instant::now() + self.ttl,
        });
        tracing::debug!(config_ref, "tenant config loaded");
        Ok(value)
    }

    /// Drop the cached entry for `config_ref` so the next load re-reads the source.
    pub async fn refresh(&self, config_ref: &str) {
        let slot = {
            let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.get(config_ref).cloned()
        };
        if let Some(slot) = slot {
            slot.lock().await.entry = None;
            tracing::info!(config_ref, "tenant config cache entry invalidated");
        }
    }

    pub fn stats(&self) -> CacheStats {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let size = slots
            .values()
            .filter(|slot| {
                slot.try_lock()
                    .map(|guard| guard.entry.is_some())
                    .unwrap_or(false)
            })
            .count();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size,
        }
    }

    fn slot(&self, config_ref: &str) -> Arc<tokio::sync::Mutex<Slot>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .entry(config_ref.to_string())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Memory-backed source that counts reads and can simulate slow I/O.
    struct CountingSource {
        inner: crate::env::MemoryConfigSource,
        reads: AtomicUsize,
        delay: Duration,
    }

    impl CountingSource {
        fn new(delay: Duration) -> Self {
            CountingSource {
                inner: crate::env::MemoryConfigSource::new(),
                reads: AtomicUsize::new(0),
                delay,
            }
        }

        fn with_valid(self, config_ref: &str, tenant_id: &str) -> Self {
            self.inner.insert_pairs(
                config_ref,
                &[
                    ("DATABASE_URL", "postgres://u:p@localhost/db"),
                    ("TENANT_ID", tenant_id),
                    ("JWT_SECRET", "shh"),
                ],
            );
            self
        }
    }

    #[async_trait]
    impl ConfigSource for CountingSource {
        async fn read(
            &self,
            config_ref: &str,
        ) -> Result<HashMap<String, String>, AppError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.read(config_ref).await
        }
    }

    fn settings(ttl: Duration) -> TenancySettings {
        TenancySettings {
            env_cache_ttl: ttl,
            ..TenancySettings::default()
        }
    }

    #[tokio::test]
    async fn second_load_is_served_from_cache() {
        let source = Arc::new(CountingSource::new(Duration::ZERO).with_valid("acme.cfg", "acme"));
        let cache = EnvCache::new(source.clone(), &settings(Duration::from_secs(60)));

        let first = cache.load("acme.cfg").await.unwrap();
        let second = cache.load("acme.cfg").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));
    }

    #[tokio::test]
    async fn expired_entry_triggers_exactly_one_fresh_load() {
        let source = Arc::new(CountingSource::new(Duration::ZERO).with_valid("acme.cfg", "acme"));
        let cache = EnvCache::new(source.clone(), &settings(Duration::from_millis(20)));

        cache.load("acme.cfg").await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.load("acme.cfg").await.unwrap();
        cache.load("acme.cfg").await.unwrap();
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_loads_coalesce_into_one_read() {
        let source =
            Arc::new(CountingSource::new(Duration::from_millis(50)).with_valid("acme.cfg", "acme"));
        let cache = Arc::new(EnvCache::new(
            source.clone(),
            &settings(Duration::from_secs(60)),
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.load("acme.cfg").await }));
        }
        for handle in handles {
            let config = handle.await.unwrap().unwrap();
            assert_eq!(config.tenant_id(), Some("acme"));
        }
        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_invalidates_one_entry() {
        let source = Arc::new(
            CountingSource::new(Duration::ZERO)
                .with_valid("acme.cfg", "acme")
                .with_valid("globex.cfg", "globex"),
        );
        let cache = EnvCache::new(source.clone(), &settings(Duration::from_secs(60)));

        cache.load("acme.cfg").await.unwrap();
        cache.load("globex.cfg").await.unwrap();
        cache.refresh("acme.cfg").await;

        cache.load("acme.cfg").await.unwrap();
        cache.load("globex.cfg").await.unwrap();
        assert_eq!(source.reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn missing_required_field_is_config_invalid() {
        let source = Arc::new(CountingSource::new(Duration::ZERO));
        source
            .inner
            .insert_pairs("acme.cfg", &[("TENANT_ID", "acme"), ("JWT_SECRET", "shh")]);
        let cache = EnvCache::new(source, &settings(Duration::from_secs(60)));

        let err = cache.load("acme.cfg").await.unwrap_err();
        match err {
            AppError::Config(ConfigError::Invalid { config_ref, missing }) => {
                assert_eq!(config_ref, "acme.cfg");
                assert_eq!(missing, vec!["DATABASE_URL"]);
            }
            other => panic!("expected CONFIG_INVALID, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn invalid_result_is_not_cached() {
        let source = Arc::new(CountingSource::new(Duration::ZERO));
        source.inner.insert_pairs("acme.cfg", &[("TENANT_ID", "acme")]);
        let cache = EnvCache::new(source.clone(), &settings(Duration::from_secs(60)));

        assert!(cache.load("acme.cfg").await.is_err());
        // Fixed out-of-band; the next load must re-read, not replay the failure.
        source.inner.insert_pairs(
            "acme.cfg",
            &[
                ("DATABASE_URL", "postgres://u:p@localhost/db"),
                ("TENANT_ID", "acme"),
                ("JWT_SECRET", "shh"),
            ],
        );
        assert!(cache.load("acme.cfg").await.is_ok());
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_source_times_out_as_config_missing() {
        let source =
            Arc::new(CountingSource::new(Duration::from_millis(200)).with_valid("acme.cfg", "acme"));
        let mut s = settings(Duration::from_secs(60));
        s.load_timeout = Duration::from_millis(10);
        let cache = EnvCache::new(source, &s);

        let err = cache.load("acme.cfg").await.unwrap_err();
        assert_eq!(err.code(), "CONFIG_MISSING");
    }
}
