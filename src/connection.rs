//! Per-tenant backing-store connections: lazy dial, reuse, leases, idle eviction.

use crate::env::TenantEnvConfig;
use crate::error::AppError;
use crate::settings::TenancySettings;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Dials a tenant's database from its loaded config.
///
/// A trait seam so tests (and alternative stores) can swap the dial step;
/// pooling, single-flight, and eviction stay in [`ConnectionRegistry`].
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, tenant_id: &str, config: &TenantEnvConfig) -> Result<PgPool, AppError>;
}

/// Production connector: one bounded PostgreSQL pool per tenant database.
pub struct PgConnector {
    max_connections: u32,
    connect_timeout: Duration,
}

impl PgConnector {
    pub fn new(settings: &TenancySettings) -> Self {
        PgConnector {
            max_connections: settings.max_connections_per_tenant,
            connect_timeout: settings.connect_timeout,
        }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self, tenant_id: &str, config: &TenantEnvConfig) -> Result<PgPool, AppError> {
        let url = config.database_url().ok_or_else(|| {
            AppError::Connection(format!("tenant {}: config has no DATABASE_URL", tenant_id))
        })?;
        let dial = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.connect_timeout)
            .connect(url);
        match tokio::time::timeout(self.connect_timeout, dial).await {
            Ok(result) => {
                result.map_err(|e| AppError::Connection(format!("tenant {}: {}", tenant_id, e)))
            }
            Err(_) => Err(AppError::Connection(format!(
                "tenant {}: dial timed out",
                tenant_id
            ))),
        }
    }
}

/// A live per-tenant connection. Owned by the registry; callers borrow via [`ConnectionLease`].
#[derive(Debug)]
struct ConnectionHandle {
    tenant_id: String,
    pool: PgPool,
    created_at: DateTime<Utc>,
    last_used_at: Mutex<Instant>,
    ref_count: AtomicUsize,
}

impl ConnectionHandle {
    fn touch(&self) {
        let mut last = self.last_used_at.lock().unwrap_or_else(|e| e.into_inner());
        *last = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        let last = self.last_used_at.lock().unwrap_or_else(|e| e.into_inner());
        last.elapsed()
    }
}

/// RAII borrow of a tenant's pool. Holding a lease keeps the handle out of the
/// idle sweep; dropping it refreshes the idle clock.
#[derive(Debug)]
pub struct ConnectionLease {
    handle: Arc<ConnectionHandle>,
}

impl ConnectionLease {
    fn new(handle: Arc<ConnectionHandle>) -> Self {
        handle.ref_count.fetch_add(1, Ordering::SeqCst);
        handle.touch();
        ConnectionLease { handle }
    }

    pub fn tenant_id(&self) -> &str {
        &self.handle.tenant_id
    }

    pub fn pool(&self) -> &PgPool {
        &self.handle.pool
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.handle.created_at
    }
}

impl std::ops::Deref for ConnectionLease {
    type Target = PgPool;

    fn deref(&self) -> &PgPool {
        &self.handle.pool
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        self.handle.touch();
        self.handle.ref_count.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct ConnSlot {
    handle: Option<Arc<ConnectionHandle>>,
}

/// Per-tenant stats line for health checks.
#[derive(Clone, Debug, serde::Serialize)]
pub struct TenantConnectionStats {
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
    pub idle_seconds: u64,
    pub borrowed: bool,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct RegistryStats {
    pub active_count: usize,
    pub tenants: Vec<TenantConnectionStats>,
}

/// Registry of live per-tenant connections.
///
/// At most one handle per tenant id exists at any instant. The slot's async
/// mutex is held across the dial, so concurrent first requests for one tenant
/// produce exactly one connection; a failed dial leaves the slot empty and the
/// next request retries.
pub struct ConnectionRegistry {
    connector: Arc<dyn Connector>,
    idle_timeout: Duration,
    sweep_interval: Duration,
    slots: Mutex<HashMap<String, Arc<tokio::sync::Mutex<ConnSlot>>>>,
}

impl ConnectionRegistry {
    pub fn new(connector: Arc<dyn Connector>, settings: &TenancySettings) -> Self {
        ConnectionRegistry {
            connector,
            idle_timeout: settings.idle_timeout,
            sweep_interval: settings.sweep_interval,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Borrow the tenant's connection, dialing it on first use.
    pub async fn acquire(
        &self,
        tenant_id: &str,
        config: &TenantEnvConfig,
    ) -> Result<ConnectionLease, AppError> {
        let slot = self.slot(tenant_id);
        let mut guard = slot.lock().await;

        if let Some(handle) = &guard.handle {
            return Ok(ConnectionLease::new(handle.clone()));
        }

        let pool = self.connector.connect(tenant_id, config).await.map_err(|e| {
            tracing::warn!(tenant_id, error = %e, "tenant connection dial failed");
            e
        })?;
        let handle = Arc::new(ConnectionHandle {
            tenant_id: tenant_id.to_string(),
            pool,
            created_at: Utc::now(),
            last_used_at: Mutex::new(Instant::now()),
            ref_count: AtomicUsize::new(0),
        });
        guard.handle = Some(handle.clone());
        tracing::info!(tenant_id, "tenant connection created");
        Ok(ConnectionLease::new(handle))
    }

    /// Close and remove handles idle beyond the configured timeout.
    /// Borrowed handles are never evicted, regardless of idle time.
    pub async fn sweep_idle(&self) {
        for (tenant_id, slot) in self.slot_snapshot() {
            // A slot locked right now is being dialed or borrowed; not idle.
            let Ok(mut guard) = slot.try_lock() else {
                continue;
            };
            let evict = guard.handle.as_ref().is_some_and(|h| {
                h.ref_count.load(Ordering::SeqCst) == 0 && h.idle_for() >= self.idle_timeout
            });
            if evict {
                if let Some(handle) = guard.handle.take() {
                    drop(guard);
                    handle.pool.close().await;
                    tracing::info!(tenant_id = %tenant_id, "idle tenant connection closed");
                }
            }
        }
    }

    /// Run `sweep_idle` on an interval until the task is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(registry.sweep_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                registry.sweep_idle().await;
            }
        })
    }

    /// Explicit teardown for one tenant (deletion, mapping change).
    pub async fn remove(&self, tenant_id: &str) {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.remove(tenant_id)
        };
        if let Some(slot) = slot {
            let handle = slot.lock().await.handle.take();
            if let Some(handle) = handle {
                handle.pool.close().await;
                tracing::info!(tenant_id, "tenant connection removed");
            }
        }
    }

    /// Close everything (process shutdown).
    pub async fn clear(&self) {
        let slots: Vec<_> = {
            let mut map = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            map.drain().map(|(_, slot)| slot).collect()
        };
        for slot in slots {
            let handle = slot.lock().await.handle.take();
            if let Some(handle) = handle {
                handle.pool.close().await;
            }
        }
    }

    pub fn stats(&self) -> RegistryStats {
        let mut tenants = Vec::new();
        for (_, slot) in self.slot_snapshot() {
            let Ok(guard) = slot.try_lock() else {
                continue;
            };
            if let Some(handle) = &guard.handle {
                tenants.push(TenantConnectionStats {
                    tenant_id: handle.tenant_id.clone(),
                    created_at: handle.created_at,
                    idle_seconds: handle.idle_for().as_secs(),
                    borrowed: handle.ref_count.load(Ordering::SeqCst) > 0,
                });
            }
        }
        tenants.sort_by(|a, b| a.tenant_id.cmp(&b.tenant_id));
        RegistryStats {
            active_count: tenants.len(),
            tenants,
        }
    }

    fn slot(&self, tenant_id: &str) -> Arc<tokio::sync::Mutex<ConnSlot>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.entry(tenant_id.to_string()).or_default().clone()
    }

    fn slot_snapshot(&self) -> Vec<(String, Arc<tokio::sync::Mutex<ConnSlot>>)> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
