//! Where a tenant's config payload is read from.

use crate::error::{AppError, ConfigError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// Reads the raw key/value payload for a `config_ref`.
///
/// Implementations must be cheap to call repeatedly; caching and
/// single-flight live in [`super::EnvCache`], not here.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn read(&self, config_ref: &str) -> Result<HashMap<String, String>, AppError>;
}

/// Dotenv-format file per config_ref under a base directory.
pub struct FsConfigSource {
    base_dir: PathBuf,
}

impl FsConfigSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        FsConfigSource {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl ConfigSource for FsConfigSource {
    async fn read(&self, config_ref: &str) -> Result<HashMap<String, String>, AppError> {
        // config_ref comes from the mapping document, but never let one escape the base dir.
        if config_ref.contains("..") || config_ref.starts_with('/') {
            return Err(ConfigError::Missing(config_ref.to_string()).into());
        }
        let path = self.base_dir.join(config_ref);
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| ConfigError::Missing(format!("{}: {}", config_ref, e)))?;

        let mut values = HashMap::new();
        for item in dotenvy::from_read_iter(std::io::Cursor::new(raw)) {
            let (key, value) =
                item.map_err(|e| ConfigError::Missing(format!("{}: {}", config_ref, e)))?;
            values.insert(key, value);
        }
        Ok(values)
    }
}

/// In-memory source for constrained runtimes, embedding, and tests.
#[derive(Default)]
pub struct MemoryConfigSource {
    payloads: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl MemoryConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, config_ref: impl Into<String>, values: HashMap<String, String>) {
        if let Ok(mut payloads) = self.payloads.write() {
            payloads.insert(config_ref.into(), values);
        }
    }

    /// Convenience for literal payloads.
    pub fn insert_pairs(&self, config_ref: impl Into<String>, pairs: &[(&str, &str)]) {
        self.insert(
            config_ref,
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }
}

#[async_trait]
impl ConfigSource for MemoryConfigSource {
    async fn read(&self, config_ref: &str) -> Result<HashMap<String, String>, AppError> {
        let payloads = self
            .payloads
            .read()
            .map_err(|_| AppError::Processing("config source lock poisoned".into()))?;
        payloads
            .get(config_ref)
            .cloned()
            .ok_or_else(|| ConfigError::Missing(config_ref.to_string()).into())
    }
}
