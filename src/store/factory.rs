//! Builder for assembling the tiered store.

use std::sync::Arc;

use crate::net::build_client;

use super::config::{PrimaryKind, StoreConfig};
use super::document::{DocumentStore, DocumentTier, MemoryDocumentStore};
use super::error::{StoreError, StoreResult};
use super::kv::KvStore;
use super::rest::{RestMirror, RestMirrorConfig};
use super::tiered::TieredPlaceStore;

/// Assembles a [`TieredPlaceStore`] from configuration plus optional
/// injected pieces (a custom primary backend, a shared HTTP client, an
/// already-open KV store).
///
/// # Example
/// ```ignore
/// let config = StoreConfig::from_default_location()?;
/// let store = TieredStoreBuilder::new(config).build()?;
/// ```
pub struct TieredStoreBuilder {
    config: StoreConfig,
    primary: Option<Arc<dyn DocumentStore>>,
    client: Option<reqwest::Client>,
    kv: Option<Arc<KvStore>>,
}

impl TieredStoreBuilder {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            primary: None,
            client: None,
            kv: None,
        }
    }

    /// Inject a primary backend instead of the configured built-in.
    pub fn primary(mut self, primary: Arc<dyn DocumentStore>) -> Self {
        self.primary = Some(primary);
        self
    }

    /// Reuse an existing HTTP client for the REST mirror.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Reuse an already-open KV store.
    pub fn kv(mut self, kv: Arc<KvStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    pub fn build(self) -> StoreResult<TieredPlaceStore> {
        let kv = match self.kv {
            Some(kv) => kv,
            None => Arc::new(KvStore::open(&self.config.local.kv_path)?),
        };

        let primary: Arc<dyn DocumentStore> = match self.primary {
            Some(primary) => primary,
            None => match self.config.primary_kind()? {
                PrimaryKind::Memory => Arc::new(MemoryDocumentStore::new()),
            },
        };

        let mirror: Option<Arc<dyn DocumentTier>> = if self.config.mirror.is_configured() {
            let client = match self.client {
                Some(client) => client,
                None => build_client(&self.config.http).map_err(|e| {
                    StoreError::configuration(format!("Failed to build HTTP client: {}", e))
                })?,
            };
            let mirror_config = RestMirrorConfig {
                base_url: self.config.mirror.base_url.clone(),
                project_id: self.config.mirror.project_id.clone(),
                api_key: self.config.mirror.api_key.clone(),
            };
            Some(Arc::new(RestMirror::new(
                client,
                mirror_config,
                kv.device_id(),
            )))
        } else {
            None
        };

        Ok(TieredPlaceStore::new(primary, mirror, kv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> StoreConfig {
        toml::from_str(
            r#"
[store]
type = "memory"
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_build_memory_store() {
        let store = TieredStoreBuilder::new(memory_config())
            .kv(Arc::new(KvStore::in_memory()))
            .build()
            .unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_build_rejects_unknown_primary() {
        let mut config = memory_config();
        config.store.primary_type = "dynamo".into();
        let result = TieredStoreBuilder::new(config)
            .kv(Arc::new(KvStore::in_memory()))
            .build();
        assert!(matches!(result, Err(StoreError::Configuration { .. })));
    }
}
