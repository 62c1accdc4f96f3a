//! Application context
//!
//! Owns the connection registry, the trust store, the verifier and the
//! current settings. Built once at startup and passed by reference into every
//! command; there are no global singletons.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::info;

use crate::config::{AppSettings, ConfigStorage, StorageError, CONFIG_VERSION};
use crate::host_keys::{HostKeyVerifier, KeyFetcher, KeyscanFetcher, TrustStore};
use crate::transfer::{ConnectionRegistry, TransportConnector};

pub struct AppContext {
    registry: ConnectionRegistry,
    verifier: HostKeyVerifier,
    settings: RwLock<AppSettings>,
    /// Where settings updates are written; `None` keeps them in memory
    storage: Option<ConfigStorage>,
    /// Set when the default scanner is in use, so settings updates reach it
    keyscan: Option<Arc<KeyscanFetcher>>,
    /// Serializes save + apply so file and memory agree on the last update
    update_lock: tokio::sync::Mutex<()>,
}

impl AppContext {
    /// Load settings from the default location and build the context
    pub async fn load(connector: Arc<dyn TransportConnector>) -> Result<Self, StorageError> {
        let storage = ConfigStorage::new()?;
        let settings = storage.load().await?;
        Ok(Self::new(connector, settings)?.with_storage(storage))
    }

    /// Build with the default trust store and the `ssh-keyscan` fetcher
    pub fn new(
        connector: Arc<dyn TransportConnector>,
        settings: AppSettings,
    ) -> Result<Self, StorageError> {
        let store = Arc::new(TrustStore::open_default()?);
        let keyscan = Arc::new(KeyscanFetcher::from_settings(&settings.key_scan));
        let mut ctx = Self::with_parts(connector, store, keyscan.clone(), settings);
        ctx.keyscan = Some(keyscan);
        Ok(ctx)
    }

    /// Build from explicit parts (for testing)
    pub fn with_parts(
        connector: Arc<dyn TransportConnector>,
        store: Arc<TrustStore>,
        fetcher: Arc<dyn KeyFetcher>,
        settings: AppSettings,
    ) -> Self {
        let registry = ConnectionRegistry::with_connect_timeout(
            connector,
            Duration::from_secs(settings.connection.connect_timeout_secs),
        );
        Self {
            registry,
            verifier: HostKeyVerifier::new(fetcher, store),
            settings: RwLock::new(settings),
            storage: None,
            keyscan: None,
            update_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Persist settings updates to `storage`
    pub fn with_storage(mut self, storage: ConfigStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn verifier(&self) -> &HostKeyVerifier {
        &self.verifier
    }

    pub fn trust_store(&self) -> &Arc<TrustStore> {
        self.verifier.store()
    }

    /// Snapshot of the current settings
    pub fn settings(&self) -> AppSettings {
        self.settings.read().clone()
    }

    /// Validate, persist and apply new settings.
    ///
    /// Nothing changes if validation or the save fails. Connects and key
    /// scans already running keep the limits they started with.
    pub async fn update_settings(&self, mut settings: AppSettings) -> Result<AppSettings, StorageError> {
        settings.version = CONFIG_VERSION;
        settings.validate().map_err(StorageError::Invalid)?;

        let _guard = self.update_lock.lock().await;
        if let Some(storage) = &self.storage {
            storage.save(&settings).await?;
        }

        self.registry.set_connect_timeout(Duration::from_secs(
            settings.connection.connect_timeout_secs,
        ));
        if let Some(keyscan) = &self.keyscan {
            keyscan.configure(&settings.key_scan);
        }
        *self.settings.write() = settings.clone();

        info!("Settings updated");
        Ok(settings)
    }

    /// Close every connection (on app exit)
    pub async fn shutdown(&self) {
        info!("Shutting down, closing all connections...");
        self.registry.close_all().await;
    }
}
