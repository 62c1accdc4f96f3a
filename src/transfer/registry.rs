//! Connection Registry
//!
//! Owns every live file-transfer session, keyed by a caller-supplied
//! connection id.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  ConnectionRegistry                          │
//! │  ┌────────────────────────────────────────┐  │
//! │  │  SessionEntry                          │  │
//! │  │  ├── queue: QueueController ──────────────────▶ worker task
//! │  │  ├── config: ConnectConfig             │  │      └── Box<dyn Transport>
//! │  │  └── created_at / last_active          │  │
//! │  └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! At most one entry exists per id. Connecting an id that is already
//! registered tears the old session down first.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use super::config::ConnectConfig;
use super::error::TransferError;
use super::path_utils::validate_remote_path;
use super::queue::{spawn_queue_worker, QueueController};
use super::transport::TransportConnector;
use super::types::{ConnectionInfo, RemoteEntry};

/// Default time allowed for opening a transport
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// One live session
pub struct SessionEntry {
    pub id: String,

    /// Config snapshot taken at connect time
    pub config: ConnectConfig,

    queue: QueueController,

    pub created_at: DateTime<Utc>,

    /// Unix timestamp (seconds) of the last routed operation
    last_active: AtomicI64,
}

impl SessionEntry {
    pub fn queue(&self) -> &QueueController {
        &self.queue
    }

    pub fn is_connected(&self) -> bool {
        self.queue.is_open()
    }

    pub fn update_activity(&self) {
        self.last_active
            .store(Utc::now().timestamp(), Ordering::SeqCst);
    }

    pub fn last_active(&self) -> i64 {
        self.last_active.load(Ordering::SeqCst)
    }

    pub fn to_info(&self) -> ConnectionInfo {
        let last_active = Utc
            .timestamp_opt(self.last_active(), 0)
            .single()
            .unwrap_or(self.created_at);
        ConnectionInfo {
            id: self.id.clone(),
            host: self.config.host.clone(),
            port: self.config.port,
            username: self.config.username.clone(),
            security_mode: self.config.security_mode,
            connected: self.is_connected(),
            created_at: self.created_at.to_rfc3339(),
            last_active: last_active.to_rfc3339(),
        }
    }
}

/// Registry of live sessions
pub struct ConnectionRegistry {
    connections: DashMap<String, Arc<SessionEntry>>,
    connector: Arc<dyn TransportConnector>,
    /// Milliseconds; adjustable while sessions are live
    connect_timeout_ms: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new(connector: Arc<dyn TransportConnector>) -> Self {
        Self::with_connect_timeout(connector, DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(
        connector: Arc<dyn TransportConnector>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            connections: DashMap::new(),
            connector,
            connect_timeout_ms: AtomicU64::new(connect_timeout.as_millis() as u64),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.load(Ordering::SeqCst))
    }

    /// Applies to connects started after the call
    pub fn set_connect_timeout(&self, connect_timeout: Duration) {
        self.connect_timeout_ms
            .store(connect_timeout.as_millis() as u64, Ordering::SeqCst);
        debug!("Connect timeout set to {:?}", connect_timeout);
    }

    /// Open a session for `id`.
    ///
    /// Invalid config fails before anything is touched. An existing session
    /// for `id` is closed first (errors logged). If opening the transport
    /// fails, nothing is stored for `id`.
    pub async fn connect(
        &self,
        id: &str,
        config: ConnectConfig,
    ) -> Result<ConnectionInfo, TransferError> {
        config.validate()?;

        if self.connections.contains_key(id) {
            info!("Connection {} already exists, replacing it", id);
            if let Err(e) = self.disconnect(id).await {
                warn!("Failed to close previous session for {}: {}", id, e);
            }
        }

        info!(
            "Opening connection {} -> {}@{}:{} ({:?})",
            id, config.username, config.host, config.port, config.security_mode
        );

        let connect_timeout = self.connect_timeout();
        let transport =
            match tokio::time::timeout(connect_timeout, self.connector.open(&config)).await {
                Ok(Ok(transport)) => transport,
                Ok(Err(e)) => {
                    warn!("Connection {} failed: {}", id, e);
                    return Err(e);
                }
                Err(_) => {
                    warn!("Connection {} timed out after {:?}", id, connect_timeout);
                    return Err(TransferError::Timeout(format!(
                        "connect to {}:{} timed out after {:?}",
                        config.host, config.port, connect_timeout
                    )));
                }
            };

        let queue = spawn_queue_worker(transport, id.to_string());
        let now = Utc::now();
        let entry = Arc::new(SessionEntry {
            id: id.to_string(),
            config,
            queue,
            created_at: now,
            last_active: AtomicI64::new(now.timestamp()),
        });
        let info = entry.to_info();

        if let Some(stale) = self.connections.insert(id.to_string(), entry) {
            // A concurrent connect for the same id finished first
            warn!("Connection {} was registered concurrently, closing the older one", id);
            if let Err(e) = stale.queue.close().await {
                warn!("Failed to close superseded session for {}: {}", id, e);
            }
        }

        info!("Connection {} established", id);
        Ok(info)
    }

    /// Close and remove the session for `id`. No-op when absent.
    ///
    /// The entry is removed even if closing the transport fails; the close
    /// error is returned for logging.
    pub async fn disconnect(&self, id: &str) -> Result<(), TransferError> {
        let Some((_, entry)) = self.connections.remove(id) else {
            debug!("Disconnect for unknown connection {}, ignoring", id);
            return Ok(());
        };

        let result = entry.queue.close().await;
        info!("Connection {} disconnected and removed", id);
        match result {
            // Worker already gone; nothing left to close
            Err(TransferError::NotConnected(_)) => Ok(()),
            other => other,
        }
    }

    /// Look up a session
    pub fn get(&self, id: &str) -> Result<Arc<SessionEntry>, TransferError> {
        self.connections
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| TransferError::NotConnected(id.to_string()))
    }

    /// Entry exists and its transport reports itself open
    pub fn is_connected(&self, id: &str) -> bool {
        self.connections
            .get(id)
            .map(|e| e.is_connected())
            .unwrap_or(false)
    }

    pub fn active_count(&self) -> usize {
        self.connections.len()
    }

    pub fn info(&self, id: &str) -> Option<ConnectionInfo> {
        self.connections.get(id).map(|e| e.to_info())
    }

    /// All sessions, ordered by id
    pub fn list(&self) -> Vec<ConnectionInfo> {
        let mut infos: Vec<ConnectionInfo> =
            self.connections.iter().map(|e| e.to_info()).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Close every session (called on shutdown).
    ///
    /// A failing close is logged and does not stop the rest.
    pub async fn close_all(&self) {
        let ids: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        info!("Closing {} connections", ids.len());

        for id in ids {
            if let Err(e) = self.disconnect(&id).await {
                warn!("Failed to close connection {}: {}", id, e);
            }
        }

        self.connections.clear();
        info!("All connections closed");
    }

    fn route(&self, id: &str, path: &str) -> Result<Arc<SessionEntry>, TransferError> {
        validate_remote_path(path)?;
        let entry = self.get(id)?;
        entry.update_activity();
        Ok(entry)
    }

    pub async fn list_dir(&self, id: &str, path: &str) -> Result<Vec<RemoteEntry>, TransferError> {
        self.route(id, path)?.queue.list(path).await
    }

    pub async fn read_file(&self, id: &str, path: &str) -> Result<Vec<u8>, TransferError> {
        self.route(id, path)?.queue.read(path).await
    }

    pub async fn write_file(
        &self,
        id: &str,
        path: &str,
        data: Vec<u8>,
    ) -> Result<(), TransferError> {
        self.route(id, path)?.queue.write(path, data).await
    }

    pub async fn delete(&self, id: &str, path: &str) -> Result<(), TransferError> {
        self.route(id, path)?.queue.delete(path).await
    }

    pub async fn mkdir(&self, id: &str, path: &str) -> Result<(), TransferError> {
        self.route(id, path)?.queue.mkdir(path).await
    }

    pub async fn rename(&self, id: &str, from: &str, to: &str) -> Result<(), TransferError> {
        validate_remote_path(to)?;
        self.route(id, from)?.queue.rename(from, to).await
    }
}
