//! Transport capability
//!
//! The wire protocol itself lives outside this crate. A transport is anything
//! that can list, read, write and close one remote session; a connector opens
//! transports from a [`ConnectConfig`].
//!
//! Transports are **not** reentrant. The queue worker is the only caller and
//! never issues a second call before the previous one has returned.

use async_trait::async_trait;

use super::config::ConnectConfig;
use super::error::TransferError;
use super::types::RemoteEntry;

/// One open remote session
#[async_trait]
pub trait Transport: Send {
    async fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, TransferError>;

    async fn read(&mut self, path: &str) -> Result<Vec<u8>, TransferError>;

    async fn write(&mut self, path: &str, data: &[u8]) -> Result<(), TransferError>;

    async fn delete(&mut self, path: &str) -> Result<(), TransferError>;

    async fn mkdir(&mut self, path: &str) -> Result<(), TransferError>;

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), TransferError>;

    /// Whether the session is still usable
    fn is_open(&self) -> bool;

    async fn close(&mut self) -> Result<(), TransferError>;
}

/// Opens transports
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Connect and authenticate.
    ///
    /// Bad credentials should map to [`TransferError::AuthenticationFailed`],
    /// unreachable hosts to [`TransferError::ConnectionFailed`].
    async fn open(&self, config: &ConnectConfig) -> Result<Box<dyn Transport>, TransferError>;
}
