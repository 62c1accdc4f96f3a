//! Transfer error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Invalid connection config: {0}")]
    InvalidConfig(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl TransferError {
    /// True for failures of the connect attempt itself (bad parameters or credentials)
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            TransferError::InvalidConfig(_) | TransferError::AuthenticationFailed(_)
        )
    }
}

// Commands hand errors back as plain strings
impl serde::Serialize for TransferError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
