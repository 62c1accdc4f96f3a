//! Transfer data types

use serde::{Deserialize, Serialize};

use super::config::SecurityMode;

/// One entry of a remote directory listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    /// File name (not full path)
    pub name: String,
    /// Full path
    pub path: String,
    pub file_type: FileType,
    /// Size in bytes
    pub size: u64,
    /// Last modified time (Unix timestamp), when the server reports one
    pub modified: Option<i64>,
    /// Permissions as reported by the server (e.g. "rwxr-xr-x")
    pub permissions: Option<String>,
}

/// File type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    File,
    Directory,
    Symlink,
    Unknown,
}

/// Snapshot of one registered connection
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub security_mode: SecurityMode,
    /// Transport currently reports itself open
    pub connected: bool,
    pub created_at: String,
    pub last_active: String,
}
