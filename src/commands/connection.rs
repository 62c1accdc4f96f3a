//! Transfer Connection Commands
//!
//! # Commands
//!
//! - `transfer_connect` - open (or replace) the session for a connection id
//! - `transfer_disconnect` - close a session
//! - `transfer_is_connected` / `transfer_active_count` / `transfer_list_connections`
//! - `transfer_list_dir`, `transfer_read_file`, `transfer_write_file`,
//!   `transfer_delete`, `transfer_mkdir`, `transfer_rename` - queued file operations

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use tracing::{info, warn};

use crate::context::AppContext;
use crate::transfer::{ConnectConfig, ConnectionInfo, RemoteEntry, SecurityMode};

/// Connect request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub connection_id: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    #[serde(default)]
    pub security_mode: SecurityMode,
}

impl ConnectRequest {
    /// Split into the connection id and its config
    pub fn into_parts(self) -> (String, ConnectConfig) {
        let config = ConnectConfig {
            host: self.host,
            port: self.port,
            username: self.username,
            password: self.password,
            security_mode: self.security_mode,
        };
        (self.connection_id, config)
    }
}

pub async fn transfer_connect(
    ctx: &AppContext,
    request: ConnectRequest,
) -> Result<ConnectionInfo, String> {
    info!(
        "Connect request {}: {}@{}:{}",
        request.connection_id, request.username, request.host, request.port
    );
    let (id, config) = request.into_parts();
    ctx.registry()
        .connect(&id, config)
        .await
        .map_err(|e| e.to_string())
}

pub async fn transfer_disconnect(ctx: &AppContext, connection_id: &str) -> Result<(), String> {
    if let Err(e) = ctx.registry().disconnect(connection_id).await {
        // Session is gone either way
        warn!("Disconnect of {} reported: {}", connection_id, e);
    }
    Ok(())
}

pub fn transfer_is_connected(ctx: &AppContext, connection_id: &str) -> Result<bool, String> {
    Ok(ctx.registry().is_connected(connection_id))
}

pub fn transfer_active_count(ctx: &AppContext) -> Result<usize, String> {
    Ok(ctx.registry().active_count())
}

pub fn transfer_list_connections(ctx: &AppContext) -> Result<Vec<ConnectionInfo>, String> {
    Ok(ctx.registry().list())
}

pub async fn transfer_list_dir(
    ctx: &AppContext,
    connection_id: &str,
    path: &str,
) -> Result<Vec<RemoteEntry>, String> {
    ctx.registry()
        .list_dir(connection_id, path)
        .await
        .map_err(|e| e.to_string())
}

/// Returns the file content base64-encoded
pub async fn transfer_read_file(
    ctx: &AppContext,
    connection_id: &str,
    path: &str,
) -> Result<String, String> {
    let data = ctx
        .registry()
        .read_file(connection_id, path)
        .await
        .map_err(|e| e.to_string())?;
    Ok(BASE64.encode(data))
}

/// `content_b64` is the base64-encoded file content
pub async fn transfer_write_file(
    ctx: &AppContext,
    connection_id: &str,
    path: &str,
    content_b64: &str,
) -> Result<(), String> {
    let data = BASE64
        .decode(content_b64)
        .map_err(|e| format!("Invalid base64 content: {}", e))?;
    ctx.registry()
        .write_file(connection_id, path, data)
        .await
        .map_err(|e| e.to_string())
}

pub async fn transfer_delete(ctx: &AppContext, connection_id: &str, path: &str) -> Result<(), String> {
    ctx.registry()
        .delete(connection_id, path)
        .await
        .map_err(|e| e.to_string())
}

pub async fn transfer_mkdir(ctx: &AppContext, connection_id: &str, path: &str) -> Result<(), String> {
    ctx.registry()
        .mkdir(connection_id, path)
        .await
        .map_err(|e| e.to_string())
}

pub async fn transfer_rename(
    ctx: &AppContext,
    connection_id: &str,
    from: &str,
    to: &str,
) -> Result<(), String> {
    ctx.registry()
        .rename(connection_id, from, to)
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::tempdir;

    use super::*;
    use crate::config::AppSettings;
    use crate::host_keys::scanner::mock::FakeFetcher;
    use crate::host_keys::TrustStore;
    use crate::transfer::transport::mock::MockConnector;

    fn context() -> (AppContext, tempfile::TempDir) {
        let temp = tempdir().unwrap();
        let store = Arc::new(TrustStore::with_path(temp.path().join("kh.json")));
        let ctx = AppContext::with_parts(
            Arc::new(MockConnector::new()),
            store,
            Arc::new(FakeFetcher::failing("unused")),
            AppSettings::default(),
        );
        (ctx, temp)
    }

    fn request(id: &str, host: &str) -> ConnectRequest {
        serde_json::from_value(serde_json::json!({
            "connectionId": id,
            "host": host,
            "port": 990,
            "username": "alice",
            "password": "pw",
            "securityMode": "implicit_secure"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_connect_roundtrip_through_commands() {
        let (ctx, _temp) = context();
        let info = transfer_connect(&ctx, request("c1", "files.test")).await.unwrap();
        assert_eq!(info.security_mode, SecurityMode::ImplicitSecure);
        assert!(transfer_is_connected(&ctx, "c1").unwrap());

        transfer_write_file(&ctx, "c1", "/docs/a.txt", &BASE64.encode(b"hello"))
            .await
            .unwrap();
        let content = transfer_read_file(&ctx, "c1", "/docs/a.txt").await.unwrap();
        assert_eq!(BASE64.decode(content).unwrap(), b"hello");
        assert_eq!(transfer_list_dir(&ctx, "c1", "/docs").await.unwrap().len(), 1);

        transfer_disconnect(&ctx, "c1").await.unwrap();
        assert_eq!(transfer_active_count(&ctx).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_errors_are_plain_strings() {
        let (ctx, _temp) = context();
        let err = transfer_list_dir(&ctx, "missing", "/").await.unwrap_err();
        assert_eq!(err, "Not connected: missing");

        let err = transfer_connect(&ctx, request("c1", "unreachable.test"))
            .await
            .unwrap_err();
        assert!(err.starts_with("Connection failed"));

        transfer_connect(&ctx, request("c1", "files.test")).await.unwrap();
        let err = transfer_write_file(&ctx, "c1", "/a", "***").await.unwrap_err();
        assert!(err.starts_with("Invalid base64 content"));
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let (ctx, _temp) = context();
        transfer_connect(&ctx, request("a", "files.test")).await.unwrap();
        transfer_connect(&ctx, request("b", "files.test")).await.unwrap();
        assert_eq!(transfer_list_connections(&ctx).unwrap().len(), 2);

        ctx.shutdown().await;
        assert_eq!(transfer_active_count(&ctx).unwrap(), 0);
    }
}
