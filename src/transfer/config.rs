//! Connection configuration

use serde::{Deserialize, Serialize};

use super::error::TransferError;

/// Transport security for a file-transfer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    /// Cleartext control and data channels
    #[default]
    Plain,
    /// TLS from the first byte
    ImplicitSecure,
}

/// Parameters for opening one remote session.
///
/// A snapshot of this struct is stored with the session and never mutated.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub security_mode: SecurityMode,
}

impl ConnectConfig {
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: None,
            security_mode: SecurityMode::Plain,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_security_mode(mut self, mode: SecurityMode) -> Self {
        self.security_mode = mode;
        self
    }

    /// Reject parameters no transport could connect with
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.host.trim().is_empty() {
            return Err(TransferError::InvalidConfig("host is empty".to_string()));
        }
        if self.port == 0 {
            return Err(TransferError::InvalidConfig("port must be non-zero".to_string()));
        }
        if self.username.trim().is_empty() {
            return Err(TransferError::InvalidConfig("username is empty".to_string()));
        }
        Ok(())
    }
}

// Keep the password out of logs
impl std::fmt::Debug for ConnectConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("security_mode", &self.security_mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(ConnectConfig::new("ftp.example.com", 21, "alice").validate().is_ok());

        let err = ConnectConfig::new("  ", 21, "alice").validate().unwrap_err();
        assert!(err.is_configuration_error());
        assert!(ConnectConfig::new("h", 0, "alice").validate().is_err());
        assert!(ConnectConfig::new("h", 21, "").validate().is_err());
    }

    #[test]
    fn test_deserialize_contract() {
        let json = r#"{
            "host": "files.example.com",
            "port": 990,
            "username": "bob",
            "password": "secret",
            "securityMode": "implicit_secure"
        }"#;
        let config: ConnectConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.security_mode, SecurityMode::ImplicitSecure);
        assert_eq!(config.password.as_deref(), Some("secret"));

        // Password optional, mode defaults to plain
        let config: ConnectConfig =
            serde_json::from_str(r#"{"host":"h","port":21,"username":"u"}"#).unwrap();
        assert_eq!(config.security_mode, SecurityMode::Plain);
        assert!(config.password.is_none());
    }

    #[test]
    fn test_debug_hides_password() {
        let config = ConnectConfig::new("h", 21, "u").with_password("hunter2");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }
}
