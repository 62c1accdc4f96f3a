//! Settings types

use serde::{Deserialize, Serialize};

/// Current settings file version
pub const CONFIG_VERSION: u32 = 1;

fn default_version() -> u32 {
    CONFIG_VERSION
}

/// Persisted application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub connection: ConnectionSettings,

    #[serde(default)]
    pub key_scan: KeyScanSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            connection: ConnectionSettings::default(),
            key_scan: KeyScanSettings::default(),
        }
    }
}

impl AppSettings {
    /// Reject values the registry or the scanner cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.connection.connect_timeout_secs == 0 {
            return Err("connection.connectTimeoutSecs must be at least 1".to_string());
        }
        let scan = &self.key_scan;
        if scan.program.trim().is_empty() {
            return Err("keyScan.program is empty".to_string());
        }
        if scan.attempt_timeout_secs == 0 {
            return Err("keyScan.attemptTimeoutSecs must be at least 1".to_string());
        }
        if scan.hard_timeout_secs < scan.attempt_timeout_secs {
            return Err(format!(
                "keyScan.hardTimeoutSecs ({}) is shorter than attemptTimeoutSecs ({})",
                scan.hard_timeout_secs, scan.attempt_timeout_secs
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSettings {
    /// Time allowed for opening a transport
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyScanSettings {
    /// Scanner executable, looked up on PATH when not absolute
    #[serde(default = "default_scan_program")]
    pub program: String,

    /// Per-attempt timeout handed to the scanner
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// Hard limit after which the scanner process is killed
    #[serde(default = "default_hard_timeout_secs")]
    pub hard_timeout_secs: u64,
}

fn default_scan_program() -> String {
    "ssh-keyscan".to_string()
}

fn default_attempt_timeout_secs() -> u64 {
    5
}

fn default_hard_timeout_secs() -> u64 {
    10
}

impl Default for KeyScanSettings {
    fn default() -> Self {
        Self {
            program: default_scan_program(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            hard_timeout_secs: default_hard_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"keyScan": {"hardTimeoutSecs": 20}}"#).unwrap();
        assert_eq!(settings.version, CONFIG_VERSION);
        assert_eq!(settings.key_scan.hard_timeout_secs, 20);
        assert_eq!(settings.key_scan.attempt_timeout_secs, 5);
        assert_eq!(settings.key_scan.program, "ssh-keyscan");
        assert_eq!(settings.connection.connect_timeout_secs, 30);
    }

    #[test]
    fn test_validate() {
        assert!(AppSettings::default().validate().is_ok());

        let mut settings = AppSettings::default();
        settings.connection.connect_timeout_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = AppSettings::default();
        settings.key_scan.program = "  ".to_string();
        assert!(settings.validate().is_err());

        let mut settings = AppSettings::default();
        settings.key_scan.hard_timeout_secs = 2;
        let err = settings.validate().unwrap_err();
        assert!(err.contains("hardTimeoutSecs (2)"));
    }
}
