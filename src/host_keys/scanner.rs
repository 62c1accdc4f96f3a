//! Out-of-band host key fetching
//!
//! The verifier never talks to the network itself. It asks a [`KeyFetcher`]
//! for the host's key lines; the production fetcher shells out to
//! `ssh-keyscan`.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use super::fingerprint::fingerprint_from_b64;
use crate::config::KeyScanSettings;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid host: {0}")]
    InvalidHost(String),

    #[error("Failed to start key scanner: {0}")]
    Spawn(String),

    #[error("Key scan timed out after {0:?}")]
    Timeout(Duration),

    #[error("Key scanner exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Key scanner returned no output")]
    EmptyOutput,

    #[error("No host keys found in scanner output")]
    NoKeys,

    #[error("Unparsable {key_type} key: {reason}")]
    InvalidKey { key_type: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability: fetch a host's public key lines.
///
/// Returns raw `host keytype base64key` text, one key per line.
#[async_trait]
pub trait KeyFetcher: Send + Sync {
    async fn fetch(&self, host: &str, port: u16) -> Result<String, ScanError>;
}

/// Fetcher backed by the `ssh-keyscan` tool
///
/// Limits can be swapped while the fetcher is shared; a scan already running
/// keeps the limits it started with.
#[derive(Debug)]
pub struct KeyscanFetcher {
    limits: RwLock<ScanLimits>,
}

#[derive(Debug, Clone)]
struct ScanLimits {
    program: PathBuf,
    /// Passed to the tool as `-T`
    attempt_timeout: Duration,
    /// Wall clock limit; the process is killed when it expires
    hard_timeout: Duration,
}

impl From<&KeyScanSettings> for ScanLimits {
    fn from(settings: &KeyScanSettings) -> Self {
        Self {
            program: PathBuf::from(&settings.program),
            attempt_timeout: Duration::from_secs(settings.attempt_timeout_secs),
            hard_timeout: Duration::from_secs(settings.hard_timeout_secs),
        }
    }
}

impl KeyscanFetcher {
    pub fn new(program: impl Into<PathBuf>, attempt_timeout: Duration, hard_timeout: Duration) -> Self {
        Self {
            limits: RwLock::new(ScanLimits {
                program: program.into(),
                attempt_timeout,
                hard_timeout,
            }),
        }
    }

    pub fn from_settings(settings: &KeyScanSettings) -> Self {
        Self {
            limits: RwLock::new(ScanLimits::from(settings)),
        }
    }

    /// Replace program and timeouts
    pub fn configure(&self, settings: &KeyScanSettings) {
        *self.limits.write() = ScanLimits::from(settings);
        debug!("Key scan limits updated: {:?}", settings);
    }

    pub fn hard_timeout(&self) -> Duration {
        self.limits.read().hard_timeout
    }
}

#[async_trait]
impl KeyFetcher for KeyscanFetcher {
    async fn fetch(&self, host: &str, port: u16) -> Result<String, ScanError> {
        // Would be parsed as an option by the tool
        if host.is_empty() || host.starts_with('-') {
            return Err(ScanError::InvalidHost(host.to_string()));
        }

        let limits = self.limits.read().clone();
        debug!(
            "Running {} for {}:{}",
            limits.program.display(),
            host,
            port
        );

        let child = Command::new(&limits.program)
            .arg("-p")
            .arg(port.to_string())
            .arg("-T")
            .arg(limits.attempt_timeout.as_secs().max(1).to_string())
            .arg(host)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ScanError::Spawn(format!("{}: {}", limits.program.display(), e)))?;

        // On timeout the child is dropped, and kill_on_drop terminates it
        let output = match tokio::time::timeout(limits.hard_timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "Key scan of {}:{} exceeded {:?}, killed",
                    host, port, limits.hard_timeout
                );
                return Err(ScanError::Timeout(limits.hard_timeout));
            }
        };

        if !output.status.success() {
            return Err(ScanError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if stdout.trim().is_empty() {
            return Err(ScanError::EmptyOutput);
        }
        Ok(stdout)
    }
}

/// One `host keytype base64key` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLine {
    pub key_type: String,
    pub key_b64: String,
}

/// Key chosen from a scan, with its fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedKey {
    pub key_type: String,
    /// e.g. "SHA256:abc123..."
    pub fingerprint: String,
    /// base64 key blob
    pub full_key: String,
}

/// Parse scanner output, skipping blank lines, comments and short records
pub fn parse_key_lines(output: &str) -> Vec<KeyLine> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let _host = parts.next()?;
            let key_type = parts.next()?;
            let key_b64 = parts.next()?;
            Some(KeyLine {
                key_type: key_type.to_string(),
                key_b64: key_b64.to_string(),
            })
        })
        .collect()
}

/// Pick one key: ed25519, then any ecdsa-*, then rsa, else the first one seen
pub fn select_preferred_key(keys: &[KeyLine]) -> Option<&KeyLine> {
    keys.iter()
        .find(|k| k.key_type.contains("ed25519"))
        .or_else(|| keys.iter().find(|k| k.key_type.starts_with("ecdsa-")))
        .or_else(|| keys.iter().find(|k| k.key_type.contains("rsa")))
        .or_else(|| keys.first())
}

/// Parse output, select the preferred key and fingerprint it
pub fn scan_output_to_key(output: &str) -> Result<ScannedKey, ScanError> {
    if output.trim().is_empty() {
        return Err(ScanError::EmptyOutput);
    }
    let keys = parse_key_lines(output);
    let chosen = select_preferred_key(&keys).ok_or(ScanError::NoKeys)?;
    let fingerprint =
        fingerprint_from_b64(&chosen.key_b64).map_err(|e| ScanError::InvalidKey {
            key_type: chosen.key_type.clone(),
            reason: e.to_string(),
        })?;
    Ok(ScannedKey {
        key_type: chosen.key_type.clone(),
        fingerprint,
        full_key: chosen.key_b64.clone(),
    })
}
