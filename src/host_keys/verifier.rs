//! Host key verification (TOFU)
//!
//! # Flow
//! 1. Caller asks `verify(host, port)` before trusting a session
//! 2. Verifier fetches the host's keys out-of-band and fingerprints the preferred one
//! 3. Returns a [`FingerprintClassification`] (New / Match / Changed / Error)
//! 4. Caller shows a confirmation if needed
//! 5. Caller calls `commit(...)` to trust the key
//!
//! `verify` never writes to the store.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::identity::HostIdentity;
use super::scanner::{scan_output_to_key, KeyFetcher, ScannedKey};
use super::trust_store::{TrustRecord, TrustStore, TrustStoreError};

/// Outcome of a host key check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FingerprintClassification {
    /// No trust record for this host
    New { key: ScannedKey },
    /// Scanned key matches the trusted fingerprint
    Match { key: ScannedKey },
    /// Scanned key differs from the trusted one - possible MITM
    Changed { previous: String, key: ScannedKey },
    /// Scan failed; nothing is known about the host's key
    Error { reason: String },
}

impl FingerprintClassification {
    /// Freshly computed fingerprint, if the scan succeeded
    pub fn fingerprint(&self) -> Option<&str> {
        self.scanned_key().map(|k| k.fingerprint.as_str())
    }

    pub fn scanned_key(&self) -> Option<&ScannedKey> {
        match self {
            Self::New { key } | Self::Match { key } | Self::Changed { key, .. } => Some(key),
            Self::Error { .. } => None,
        }
    }
}

pub struct HostKeyVerifier {
    fetcher: Arc<dyn KeyFetcher>,
    store: Arc<TrustStore>,
}

impl HostKeyVerifier {
    pub fn new(fetcher: Arc<dyn KeyFetcher>, store: Arc<TrustStore>) -> Self {
        Self { fetcher, store }
    }

    pub fn store(&self) -> &Arc<TrustStore> {
        &self.store
    }

    /// Fetch and classify the host's current key
    pub async fn verify(&self, host: &str, port: u16) -> FingerprintClassification {
        let identity = HostIdentity::new(host, port);
        debug!("Verifying host key for {}", identity);

        let output = match self.fetcher.fetch(identity.host(), identity.port()).await {
            Ok(output) => output,
            Err(e) => {
                warn!("Key scan of {} failed: {}", identity, e);
                return FingerprintClassification::Error {
                    reason: e.to_string(),
                };
            }
        };

        let key = match scan_output_to_key(&output) {
            Ok(key) => key,
            Err(e) => {
                warn!("Key scan of {} unusable: {}", identity, e);
                return FingerprintClassification::Error {
                    reason: e.to_string(),
                };
            }
        };

        match self.store.get(&identity) {
            None => {
                info!(
                    "Unknown host {} ({} {})",
                    identity, key.key_type, key.fingerprint
                );
                FingerprintClassification::New { key }
            }
            Some(record) if record.fingerprint == key.fingerprint => {
                debug!("Host key verified for {}", identity);
                FingerprintClassification::Match { key }
            }
            Some(record) => {
                warn!(
                    "HOST KEY CHANGED for {}! Expected {}, got {}",
                    identity, record.fingerprint, key.fingerprint
                );
                FingerprintClassification::Changed {
                    previous: record.fingerprint,
                    key,
                }
            }
        }
    }

    /// Trust a key for `host:port`, replacing any previous record
    pub fn commit(
        &self,
        host: &str,
        port: u16,
        key_type: &str,
        fingerprint: &str,
        full_key: &str,
    ) -> Result<TrustRecord, TrustStoreError> {
        let identity = HostIdentity::new(host, port);
        let record = TrustRecord {
            host: identity.host().to_string(),
            port: identity.port(),
            key_type: key_type.to_string(),
            fingerprint: fingerprint.to_string(),
            full_key: full_key.to_string(),
            added_at: Utc::now(),
        };
        self.store.add(record.clone())?;
        info!("Host key trusted for {} ({})", identity, fingerprint);
        Ok(record)
    }

    /// Drop the trust record for `host:port`
    pub fn forget(&self, host: &str, port: u16) -> Result<bool, TrustStoreError> {
        self.store.remove(&HostIdentity::new(host, port))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::Ordering;

    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::host_keys::scanner::mock::FakeFetcher;

    const KEY_ONE: &str = "example.com ssh-ed25519 a2V5LW9uZQ==\n";
    const KEY_ONE_FP: &str = "SHA256:mzRgQbyaSVdOsmZbKtKgo/n5zOTkL10fJt64ola1lmo";
    const KEY_TWO: &str = "example.com ssh-ed25519 a2V5LXR3bw==\n";
    const KEY_TWO_FP: &str = "SHA256:yN9RRpwwilm/vUij4L3SKMqSLWAyA19e9uStRfRzqfM";

    fn setup(fetcher: FakeFetcher) -> (HostKeyVerifier, Arc<FakeFetcher>, TempDir) {
        let temp = tempdir().unwrap();
        let store = Arc::new(TrustStore::with_path(temp.path().join("known_hosts.json")));
        let fetcher = Arc::new(fetcher);
        (HostKeyVerifier::new(fetcher.clone(), store), fetcher, temp)
    }

    #[tokio::test]
    async fn test_unknown_host_is_new() {
        let (verifier, _, _temp) = setup(FakeFetcher::returning(KEY_ONE));
        match verifier.verify("example.com", 22).await {
            FingerprintClassification::New { key } => {
                assert_eq!(key.fingerprint, KEY_ONE_FP);
                assert_eq!(key.key_type, "ssh-ed25519");
                assert_eq!(key.full_key, "a2V5LW9uZQ==");
            }
            other => panic!("expected New, got {:?}", other),
        }
        // verify never writes
        assert!(verifier.store().is_empty());
    }

    #[tokio::test]
    async fn test_committed_key_matches_repeatedly() {
        let (verifier, _, _temp) = setup(FakeFetcher::returning(KEY_ONE));
        let first = verifier.verify("example.com", 22).await;
        let key = first.scanned_key().unwrap().clone();
        verifier
            .commit("example.com", 22, &key.key_type, &key.fingerprint, &key.full_key)
            .unwrap();

        for _ in 0..2 {
            assert!(matches!(
                verifier.verify("example.com", 22).await,
                FingerprintClassification::Match { .. }
            ));
        }
    }

    #[tokio::test]
    async fn test_changed_key_reports_previous() {
        let (verifier, fetcher, _temp) = setup(FakeFetcher::returning(KEY_TWO));
        verifier
            .commit("example.com", 22, "ssh-ed25519", "SHA256:AAA", "a2V5LW9uZQ==")
            .unwrap();

        match verifier.verify("example.com", 22).await {
            FingerprintClassification::Changed { previous, key } => {
                assert_eq!(previous, "SHA256:AAA");
                assert_eq!(key.fingerprint, KEY_TWO_FP);
            }
            other => panic!("expected Changed, got {:?}", other),
        }

        // Rotation back to a trusted key after re-commit
        verifier
            .commit("example.com", 22, "ssh-ed25519", KEY_ONE_FP, "a2V5LW9uZQ==")
            .unwrap();
        fetcher.set_output(KEY_ONE);
        assert!(matches!(
            verifier.verify("example.com", 22).await,
            FingerprintClassification::Match { .. }
        ));
    }

    #[tokio::test]
    async fn test_ports_use_distinct_identities() {
        let (verifier, _, _temp) = setup(FakeFetcher::returning(KEY_ONE));
        verifier
            .commit("example.com", 22, "ssh-ed25519", KEY_ONE_FP, "a2V5LW9uZQ==")
            .unwrap();

        assert!(matches!(
            verifier.verify("example.com", 22).await,
            FingerprintClassification::Match { .. }
        ));
        assert!(matches!(
            verifier.verify("example.com", 2222).await,
            FingerprintClassification::New { .. }
        ));

        let keys: Vec<String> = verifier
            .store()
            .get_all()
            .iter()
            .map(|r| r.identity().key())
            .collect();
        assert_eq!(keys, vec!["example.com"]);

        verifier
            .commit("example.com", 2222, "ssh-ed25519", KEY_ONE_FP, "a2V5LW9uZQ==")
            .unwrap();
        assert!(verifier
            .store()
            .has(&HostIdentity::new("example.com", 2222)));
        assert_eq!(
            HostIdentity::new("example.com", 2222).key(),
            "[example.com]:2222"
        );
    }

    #[tokio::test]
    async fn test_bad_scan_is_error_and_store_untouched() {
        let (verifier, fetcher, temp) = setup(FakeFetcher::returning(KEY_ONE));
        verifier
            .commit("example.com", 22, "ssh-ed25519", KEY_ONE_FP, "a2V5LW9uZQ==")
            .unwrap();
        let path = temp.path().join("known_hosts.json");
        let before = fs::read(&path).unwrap();

        for output in ["", "# just a comment\n", "example.com ssh-ed25519 !!!!"] {
            fetcher.set_output(output);
            assert!(matches!(
                verifier.verify("example.com", 22).await,
                FingerprintClassification::Error { .. }
            ));
        }

        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(verifier.store().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_error() {
        let (verifier, fetcher, _temp) = setup(FakeFetcher::failing("no route to host"));
        match verifier.verify("example.com", 22).await {
            FingerprintClassification::Error { reason } => {
                assert!(reason.contains("no route to host"))
            }
            other => panic!("expected Error, got {:?}", other),
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert!(verifier.store().is_empty());
    }

    #[tokio::test]
    async fn test_forget() {
        let (verifier, _, _temp) = setup(FakeFetcher::returning(KEY_ONE));
        verifier
            .commit("example.com", 22, "ssh-ed25519", KEY_ONE_FP, "a2V5LW9uZQ==")
            .unwrap();
        assert!(verifier.forget("EXAMPLE.com", 22).unwrap());
        assert!(matches!(
            verifier.verify("example.com", 22).await,
            FingerprintClassification::New { .. }
        ));
    }

    #[test]
    fn test_classification_serializes_tagged() {
        let json = serde_json::to_value(FingerprintClassification::Error {
            reason: "timeout".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"status": "error", "reason": "timeout"}));
    }
}
