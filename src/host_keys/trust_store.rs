//! Trusted host key store
//!
//! One JSON object keyed by host identity, loaded whole at construction and
//! rewritten whole (temp file + rename) on every mutation.
//!
//! ```json
//! {
//!   "[files.example.com]:2222": {
//!     "host": "files.example.com",
//!     "port": 2222,
//!     "keyType": "ssh-ed25519",
//!     "fingerprint": "SHA256:...",
//!     "fullKey": "AAAAC3NzaC1lZDI1NTE5...",
//!     "addedAt": "2026-01-01T00:00:00Z"
//!   }
//! }
//! ```
//!
//! A single owning process is assumed; concurrent writers from other
//! processes can lose updates.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::identity::HostIdentity;
use crate::config::{known_hosts_file, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum TrustStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl serde::Serialize for TrustStoreError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Last trusted key of one host identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustRecord {
    pub host: String,
    pub port: u16,
    pub key_type: String,
    pub fingerprint: String,
    pub full_key: String,
    pub added_at: DateTime<Utc>,
}

impl TrustRecord {
    pub fn identity(&self) -> HostIdentity {
        HostIdentity::new(&self.host, self.port)
    }
}

pub struct TrustStore {
    /// identity key -> record
    records: RwLock<BTreeMap<String, TrustRecord>>,
    path: PathBuf,
}

impl TrustStore {
    /// Open the store at the default per-user location
    pub fn open_default() -> Result<Self, StorageError> {
        Ok(Self::with_path(known_hosts_file()?))
    }

    /// Open the store at a custom path (for testing)
    pub fn with_path(path: PathBuf) -> Self {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("Failed to create trust store directory {:?}: {}", parent, e);
            }
        }

        let records = Self::load(&path);
        info!("Loaded {} trusted host keys from {:?}", records.len(), path);

        Self {
            records: RwLock::new(records),
            path,
        }
    }

    /// Read the file; anything unreadable counts as an empty store
    fn load(path: &Path) -> BTreeMap<String, TrustRecord> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Trust store {:?} not found, starting empty", path);
                return BTreeMap::new();
            }
            Err(e) => {
                error!("Failed to read trust store {:?}: {}", path, e);
                return BTreeMap::new();
            }
        };

        match serde_json::from_str::<BTreeMap<String, TrustRecord>>(&contents) {
            Ok(records) => records,
            Err(e) => {
                warn!("Trust store {:?} corrupted: {}", path, e);
                let backup = path.with_extension(format!(
                    "json.backup.{}",
                    Utc::now().format("%Y%m%d_%H%M%S")
                ));
                match fs::copy(path, &backup) {
                    Ok(_) => warn!("Corrupted trust store backed up to {:?}", backup),
                    Err(e) => error!("Failed to backup corrupted trust store: {}", e),
                }
                BTreeMap::new()
            }
        }
    }

    /// Write the whole map: temp file, fsync, rename
    fn persist(&self, records: &BTreeMap<String, TrustRecord>) -> Result<(), TrustStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(records)?;

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path)?;

        debug!("Trust store saved ({} records)", records.len());
        Ok(())
    }

    /// Persist while still holding the write lock, so file order matches memory order.
    /// On failure the in-memory change stays.
    fn persist_logged(&self, records: &BTreeMap<String, TrustRecord>) -> Result<(), TrustStoreError> {
        self.persist(records).map_err(|e| {
            error!("Failed to save trust store {:?}: {}", self.path, e);
            e
        })
    }

    /// Insert or replace the record for its identity
    pub fn add(&self, record: TrustRecord) -> Result<(), TrustStoreError> {
        let key = record.identity().key();
        let mut records = self.records.write();
        if let Some(previous) = records.insert(key.clone(), record) {
            info!(
                "Replaced trusted key for {} (was {})",
                key, previous.fingerprint
            );
        } else {
            info!("Added trusted key for {}", key);
        }
        self.persist_logged(&records)
    }

    pub fn get(&self, identity: &HostIdentity) -> Option<TrustRecord> {
        self.records.read().get(&identity.key()).cloned()
    }

    pub fn has(&self, identity: &HostIdentity) -> bool {
        self.records.read().contains_key(&identity.key())
    }

    /// All records, ordered by identity key
    pub fn get_all(&self) -> Vec<TrustRecord> {
        self.records.read().values().cloned().collect()
    }

    /// Remove a host (for key rotation). Returns whether a record existed.
    pub fn remove(&self, identity: &HostIdentity) -> Result<bool, TrustStoreError> {
        let mut records = self.records.write();
        let existed = records.remove(&identity.key()).is_some();
        if existed {
            info!("Removed trusted key for {}", identity);
        }
        self.persist_logged(&records)?;
        Ok(existed)
    }

    pub fn clear(&self) -> Result<(), TrustStoreError> {
        let mut records = self.records.write();
        records.clear();
        info!("Cleared all trusted host keys");
        self.persist_logged(&records)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(host: &str, port: u16, fingerprint: &str) -> TrustRecord {
        TrustRecord {
            host: host.to_string(),
            port,
            key_type: "ssh-ed25519".to_string(),
            fingerprint: fingerprint.to_string(),
            full_key: "ZWQta2V5".to_string(),
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_missing_file_creates_dir_and_starts_empty() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("known_hosts.json");
        let store = TrustStore::with_path(path.clone());
        assert!(store.is_empty());
        assert!(path.parent().unwrap().is_dir());
        assert!(!path.exists());
    }

    #[test]
    fn test_add_persists_and_reloads() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("known_hosts.json");

        let store = TrustStore::with_path(path.clone());
        store.add(record("example.com", 22, "SHA256:AAA")).unwrap();
        store.add(record("example.com", 2222, "SHA256:BBB")).unwrap();

        let reloaded = TrustStore::with_path(path.clone());
        assert_eq!(reloaded.len(), 2);
        let id = HostIdentity::new("example.com", 2222);
        assert_eq!(reloaded.get(&id).unwrap().fingerprint, "SHA256:BBB");

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.get("example.com").is_some());
        assert_eq!(
            raw["[example.com]:2222"]["keyType"],
            serde_json::json!("ssh-ed25519")
        );
        assert!(raw["[example.com]:2222"]["addedAt"].is_string());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_add_replaces_same_identity() {
        let temp = tempdir().unwrap();
        let store = TrustStore::with_path(temp.path().join("kh.json"));
        store.add(record("Example.com", 22, "SHA256:AAA")).unwrap();
        store.add(record("example.com", 22, "SHA256:CCC")).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(
            store
                .get(&HostIdentity::new("example.com", 22))
                .unwrap()
                .fingerprint,
            "SHA256:CCC"
        );
    }

    #[test]
    fn test_remove_and_clear() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("kh.json");
        let store = TrustStore::with_path(path.clone());
        store.add(record("a.test", 22, "SHA256:A")).unwrap();
        store.add(record("b.test", 22, "SHA256:B")).unwrap();

        let a = HostIdentity::new("a.test", 22);
        assert!(store.remove(&a).unwrap());
        assert!(!store.remove(&a).unwrap());
        assert!(!store.has(&a));
        assert_eq!(TrustStore::with_path(path.clone()).len(), 1);

        store.clear().unwrap();
        assert!(store.is_empty());
        assert!(TrustStore::with_path(path).is_empty());
    }

    #[test]
    fn test_corrupt_file_loads_empty_with_backup() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("kh.json");
        fs::write(&path, "{ not json").unwrap();

        let store = TrustStore::with_path(path.clone());
        assert!(store.is_empty());

        let backups = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("backup"))
            .count();
        assert_eq!(backups, 1);

        // Still usable
        store.add(record("a.test", 22, "SHA256:A")).unwrap();
        assert_eq!(TrustStore::with_path(path).len(), 1);
    }

    #[test]
    fn test_failed_save_keeps_memory_state() {
        let temp = tempdir().unwrap();
        // The target path is a directory, so the final rename fails
        let path = temp.path().join("kh.json");
        fs::create_dir(&path).unwrap();

        let store = TrustStore::with_path(path);
        assert!(store.add(record("a.test", 22, "SHA256:A")).is_err());
        assert!(store.has(&HostIdentity::new("a.test", 22)));
    }
}
