//! Configuration Management Module
//!
//! Settings persistence and the per-user config directory layout.

pub mod storage;
pub mod types;

pub use storage::{config_dir, known_hosts_file, settings_file, ConfigStorage, StorageError};
pub use types::{AppSettings, ConnectionSettings, KeyScanSettings, CONFIG_VERSION};
