//! RemoteGuard - connection management for remote file transfer
//!
//! Two halves:
//! - [`transfer`]: one serialized operation queue per connection, held in a
//!   registry keyed by caller-chosen ids
//! - [`host_keys`]: trust-on-first-use checks of SSH host keys fetched with
//!   `ssh-keyscan`, persisted to a JSON trust store

pub mod commands;
pub mod config;
pub mod context;
pub mod host_keys;
pub mod transfer;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use context::AppContext;

/// Initialize logging
///
/// Honors `RUST_LOG`, defaults to `info`. Calling it twice is a no-op.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
