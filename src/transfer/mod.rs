//! File-transfer sessions
//!
//! Serializes access to stateful remote sessions so overlapping requests
//! never interleave on one protocol stream.
//!
//! # Features
//! - Connection registry keyed by caller-supplied ids (see `registry`)
//! - One queue worker per connection, strict FIFO (see `queue`)
//! - Pluggable transports behind the `Transport` / `TransportConnector` traits

mod config;
mod error;
pub mod path_utils;
pub mod queue;
pub mod registry;
pub mod transport;
mod types;

pub use config::{ConnectConfig, SecurityMode};
pub use error::TransferError;
pub use queue::{spawn_queue_worker, PendingOp, QueueCommand, QueueController};
pub use registry::{ConnectionRegistry, SessionEntry, DEFAULT_CONNECT_TIMEOUT};
pub use transport::{Transport, TransportConnector};
pub use types::{ConnectionInfo, FileType, RemoteEntry};
