//! Commands module
//!
//! Entry points exposed to the frontend. Each takes the [`AppContext`](crate::context::AppContext)
//! and returns `Result<_, String>` so errors cross the boundary as plain messages.

pub mod connection;
pub mod host_keys;
pub mod settings;

pub use connection::*;
pub use host_keys::*;
pub use settings::*;
