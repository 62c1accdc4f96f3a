//! Host key verification
//!
//! TOFU (Trust On First Use): a host's key is accepted on explicit request the
//! first time and compared with the recorded fingerprint on every later check.

mod fingerprint;
mod identity;
pub mod scanner;
pub mod trust_store;
mod verifier;

pub use fingerprint::{fingerprint, fingerprint_from_b64};
pub use identity::{HostIdentity, DEFAULT_SSH_PORT};
pub use scanner::{
    parse_key_lines, scan_output_to_key, select_preferred_key, KeyFetcher, KeyLine,
    KeyscanFetcher, ScanError, ScannedKey,
};
pub use trust_store::{TrustRecord, TrustStore, TrustStoreError};
pub use verifier::{FingerprintClassification, HostKeyVerifier};
