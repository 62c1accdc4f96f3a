//! Remote path helpers
//!
//! Remote paths always use `/` as separator, whatever the local OS.

use super::error::TransferError;

/// Final component of a remote path (`/srv/data/a.txt` -> `a.txt`).
pub fn remote_file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Reject paths that cannot be sent to the remote side.
///
/// Line-oriented protocols treat CR/LF as a command terminator, so a path
/// containing one would inject a second command into the session stream.
pub fn validate_remote_path(path: &str) -> Result<(), TransferError> {
    if path.is_empty() {
        return Err(TransferError::InvalidConfig("remote path is empty".to_string()));
    }
    if path.contains(['\r', '\n', '\0']) {
        return Err(TransferError::InvalidConfig(format!(
            "remote path contains control characters: {:?}",
            path
        )));
    }
    Ok(())
}
