//! Host identity normalization

use std::fmt;

use serde::{Deserialize, Serialize};

/// Port whose identities fold to the bare host name
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Normalized `(host, port)` pair naming one endpoint's key material.
///
/// Renders as `host` on the default port and `[host]:port` otherwise, the
/// same keys OpenSSH writes to known_hosts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostIdentity {
    host: String,
    port: u16,
}

impl HostIdentity {
    pub fn new(host: &str, port: u16) -> Self {
        let host = host.trim();
        // Accept an already bracketed IPv6 literal
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        Self {
            host: host.to_lowercase(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Store lookup key
    pub fn key(&self) -> String {
        if self.port == DEFAULT_SSH_PORT {
            self.host.clone()
        } else {
            format!("[{}]:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for HostIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_key() {
        assert_eq!(HostIdentity::new("example.com", 22).key(), "example.com");
        assert_eq!(
            HostIdentity::new("example.com", 2222).key(),
            "[example.com]:2222"
        );
    }

    #[test]
    fn test_normalization() {
        assert_eq!(
            HostIdentity::new("  Example.COM ", 22),
            HostIdentity::new("example.com", 22)
        );
        assert_eq!(HostIdentity::new("[::1]", 2222).key(), "[::1]:2222");
        assert_eq!(HostIdentity::new("::1", 22).key(), "::1");
        assert_ne!(
            HostIdentity::new("example.com", 22),
            HostIdentity::new("example.com", 2222)
        );
    }
}
