//! Key fingerprints

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};

/// Compute SHA256 fingerprint of raw public key bytes
pub fn fingerprint(key_bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key_bytes);
    let hash = hasher.finalize();
    format!("SHA256:{}", BASE64.encode(hash).trim_end_matches('='))
}

/// Compute fingerprint from a base64 key as it appears in known_hosts output
pub fn fingerprint_from_b64(key_b64: &str) -> Result<String, base64::DecodeError> {
    let bytes = BASE64.decode(key_b64.trim())?;
    Ok(fingerprint(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_format() {
        assert_eq!(
            fingerprint(b"key-one"),
            "SHA256:mzRgQbyaSVdOsmZbKtKgo/n5zOTkL10fJt64ola1lmo"
        );
        assert!(!fingerprint(b"anything").ends_with('='));
    }

    #[test]
    fn test_fingerprint_from_b64() {
        assert_eq!(
            fingerprint_from_b64("a2V5LXR3bw==").unwrap(),
            "SHA256:yN9RRpwwilm/vUij4L3SKMqSLWAyA19e9uStRfRzqfM"
        );
        assert!(fingerprint_from_b64("not base64 !!").is_err());
    }
}
