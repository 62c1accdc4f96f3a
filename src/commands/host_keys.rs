//! Host Key Commands
//!
//! - `host_key_verify` - classify a host's current key (never writes)
//! - `host_key_trust` - trust a key after the user confirmed it
//! - `host_key_list` / `host_key_forget` / `host_key_clear`

use serde::Deserialize;
use tracing::info;

use crate::context::AppContext;
use crate::host_keys::{FingerprintClassification, TrustRecord};

/// Trust request, usually built from a `New` or `Changed` verify result
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustHostKeyRequest {
    pub host: String,
    pub port: u16,
    pub key_type: String,
    pub fingerprint: String,
    pub full_key: String,
}

/// Errors come back inside the classification, so this never fails
pub async fn host_key_verify(
    ctx: &AppContext,
    host: &str,
    port: u16,
) -> Result<FingerprintClassification, String> {
    Ok(ctx.verifier().verify(host, port).await)
}

pub fn host_key_trust(ctx: &AppContext, request: TrustHostKeyRequest) -> Result<TrustRecord, String> {
    info!(
        "Trusting host key for {}:{} ({})",
        request.host, request.port, request.fingerprint
    );
    ctx.verifier()
        .commit(
            &request.host,
            request.port,
            &request.key_type,
            &request.fingerprint,
            &request.full_key,
        )
        .map_err(|e| e.to_string())
}

pub fn host_key_list(ctx: &AppContext) -> Result<Vec<TrustRecord>, String> {
    Ok(ctx.trust_store().get_all())
}

/// Returns whether a record existed
pub fn host_key_forget(ctx: &AppContext, host: &str, port: u16) -> Result<bool, String> {
    ctx.verifier().forget(host, port).map_err(|e| e.to_string())
}

pub fn host_key_clear(ctx: &AppContext) -> Result<(), String> {
    ctx.trust_store().clear().map_err(|e| e.to_string())
}
