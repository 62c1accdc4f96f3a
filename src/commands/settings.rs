//! Settings Commands
//!
//! - `settings_get` - current settings
//! - `settings_update` - validate, save and apply new settings

use crate::config::AppSettings;
use crate::context::AppContext;

pub fn settings_get(ctx: &AppContext) -> Result<AppSettings, String> {
    Ok(ctx.settings())
}

/// Returns the settings as stored
pub async fn settings_update(ctx: &AppContext, settings: AppSettings) -> Result<AppSettings, String> {
    ctx.update_settings(settings).await.map_err(|e| e.to_string())
}
