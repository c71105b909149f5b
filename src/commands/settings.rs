use crate::models::{PlatformType, Settings};
use crate::services::state::AppState;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSettingsPayload {
    pub platform: String,
    pub fee_rate: Option<f64>,
    pub name: Option<String>,
}

pub fn get_settings(state: &AppState) -> Result<Settings, String> {
    state.settings().map_err(|e| e.to_string())
}

pub fn add_menu(name: String, state: &AppState) -> Result<Settings, String> {
    state.add_menu(&name).map_err(|e| e.to_string())
}

pub fn remove_menu(name: String, state: &AppState) -> Result<Settings, String> {
    state.remove_menu(&name).map_err(|e| e.to_string())
}

/// Applies whichever of fee rate and name the payload carries.
pub fn save_platform_settings(payload: PlatformSettingsPayload, state: &AppState) -> Result<Settings, String> {
    let platform = payload
        .platform
        .parse::<PlatformType>()
        .map_err(|e| e.to_string())?;

    state
        .update_platform(platform, payload.fee_rate, payload.name.as_deref())
        .map_err(|e| e.to_string())
}
