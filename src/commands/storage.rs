use crate::models::ScanSummary;
use crate::services::state::AppState;

/// Re-runs the scan over every slot.
pub fn scan_storage(state: &AppState) -> Result<ScanSummary, String> {
    state.scan_and_consolidate().map_err(|e| e.to_string())
}

/// Loads a storage dump file (object of key to value) and rescans.
pub async fn restore_slots(path: String, state: &AppState) -> Result<ScanSummary, String> {
    let contents = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| format!("{}: {}", path, e))?;
    state.restore_slots(&contents).map_err(|e| e.to_string())
}

pub fn reset_reports(state: &AppState) -> Result<(), String> {
    state.reset().map_err(|e| e.to_string())
}
