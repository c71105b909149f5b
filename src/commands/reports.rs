use crate::models::{DailyReport, Draft, FolderImportSummary, ImportSummary, PlatformDailyEntry, PlatformType};
use crate::services::settlement::MenuInput;
use crate::services::state::AppState;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuRowPayload {
    pub menu_name: String,
    #[serde(default)]
    pub count: String,
    #[serde(default)]
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct PlatformEntryPayload {
    pub platform: String,
    pub menus: Vec<MenuRowPayload>,
}

pub fn list_reports(state: &AppState) -> Result<Vec<DailyReport>, String> {
    state.reports().map_err(|e| e.to_string())
}

pub async fn import_report_file(path: String, state: &AppState) -> Result<ImportSummary, String> {
    state
        .import_file(Path::new(&path))
        .await
        .map_err(|e| e.to_string())
}

pub async fn import_report_folder(folder: String, state: &AppState) -> Result<FolderImportSummary, String> {
    state
        .import_folder(Path::new(&folder))
        .await
        .map_err(|e| e.to_string())
}

pub fn get_draft(state: &AppState) -> Result<Draft, String> {
    state.draft().map_err(|e| e.to_string())
}

pub fn save_platform_entry(payload: PlatformEntryPayload, state: &AppState) -> Result<PlatformDailyEntry, String> {
    let platform = payload
        .platform
        .parse::<PlatformType>()
        .map_err(|e| e.to_string())?;
    let inputs: Vec<MenuInput> = payload
        .menus
        .iter()
        .map(|row| MenuInput::from_form(&row.menu_name, &row.count, &row.amount))
        .collect();
    state
        .save_platform_entry(platform, &inputs)
        .map_err(|e| e.to_string())
}

pub fn set_draft_memo(memo: String, state: &AppState) -> Result<Draft, String> {
    state.set_draft_memo(&memo).map_err(|e| e.to_string())
}

pub fn set_draft_date(date: String, state: &AppState) -> Result<Draft, String> {
    state.set_draft_date(&date).map_err(|e| e.to_string())
}

pub fn finalize_settlement(state: &AppState) -> Result<DailyReport, String> {
    state.finalize_settlement().map_err(|e| e.to_string())
}
