use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::{LedgerError, Result};
use crate::services::normalizer::{Normalizer, Recovered};
use crate::utils::is_truthy;

pub async fn read_import_file(path: &Path) -> Result<String> {
    Ok(tokio::fs::read_to_string(path).await?)
}

/// Parses a backup file: a bare array of records, an object whose `reports`
/// field holds them, or a single record. Invalid JSON fails the whole file.
pub fn parse_import(contents: &str, origin: &str, normalizer: &Normalizer) -> Result<Vec<Recovered>> {
    let data: Value = serde_json::from_str(contents)
        .map_err(|e| LedgerError::InvalidImport(format!("{}: {}", origin, e)))?;
    if data.is_null() {
        return Err(LedgerError::InvalidImport(format!("{}: file holds no data", origin)));
    }

    let payload = match data.get("reports") {
        Some(reports) if is_truthy(reports) => reports,
        _ => &data,
    };

    Ok(normalizer.normalize_value(payload, origin))
}

/// `.json` files directly inside `folder`, by file name.
pub fn list_import_files(folder: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(folder)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter(|e| is_json(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect()
}

pub fn origin_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
