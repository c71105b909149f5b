use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use crate::db::{KeyValueStore, CONFIG_MENUS_KEY, CONFIG_PLATFORMS_KEY, DRAFT_KEY};
use crate::error::{LedgerError, Result};
use crate::models::{
    DailyReport, DashboardStats, Draft, FailedImport, FolderImportSummary, ImportSummary,
    PlatformConfig, PlatformDailyEntry, PlatformType, ScanSummary, Settings, StatsPeriod,
};
use crate::services::aggregator::{aggregate_menus, aggregate_platforms, group_by_period, home_metrics};
use crate::services::consolidator::{consolidate, merge_reports, save_reports};
use crate::services::import::{list_import_files, origin_label, parse_import, read_import_file};
use crate::services::normalizer::Normalizer;
use crate::services::settlement::{finalize_draft, settle_platform, upsert_draft_entry, MenuInput};
use crate::utils::{new_report_id, now_millis, today, value_to_string};

pub type SharedStore = Box<dyn KeyValueStore + Send>;

/// In-memory ledger over an injected store.
///
/// Locks are always taken in the order store, reports, settings, draft, and
/// none is held across an `.await`.
pub struct AppState {
    store: Mutex<SharedStore>,
    reports: Mutex<Vec<DailyReport>>,
    settings: Mutex<Settings>,
    draft: Mutex<Draft>,
}

impl AppState {
    /// Loads settings and the draft, then consolidates every slot into the
    /// canonical set.
    pub fn load(store: SharedStore) -> Result<Self> {
        let settings = load_settings(&*store);
        let draft = load_draft(&*store);
        let state = AppState {
            store: Mutex::new(store),
            reports: Mutex::new(Vec::new()),
            settings: Mutex::new(settings),
            draft: Mutex::new(draft),
        };
        state.scan_and_consolidate()?;
        Ok(state)
    }

    pub fn reports(&self) -> Result<Vec<DailyReport>> {
        Ok(self.reports.lock().map_err(|_| LedgerError::Lock("reports"))?.clone())
    }

    pub fn settings(&self) -> Result<Settings> {
        Ok(self.settings.lock().map_err(|_| LedgerError::Lock("settings"))?.clone())
    }

    pub fn draft(&self) -> Result<Draft> {
        Ok(self.draft.lock().map_err(|_| LedgerError::Lock("draft"))?.clone())
    }

    pub fn scan_and_consolidate(&self) -> Result<ScanSummary> {
        let mut store = self.store.lock().map_err(|_| LedgerError::Lock("store"))?;
        let normalizer = Normalizer::new()?;
        let consolidation = consolidate(&mut **store, &normalizer)?;
        let mut reports = self.reports.lock().map_err(|_| LedgerError::Lock("reports"))?;
        *reports = consolidation.reports;
        Ok(consolidation.summary)
    }

    /// Merges a backup file's records into the set. Nothing is written when
    /// the file cannot be read or parsed.
    pub async fn import_file(&self, path: &Path) -> Result<ImportSummary> {
        let contents = read_import_file(path).await?;
        self.import_contents(&contents, &origin_label(path))
    }

    pub fn import_contents(&self, contents: &str, origin: &str) -> Result<ImportSummary> {
        let normalizer = Normalizer::new()?;
        let recovered = parse_import(contents, origin, &normalizer)?;
        let imported = recovered.len();

        let mut store = self.store.lock().map_err(|_| LedgerError::Lock("store"))?;
        let mut reports = self.reports.lock().map_err(|_| LedgerError::Lock("reports"))?;
        let merged = merge_reports(reports.clone(), recovered);
        save_reports(&mut **store, &merged)?;
        *reports = merged;

        tracing::info!(source = origin, imported, total = reports.len(), "imported reports");
        Ok(ImportSummary {
            source: origin.to_string(),
            imported,
            total: reports.len(),
        })
    }

    /// Imports every `.json` file directly inside `folder`. A file that fails
    /// is reported and the rest still go through.
    pub async fn import_folder(&self, folder: &Path) -> Result<FolderImportSummary> {
        if !folder.is_dir() {
            return Err(LedgerError::Validation(format!(
                "not a folder: {}",
                folder.display()
            )));
        }

        let mut summary = FolderImportSummary::default();
        for path in list_import_files(folder) {
            match self.import_file(&path).await {
                Ok(imported) => summary.imported.push(imported),
                Err(err) => {
                    tracing::warn!(file = %path.display(), error = %err, "import failed");
                    summary.failed.push(FailedImport {
                        source: origin_label(&path),
                        error: err.to_string(),
                    });
                }
            }
        }
        Ok(summary)
    }

    /// Writes a dump of storage slots (an object of key to value) into the
    /// store, reloads settings and draft from it and rescans.
    pub fn restore_slots(&self, contents: &str) -> Result<ScanSummary> {
        let dump: BTreeMap<String, Value> = serde_json::from_str(contents)
            .map_err(|e| LedgerError::InvalidImport(format!("slot dump: {}", e)))?;

        {
            let mut store = self.store.lock().map_err(|_| LedgerError::Lock("store"))?;
            for (key, value) in &dump {
                store.set(key, &value_to_string(value))?;
            }
            let mut settings = self.settings.lock().map_err(|_| LedgerError::Lock("settings"))?;
            *settings = load_settings(&**store);
            let mut draft = self.draft.lock().map_err(|_| LedgerError::Lock("draft"))?;
            *draft = load_draft(&**store);
        }
        tracing::info!(slots = dump.len(), "restored storage slots");

        self.scan_and_consolidate()
    }

    /// Replaces the whole set with the empty set.
    pub fn reset(&self) -> Result<()> {
        let mut store = self.store.lock().map_err(|_| LedgerError::Lock("store"))?;
        let mut reports = self.reports.lock().map_err(|_| LedgerError::Lock("reports"))?;
        save_reports(&mut **store, &[])?;
        reports.clear();
        tracing::info!("report set cleared");
        Ok(())
    }

    /// Settles one platform's menu rows with its configured fee rate and puts
    /// the result in the draft, replacing any earlier entry for the platform.
    pub fn save_platform_entry(&self, platform: PlatformType, inputs: &[MenuInput]) -> Result<PlatformDailyEntry> {
        let mut store = self.store.lock().map_err(|_| LedgerError::Lock("store"))?;
        let fee_rate = self
            .settings
            .lock()
            .map_err(|_| LedgerError::Lock("settings"))?
            .platform(platform)
            .fee_rate;
        let mut draft = self.draft.lock().map_err(|_| LedgerError::Lock("draft"))?;

        let entry = settle_platform(platform, inputs, fee_rate);
        upsert_draft_entry(&mut draft, entry.clone());
        write_json(&mut **store, DRAFT_KEY, &*draft)?;
        Ok(entry)
    }

    pub fn set_draft_memo(&self, memo: &str) -> Result<Draft> {
        self.edit_draft(|draft| {
            draft.memo = memo.to_string();
            Ok(())
        })
    }

    pub fn set_draft_date(&self, date: &str) -> Result<Draft> {
        let date = date.trim();
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| LedgerError::InvalidDate(date.to_string()))?;
        self.edit_draft(|draft| {
            draft.date = date.to_string();
            Ok(())
        })
    }

    /// Commits the draft as a new report at the front of the set and clears
    /// its entries and memo. The draft date is kept.
    pub fn finalize_settlement(&self) -> Result<DailyReport> {
        let mut store = self.store.lock().map_err(|_| LedgerError::Lock("store"))?;
        let mut reports = self.reports.lock().map_err(|_| LedgerError::Lock("reports"))?;
        let mut draft = self.draft.lock().map_err(|_| LedgerError::Lock("draft"))?;

        let report = finalize_draft(&draft, new_report_id(), now_millis())?;
        reports.insert(0, report.clone());
        save_reports(&mut **store, &reports)?;

        draft.entries.clear();
        draft.memo.clear();
        write_json(&mut **store, DRAFT_KEY, &*draft)?;

        tracing::info!(
            id = %report.id,
            date = %report.date,
            total_amount = report.total_amount,
            "settlement finalized"
        );
        Ok(report)
    }

    pub fn add_menu(&self, name: &str) -> Result<Settings> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::Validation("menu name is empty".to_string()));
        }
        self.edit_settings(|settings| {
            if settings.menus.iter().any(|m| m == name) {
                return Err(LedgerError::Validation(format!("menu already exists: {}", name)));
            }
            settings.menus.push(name.to_string());
            Ok(())
        })
    }

    pub fn remove_menu(&self, name: &str) -> Result<Settings> {
        let name = name.trim();
        self.edit_settings(|settings| {
            let before = settings.menus.len();
            settings.menus.retain(|m| m != name);
            if settings.menus.len() == before {
                return Err(LedgerError::UnknownMenu(name.to_string()));
            }
            Ok(())
        })
    }

    pub fn set_fee_rate(&self, platform: PlatformType, fee_rate: f64) -> Result<Settings> {
        self.update_platform(platform, Some(fee_rate), None)
    }

    pub fn rename_platform(&self, platform: PlatformType, name: &str) -> Result<Settings> {
        self.update_platform(platform, None, Some(name))
    }

    /// Sets whichever of fee rate and name is given. Both are validated
    /// before anything is written.
    pub fn update_platform(&self, platform: PlatformType, fee_rate: Option<f64>, name: Option<&str>) -> Result<Settings> {
        if let Some(rate) = fee_rate {
            if !(0.0..1.0).contains(&rate) {
                return Err(LedgerError::InvalidFeeRate(rate));
            }
        }
        let name = name.map(str::trim);
        if name == Some("") {
            return Err(LedgerError::Validation("platform name is empty".to_string()));
        }

        self.edit_settings(|settings| {
            let mut config = settings.platform(platform);
            if let Some(rate) = fee_rate {
                config.fee_rate = rate;
            }
            if let Some(name) = name {
                config.name = name.to_string();
            }
            settings.platforms.insert(platform, config);
            Ok(())
        })
    }

    pub fn dashboard(&self, period: StatsPeriod, today: NaiveDate) -> Result<DashboardStats> {
        let reports = self.reports.lock().map_err(|_| LedgerError::Lock("reports"))?;
        let (current_month_sales, previous_month_sales) = home_metrics(&reports, today);
        Ok(DashboardStats {
            current_month_sales,
            previous_month_sales,
            report_count: reports.len(),
            period,
            periods: group_by_period(&reports, period),
            platforms: aggregate_platforms(&reports),
            menus: aggregate_menus(&reports),
        })
    }

    fn edit_draft<F>(&self, edit: F) -> Result<Draft>
    where
        F: FnOnce(&mut Draft) -> Result<()>,
    {
        let mut store = self.store.lock().map_err(|_| LedgerError::Lock("store"))?;
        let mut draft = self.draft.lock().map_err(|_| LedgerError::Lock("draft"))?;
        edit(&mut draft)?;
        write_json(&mut **store, DRAFT_KEY, &*draft)?;
        Ok(draft.clone())
    }

    fn edit_settings<F>(&self, edit: F) -> Result<Settings>
    where
        F: FnOnce(&mut Settings) -> Result<()>,
    {
        let mut store = self.store.lock().map_err(|_| LedgerError::Lock("store"))?;
        let mut settings = self.settings.lock().map_err(|_| LedgerError::Lock("settings"))?;
        let mut edited = settings.clone();
        edit(&mut edited)?;
        write_json(&mut **store, CONFIG_MENUS_KEY, &edited.menus)?;
        write_json(&mut **store, CONFIG_PLATFORMS_KEY, &edited.platforms)?;
        *settings = edited;
        Ok(settings.clone())
    }
}

fn write_json<T: Serialize + ?Sized>(store: &mut dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

fn read_json<T: serde::de::DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key).ok().flatten()?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(key, error = %err, "unreadable config value, using defaults");
            None
        }
    }
}

/// Stored menus and platform configs over the built-in defaults. A platform
/// missing from the stored map keeps its default config.
pub fn load_settings(store: &dyn KeyValueStore) -> Settings {
    let mut settings = Settings::default();
    if let Some(menus) = read_json::<Vec<String>>(store, CONFIG_MENUS_KEY) {
        settings.menus = menus;
    }
    if let Some(platforms) = read_json::<BTreeMap<PlatformType, PlatformConfig>>(store, CONFIG_PLATFORMS_KEY) {
        settings.platforms.extend(platforms);
    }
    settings
}

pub fn load_draft(store: &dyn KeyValueStore) -> Draft {
    let mut draft = read_json::<Draft>(store, DRAFT_KEY).unwrap_or_else(|| Draft {
        entries: Vec::new(),
        memo: String::new(),
        date: String::new(),
    });
    if draft.date.is_empty() {
        draft.date = today();
    }
    draft
}
