use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

pub const UNKNOWN_MENU_NAME: &str = "알 수 없는 메뉴";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlatformType {
    Baemin,
    Coupang,
    Yogiyo,
    Naver,
    Store,
}

impl PlatformType {
    pub const ALL: [PlatformType; 5] = [
        PlatformType::Baemin,
        PlatformType::Coupang,
        PlatformType::Yogiyo,
        PlatformType::Naver,
        PlatformType::Store,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::Baemin => "BAEMIN",
            PlatformType::Coupang => "COUPANG",
            PlatformType::Yogiyo => "YOGIYO",
            PlatformType::Naver => "NAVER",
            PlatformType::Store => "STORE",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        PlatformType::ALL
            .into_iter()
            .find(|p| p.as_str() == upper)
            .ok_or_else(|| LedgerError::UnknownPlatform(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuSale {
    pub menu_name: String,
    pub count: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformDailyEntry {
    pub platform: PlatformType,
    #[serde(default)]
    pub menu_sales: Vec<MenuSale>,
    pub platform_total_amount: f64,
    pub platform_total_count: f64,
    #[serde(default)]
    pub fee_amount: f64,
    #[serde(default)]
    pub settlement_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    pub id: String,
    /// Business date (YYYY-MM-DD)
    pub date: String,
    #[serde(default)]
    pub entries: Vec<PlatformDailyEntry>,
    pub total_amount: f64,
    pub total_count: f64,
    #[serde(default)]
    pub memo: String,
    /// Unix millis
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfig {
    pub id: PlatformType,
    pub name: String,
    pub fee_rate: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub menus: Vec<String>,
    pub platforms: BTreeMap<PlatformType, PlatformConfig>,
}

impl Settings {
    pub fn platform(&self, platform: PlatformType) -> PlatformConfig {
        self.platforms
            .get(&platform)
            .cloned()
            .unwrap_or_else(|| default_platform_config(platform))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            menus: vec!["닭강정".to_string(), "국밥".to_string(), "냉면".to_string()],
            platforms: PlatformType::ALL
                .into_iter()
                .map(|p| (p, default_platform_config(p)))
                .collect(),
        }
    }
}

pub fn default_platform_config(platform: PlatformType) -> PlatformConfig {
    let (name, fee_rate, color) = match platform {
        PlatformType::Baemin => ("배달의민족", 0.068, "#2AC1BC"),
        PlatformType::Coupang => ("쿠팡이츠", 0.098, "#00AEEF"),
        PlatformType::Yogiyo => ("요기요", 0.125, "#FA0050"),
        PlatformType::Naver => ("네이버", 0.035, "#03C75A"),
        PlatformType::Store => ("매장(카드)", 0.015, "#FFFFFF"),
    };
    PlatformConfig {
        id: platform,
        name: name.to_string(),
        fee_rate,
        color: color.to_string(),
    }
}

/// Uncommitted entries for the day being settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    #[serde(default)]
    pub entries: Vec<PlatformDailyEntry>,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatsPeriod {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl FromStr for StatsPeriod {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "day" => Ok(StatsPeriod::Daily),
            "weekly" | "week" => Ok(StatsPeriod::Weekly),
            "monthly" | "month" => Ok(StatsPeriod::Monthly),
            "yearly" | "year" => Ok(StatsPeriod::Yearly),
            other => Err(LedgerError::Validation(format!("unknown stats period: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStat {
    pub period: String,
    pub amount: f64,
    pub count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformStat {
    pub platform: PlatformType,
    pub amount: f64,
    pub count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuStat {
    pub menu_name: String,
    pub amount: f64,
    pub count: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub current_month_sales: f64,
    pub previous_month_sales: f64,
    pub report_count: usize,
    pub period: StatsPeriod,
    pub periods: Vec<PeriodStat>,
    pub platforms: Vec<PlatformStat>,
    pub menus: Vec<MenuStat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub source: String,
    pub imported: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedImport {
    pub source: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderImportSummary {
    pub imported: Vec<ImportSummary>,
    pub failed: Vec<FailedImport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub canonical: usize,
    pub recovered: usize,
    pub skipped_slots: usize,
    pub total: usize,
}
