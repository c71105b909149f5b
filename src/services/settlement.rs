use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::models::{DailyReport, Draft, MenuSale, PlatformDailyEntry, PlatformType};
use crate::utils::parse_decimal;

/// One menu row of the entry form for a platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuInput {
    pub menu_name: String,
    pub count: f64,
    pub amount: f64,
}

impl MenuInput {
    /// Form fields arrive as text; blanks and junk count as zero.
    pub fn from_form(menu_name: &str, count: &str, amount: &str) -> Self {
        MenuInput {
            menu_name: menu_name.to_string(),
            count: parse_decimal(count),
            amount: parse_decimal(amount),
        }
    }

    fn is_touched(&self) -> bool {
        self.count > 0.0 || self.amount > 0.0
    }
}

/// Totals, fee and net settlement for one platform's day.
///
/// Rows with neither a count nor an amount are untouched form fields and are
/// dropped before anything is summed.
pub fn settle_platform(platform: PlatformType, inputs: &[MenuInput], fee_rate: f64) -> PlatformDailyEntry {
    let menu_sales: Vec<MenuSale> = inputs
        .iter()
        .filter(|input| input.is_touched())
        .map(|input| MenuSale {
            menu_name: input.menu_name.clone(),
            count: input.count,
            amount: input.amount,
        })
        .collect();

    let platform_total_amount: f64 = menu_sales.iter().map(|s| s.amount).sum();
    let platform_total_count: f64 = menu_sales.iter().map(|s| s.count).sum();
    let fee_amount = (platform_total_amount * fee_rate).floor();

    PlatformDailyEntry {
        platform,
        menu_sales,
        platform_total_amount,
        platform_total_count,
        fee_amount,
        settlement_amount: platform_total_amount - fee_amount,
    }
}

/// Replaces the draft's entry for the same platform, appending the new one.
pub fn upsert_draft_entry(draft: &mut Draft, entry: PlatformDailyEntry) {
    draft.entries.retain(|e| e.platform != entry.platform);
    draft.entries.push(entry);
}

/// Commits a draft as a report. An empty draft produces nothing.
pub fn finalize_draft(draft: &Draft, id: String, created_at: i64) -> Result<DailyReport> {
    if draft.entries.is_empty() {
        return Err(LedgerError::EmptyDraft);
    }
    Ok(DailyReport {
        id,
        date: draft.date.clone(),
        entries: draft.entries.clone(),
        total_amount: draft.entries.iter().map(|e| e.platform_total_amount).sum(),
        total_count: draft.entries.iter().map(|e| e.platform_total_count).sum(),
        memo: draft.memo.clone(),
        created_at,
    })
}
