use std::collections::HashMap;

use crate::db::{KeyValueStore, REPORTS_KEY};
use crate::error::Result;
use crate::models::{DailyReport, ScanSummary};
use crate::services::normalizer::{Normalizer, Recovered};
use crate::services::scanner::scan_store;

pub struct Consolidation {
    pub reports: Vec<DailyReport>,
    pub summary: ScanSummary,
}

/// Merges `incoming` over `existing` by id and sorts newest date first.
///
/// The last record seen for an id wins, so a recovered record replaces a
/// canonical one with the same id. A `createdAt` the normalizer had to stamp
/// never replaces one already in the set. Records sharing a date keep their
/// merge order.
pub fn merge_reports(existing: Vec<DailyReport>, incoming: Vec<Recovered>) -> Vec<DailyReport> {
    let mut merged: Vec<DailyReport> = Vec::with_capacity(existing.len() + incoming.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    let existing = existing.into_iter().map(|report| (report, false));
    let incoming = incoming
        .into_iter()
        .map(|recovered| (recovered.report, recovered.created_at_stamped));

    for (mut report, stamped) in existing.chain(incoming) {
        match index.get(&report.id) {
            Some(&slot) => {
                if stamped {
                    report.created_at = merged[slot].created_at;
                }
                merged[slot] = report;
            }
            None => {
                index.insert(report.id.clone(), merged.len());
                merged.push(report);
            }
        }
    }

    merged.sort_by(|a, b| b.date.cmp(&a.date));
    merged
}

pub fn save_reports(store: &mut dyn KeyValueStore, reports: &[DailyReport]) -> Result<()> {
    let raw = serde_json::to_string(reports)?;
    store.set(REPORTS_KEY, &raw)
}

/// Scans every slot, merges the result into the canonical set and writes it
/// back. Running it again without new legacy data leaves the set unchanged.
pub fn consolidate(store: &mut dyn KeyValueStore, normalizer: &Normalizer) -> Result<Consolidation> {
    let outcome = scan_store(&*store, normalizer)?;
    let canonical = outcome.canonical.len();
    let recovered = outcome.recovered.len();
    let skipped_slots = outcome.skipped_slots.len();

    let reports = merge_reports(outcome.canonical, outcome.recovered);
    save_reports(store, &reports)?;

    tracing::info!(
        canonical,
        recovered,
        skipped_slots,
        total = reports.len(),
        "consolidated report store"
    );

    Ok(Consolidation {
        summary: ScanSummary {
            canonical,
            recovered,
            skipped_slots,
            total: reports.len(),
        },
        reports,
    })
}
