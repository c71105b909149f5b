use serde_json::Value;

use crate::db::{is_reserved_key, KeyValueStore, REPORTS_KEY};
use crate::error::Result;
use crate::models::DailyReport;
use crate::services::normalizer::{Normalizer, Recovered};

#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Records read from the canonical slot, in stored order.
    pub canonical: Vec<DailyReport>,
    /// Records recovered from every legacy slot, in key order.
    pub recovered: Vec<Recovered>,
    /// Slots whose content was not JSON.
    pub skipped_slots: Vec<String>,
}

/// Reads the canonical slot, then runs every legacy slot through the
/// normalizer. Unparsable slots are skipped; only store failures are errors.
pub fn scan_store(store: &dyn KeyValueStore, normalizer: &Normalizer) -> Result<ScanOutcome> {
    let mut outcome = ScanOutcome {
        canonical: read_canonical(store, normalizer)?,
        ..ScanOutcome::default()
    };

    for key in store.keys()? {
        if is_reserved_key(&key) {
            continue;
        }
        let Some(raw) = store.get(&key)? else {
            continue;
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => {
                let recovered = normalizer.normalize_value(&value, &key);
                if !recovered.is_empty() {
                    tracing::debug!(slot = %key, records = recovered.len(), "recovered legacy records");
                }
                outcome.recovered.extend(recovered);
            }
            Err(err) => {
                tracing::debug!(slot = %key, error = %err, "skipping slot that is not JSON");
                outcome.skipped_slots.push(key);
            }
        }
    }

    Ok(outcome)
}

fn read_canonical(store: &dyn KeyValueStore, normalizer: &Normalizer) -> Result<Vec<DailyReport>> {
    let Some(raw) = store.get(REPORTS_KEY)? else {
        return Ok(Vec::new());
    };

    if let Ok(reports) = serde_json::from_str::<Vec<DailyReport>>(&raw) {
        return Ok(reports);
    }

    match serde_json::from_str::<Value>(&raw) {
        Ok(value) => {
            tracing::warn!("canonical slot does not match the report schema, normalizing it record by record");
            Ok(normalizer
                .normalize_value(&value, REPORTS_KEY)
                .into_iter()
                .map(|recovered| recovered.report)
                .collect())
        }
        Err(err) => {
            tracing::warn!(error = %err, "canonical slot is not JSON, starting from an empty set");
            Ok(Vec::new())
        }
    }
}
