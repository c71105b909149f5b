//! Turns loosely shaped stored or imported records into canonical reports.
//!
//! Every concept (date, amount, platform, ...) is read through an ordered
//! alias list in [`FIELD_ALIASES`]. A record that cannot be given a valid
//! calendar date is skipped; one bad record never fails the batch.

use chrono::NaiveDate;
use jsonschema::JSONSchema;
use regex::Regex;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::error::{LedgerError, Result};
use crate::models::{DailyReport, MenuSale, PlatformDailyEntry, PlatformType, UNKNOWN_MENU_NAME};
use crate::utils::{
    coerce_number, date_from_millis, format_date, is_truthy, now_millis, parse_loose_date,
    stable_report_id, value_to_string,
};

/// How a candidate field counts as present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Any non-null value.
    NonNull,
    /// Non-null, non-empty, non-zero, non-false.
    Truthy,
}

#[derive(Debug, Clone, Copy)]
pub struct Alias {
    pub fields: &'static [&'static str],
    pub lookup: Lookup,
}

impl Alias {
    /// First candidate field that is present under this alias' lookup rule.
    pub fn pick<'a>(&self, record: &'a Map<String, Value>) -> Option<&'a Value> {
        self.fields
            .iter()
            .filter_map(|field| record.get(*field))
            .find(|value| match self.lookup {
                Lookup::NonNull => !value.is_null(),
                Lookup::Truthy => is_truthy(value),
            })
    }
}

pub struct FieldAliases {
    pub id: Alias,
    pub date: Alias,
    pub amount: Alias,
    pub count: Alias,
    pub platform: Alias,
    pub menus: Alias,
    pub memo: Alias,
    pub created_at: Alias,
    pub menu_name: Alias,
    pub menu_count: Alias,
    pub menu_amount: Alias,
}

pub const FIELD_ALIASES: FieldAliases = FieldAliases {
    id: Alias { fields: &["id"], lookup: Lookup::Truthy },
    date: Alias {
        fields: &["date", "dt", "d", "s_date", "sale_date", "created_at", "timestamp", "day"],
        lookup: Lookup::Truthy,
    },
    amount: Alias { fields: &["totalAmount", "amount", "amt", "sum"], lookup: Lookup::NonNull },
    count: Alias { fields: &["totalCount", "count", "cnt"], lookup: Lookup::NonNull },
    platform: Alias { fields: &["platform", "plat", "type"], lookup: Lookup::Truthy },
    menus: Alias { fields: &["menuSales", "menus"], lookup: Lookup::Truthy },
    memo: Alias { fields: &["memo", "note"], lookup: Lookup::Truthy },
    created_at: Alias { fields: &["createdAt"], lookup: Lookup::Truthy },
    menu_name: Alias { fields: &["menuName", "name"], lookup: Lookup::Truthy },
    menu_count: Alias { fields: &["count", "qty"], lookup: Lookup::Truthy },
    menu_amount: Alias { fields: &["amount", "price"], lookup: Lookup::Truthy },
};

/// Substrings that identify a delivery platform, checked in order against the
/// upper-cased raw value. No match means an in-store sale.
const PLATFORM_MARKERS: [(PlatformType, &[&str]); 4] = [
    (PlatformType::Baemin, &["BAEMIN", "배달", "배민"]),
    (PlatformType::Coupang, &["COUPANG", "쿠팡"]),
    (PlatformType::Yogiyo, &["YOGIYO", "요기"]),
    (PlatformType::Naver, &["NAVER", "네이버"]),
];

pub fn classify_platform(raw: &str) -> PlatformType {
    let upper = raw.to_uppercase();
    PLATFORM_MARKERS
        .iter()
        .find(|(_, markers)| markers.iter().any(|m| upper.contains(m)))
        .map(|(platform, _)| *platform)
        .unwrap_or(PlatformType::Store)
}

/// Why a single record produced no report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Skip {
    #[error("record is not an object")]
    NotAnObject,
    #[error("record has no date field")]
    MissingDate,
    #[error("unparsable date {0:?}")]
    InvalidDate(String),
}

/// A normalized report plus what the normalizer had to invent for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub report: DailyReport,
    /// `createdAt` was missing and set to the normalizer's clock.
    pub created_at_stamped: bool,
}

pub struct Normalizer {
    iso_date: Regex,
    canonical: JSONSchema,
    default_count: f64,
    now: i64,
}

impl Normalizer {
    pub fn new() -> Result<Self> {
        let iso_date = Regex::new(r"\d{4}-\d{2}-\d{2}")
            .map_err(|e| LedgerError::Schema(format!("date pattern: {}", e)))?;
        let schema = canonical_schema();
        let canonical = JSONSchema::compile(&schema)
            .map_err(|e| LedgerError::Schema(format!("canonical report schema: {}", e)))?;
        Ok(Normalizer {
            iso_date,
            canonical,
            default_count: 0.0,
            now: now_millis(),
        })
    }

    /// Count used when a legacy record carries none.
    pub fn with_default_count(mut self, default_count: f64) -> Self {
        self.default_count = default_count;
        self
    }

    /// Timestamp given to records without `createdAt`.
    pub fn with_clock(mut self, now: i64) -> Self {
        self.now = now;
        self
    }

    /// Normalizes a slot or file payload: an array of records or one record.
    pub fn normalize_value(&self, raw: &Value, origin: &str) -> Vec<Recovered> {
        let items: Vec<&Value> = match raw {
            Value::Null => return Vec::new(),
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        let mut results = Vec::with_capacity(items.len());
        for (position, item) in items.into_iter().enumerate() {
            match self.normalize_record(item, origin, position) {
                Ok(recovered) => results.push(recovered),
                Err(skip) => tracing::debug!(origin, position, reason = %skip, "skipped record"),
            }
        }
        results
    }

    pub fn normalize_record(
        &self,
        item: &Value,
        origin: &str,
        position: usize,
    ) -> std::result::Result<Recovered, Skip> {
        let record = item.as_object().ok_or(Skip::NotAnObject)?;

        if let Some(report) = self.as_canonical(item) {
            return Ok(Recovered {
                report,
                created_at_stamped: false,
            });
        }

        let raw_date = FIELD_ALIASES.date.pick(record).ok_or(Skip::MissingDate)?;
        let date = self
            .parse_date(raw_date)
            .ok_or_else(|| Skip::InvalidDate(value_to_string(raw_date)))?;

        let amount = FIELD_ALIASES
            .amount
            .pick(record)
            .map(coerce_number)
            .unwrap_or(0.0);
        let count = FIELD_ALIASES
            .count
            .pick(record)
            .map(coerce_number)
            .unwrap_or(self.default_count);

        let entries = match record.get("entries").and_then(Value::as_array) {
            Some(raw_entries) => raw_entries.iter().filter_map(entry_from_value).collect(),
            None => {
                let platform = FIELD_ALIASES
                    .platform
                    .pick(record)
                    .map(|v| classify_platform(&value_to_string(v)))
                    .unwrap_or(PlatformType::Store);
                let fee_amount = record.get("feeAmount").map(coerce_number).unwrap_or(0.0);
                let settlement_amount = match record.get("settlementAmount") {
                    Some(v) if is_truthy(v) => coerce_number(v),
                    _ => amount - fee_amount,
                };
                vec![PlatformDailyEntry {
                    platform,
                    menu_sales: legacy_menu_sales(record),
                    platform_total_amount: amount,
                    platform_total_count: count,
                    fee_amount,
                    settlement_amount,
                }]
            }
        };

        let total_amount = if amount != 0.0 {
            amount
        } else {
            entries.iter().map(|e| e.platform_total_amount).sum()
        };
        let total_count = if count != 0.0 {
            count
        } else {
            entries.iter().map(|e| e.platform_total_count).sum()
        };

        let id = FIELD_ALIASES
            .id
            .pick(record)
            .map(value_to_string)
            .unwrap_or_else(|| stable_report_id(origin, position, item));
        let memo = FIELD_ALIASES
            .memo
            .pick(record)
            .map(value_to_string)
            .unwrap_or_else(|| format!("복원됨 ({})", origin));
        let created_at = FIELD_ALIASES
            .created_at
            .pick(record)
            .map(coerce_number)
            .filter(|millis| *millis != 0.0)
            .map(|millis| millis as i64);

        Ok(Recovered {
            report: DailyReport {
                id,
                date: format_date(date),
                entries,
                total_amount,
                total_count,
                memo,
                created_at: created_at.unwrap_or(self.now),
            },
            created_at_stamped: created_at.is_none(),
        })
    }

    /// Records already in the current schema pass through untouched.
    fn as_canonical(&self, item: &Value) -> Option<DailyReport> {
        if !self.canonical.is_valid(item) {
            return None;
        }
        let report: DailyReport = serde_json::from_value(item.clone()).ok()?;
        NaiveDate::parse_from_str(&report.date, "%Y-%m-%d").ok()?;
        Some(report)
    }

    fn parse_date(&self, raw: &Value) -> Option<NaiveDate> {
        match raw {
            Value::String(s) => match self.iso_date.find(s) {
                // Take the embedded calendar date as written; parsing the full
                // timestamp could shift it across midnight.
                Some(found) => NaiveDate::parse_from_str(found.as_str(), "%Y-%m-%d").ok(),
                None => parse_loose_date(s),
            },
            Value::Number(n) => n.as_f64().and_then(date_from_millis),
            _ => None,
        }
    }
}

fn legacy_menu_sales(record: &Map<String, Value>) -> Vec<MenuSale> {
    let source = FIELD_ALIASES
        .menus
        .pick(record)
        .or_else(|| first_entry(record).and_then(|entry| entry.get("menuSales")));
    menu_sales_from(source)
}

/// First nested entry, whether `entries` is an array or an index-keyed object.
fn first_entry(record: &Map<String, Value>) -> Option<&Value> {
    match record.get("entries")? {
        Value::Array(entries) => entries.first(),
        Value::Object(entries) => entries.get("0"),
        _ => None,
    }
}

fn menu_sales_from(source: Option<&Value>) -> Vec<MenuSale> {
    source
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(menu_sale_from_value).collect())
        .unwrap_or_default()
}

fn menu_sale_from_value(value: &Value) -> Option<MenuSale> {
    let item = value.as_object()?;
    let menu_name = FIELD_ALIASES
        .menu_name
        .pick(item)
        .map(value_to_string)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_MENU_NAME.to_string());
    let count = FIELD_ALIASES
        .menu_count
        .pick(item)
        .map(coerce_number)
        .unwrap_or(0.0)
        .max(0.0);
    let amount = FIELD_ALIASES
        .menu_amount
        .pick(item)
        .map(coerce_number)
        .unwrap_or(0.0)
        .max(0.0);
    Some(MenuSale {
        menu_name,
        count,
        amount,
    })
}

fn entry_from_value(value: &Value) -> Option<PlatformDailyEntry> {
    let entry = value.as_object()?;
    let platform = entry
        .get("platform")
        .filter(|v| is_truthy(v))
        .map(|v| classify_platform(&value_to_string(v)))
        .unwrap_or(PlatformType::Store);
    let platform_total_amount = entry.get("platformTotalAmount").map(coerce_number).unwrap_or(0.0);
    let platform_total_count = entry.get("platformTotalCount").map(coerce_number).unwrap_or(0.0);
    let fee_amount = entry.get("feeAmount").map(coerce_number).unwrap_or(0.0);
    let settlement_amount = match entry.get("settlementAmount") {
        Some(v) if is_truthy(v) => coerce_number(v),
        _ => platform_total_amount - fee_amount,
    };
    Some(PlatformDailyEntry {
        platform,
        menu_sales: menu_sales_from(entry.get("menuSales")),
        platform_total_amount,
        platform_total_count,
        fee_amount,
        settlement_amount,
    })
}

fn canonical_schema() -> Value {
    let platforms: Vec<&str> = PlatformType::ALL.iter().map(|p| p.as_str()).collect();
    json!({
        "type": "object",
        "required": ["id", "date", "entries", "totalAmount", "totalCount", "createdAt"],
        "properties": {
            "id": {"type": "string", "minLength": 1},
            "date": {"type": "string", "pattern": "^[0-9]{4}-[0-9]{2}-[0-9]{2}$"},
            "entries": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["platform", "platformTotalAmount", "platformTotalCount"],
                    "properties": {
                        "platform": {"enum": platforms},
                        "menuSales": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["menuName", "count", "amount"],
                                "properties": {
                                    "menuName": {"type": "string"},
                                    "count": {"type": "number"},
                                    "amount": {"type": "number"}
                                }
                            }
                        },
                        "platformTotalAmount": {"type": "number"},
                        "platformTotalCount": {"type": "number"},
                        "feeAmount": {"type": "number"},
                        "settlementAmount": {"type": "number"}
                    }
                }
            },
            "totalAmount": {"type": "number"},
            "totalCount": {"type": "number"},
            "memo": {"type": "string"},
            "createdAt": {"type": "integer"}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn normalizer() -> Normalizer {
        Normalizer::new().unwrap().with_clock(NOW)
    }

    fn one(value: Value) -> Recovered {
        normalizer().normalize_record(&value, "kh_sales", 0).unwrap()
    }

    #[test]
    fn test_iso_timestamp_string_amount_and_lowercase_platform() {
        let recovered = one(json!({
            "date": "2024-03-15T10:00:00Z",
            "amount": "12000",
            "platform": "baemin"
        }));
        let report = recovered.report;
        assert_eq!(report.date, "2024-03-15");
        assert_eq!(report.total_amount, 12000.0);
        assert_eq!(report.total_count, 0.0);
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].platform, PlatformType::Baemin);
        assert_eq!(report.entries[0].platform_total_amount, 12000.0);
    }

    #[test]
    fn test_embedded_date_not_shifted_by_offset() {
        let report = one(json!({"dt": "2024-03-15T23:30:00-09:00", "amount": 1})).report;
        assert_eq!(report.date, "2024-03-15");
    }

    #[test]
    fn test_aggregate_only_record_gets_synthetic_entry() {
        let report = one(json!({"date": "2024-01-02", "amount": 5000, "count": 3})).report;
        assert_eq!(report.total_amount, 5000.0);
        assert_eq!(report.total_count, 3.0);
        assert_eq!(report.entries.len(), 1);
        let entry = &report.entries[0];
        assert_eq!(entry.platform, PlatformType::Store);
        assert_eq!(entry.platform_total_amount, 5000.0);
        assert_eq!(entry.platform_total_count, 3.0);
        assert_eq!(entry.settlement_amount, 5000.0);
        assert!(entry.menu_sales.is_empty());
    }

    #[test]
    fn test_rejects_without_usable_date() {
        let n = normalizer();
        assert_eq!(
            n.normalize_record(&json!({"amount": 100}), "k", 0),
            Err(Skip::MissingDate)
        );
        assert_eq!(
            n.normalize_record(&json!({"date": "", "amount": 100}), "k", 0),
            Err(Skip::MissingDate)
        );
        assert!(matches!(
            n.normalize_record(&json!({"date": "not a date"}), "k", 0),
            Err(Skip::InvalidDate(_))
        ));
        assert!(matches!(
            n.normalize_record(&json!({"date": "2024-13-45"}), "k", 0),
            Err(Skip::InvalidDate(_))
        ));
        assert!(matches!(
            n.normalize_record(&json!({"date": true}), "k", 0),
            Err(Skip::InvalidDate(_))
        ));
        assert_eq!(n.normalize_record(&json!("2024-03-15"), "k", 0), Err(Skip::NotAnObject));
        assert_eq!(n.normalize_record(&json!(42), "k", 0), Err(Skip::NotAnObject));
    }

    #[test]
    fn test_date_aliases_in_priority_order() {
        let report = one(json!({
            "sale_date": "2024-05-01",
            "day": "2024-06-01",
            "amount": 1
        }))
        .report;
        assert_eq!(report.date, "2024-05-01");

        let report = one(json!({"timestamp": 1_710_496_800_000_i64, "amt": 7})).report;
        assert_eq!(report.date, "2024-03-15");
        assert_eq!(report.total_amount, 7.0);
    }

    #[test]
    fn test_batch_skips_bad_items_and_keeps_the_rest() {
        let raw = json!([
            {"date": "2024-03-01", "amount": 100},
            null,
            "garbage",
            {"date": "nope"},
            {"d": "2024/03/02", "sum": "2,500"}
        ]);
        let recovered = normalizer().normalize_value(&raw, "kh_ledger_v9");
        let dates: Vec<_> = recovered.iter().map(|r| r.report.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-03-02"]);
        assert_eq!(recovered[1].report.total_amount, 2500.0);
    }

    #[test]
    fn test_single_object_and_null_payloads() {
        let n = normalizer();
        assert_eq!(n.normalize_value(&json!({"date": "2024-03-01"}), "k").len(), 1);
        assert!(n.normalize_value(&Value::Null, "k").is_empty());
        assert!(n.normalize_value(&json!(["a", "b"]), "k").is_empty());
    }

    #[test]
    fn test_platform_classification() {
        assert_eq!(classify_platform("배달의민족"), PlatformType::Baemin);
        assert_eq!(classify_platform("배민"), PlatformType::Baemin);
        assert_eq!(classify_platform("coupang eats"), PlatformType::Coupang);
        assert_eq!(classify_platform("쿠팡이츠"), PlatformType::Coupang);
        assert_eq!(classify_platform("요기요"), PlatformType::Yogiyo);
        assert_eq!(classify_platform("Naver Order"), PlatformType::Naver);
        assert_eq!(classify_platform("네이버"), PlatformType::Naver);
        assert_eq!(classify_platform("card"), PlatformType::Store);
        assert_eq!(classify_platform(""), PlatformType::Store);

        let report = one(json!({"date": "2024-03-01", "type": "쿠팡", "amount": 1})).report;
        assert_eq!(report.entries[0].platform, PlatformType::Coupang);
    }

    #[test]
    fn test_menu_aliases_and_placeholders() {
        let report = one(json!({
            "date": "2024-03-01",
            "amount": 30000,
            "menus": [
                {"name": "국밥", "qty": "2", "price": "18000"},
                {"menuName": "", "count": "x", "amount": -5},
                7
            ]
        }))
        .report;
        let sales = &report.entries[0].menu_sales;
        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0].menu_name, "국밥");
        assert_eq!(sales[0].count, 2.0);
        assert_eq!(sales[0].amount, 18000.0);
        assert_eq!(sales[1].menu_name, UNKNOWN_MENU_NAME);
        assert_eq!(sales[1].count, 0.0);
        assert_eq!(sales[1].amount, 0.0);
    }

    #[test]
    fn test_menus_read_from_index_keyed_entries() {
        let report = one(json!({
            "date": "2024-03-01",
            "amount": 100,
            "entries": {"0": {"menuSales": [{"menuName": "국밥", "count": 1, "amount": 100}]}}
        }))
        .report;
        assert_eq!(report.entries.len(), 1);
        let sales = &report.entries[0].menu_sales;
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].menu_name, "국밥");
        assert_eq!(sales[0].amount, 100.0);

        let top_level_wins = one(json!({
            "date": "2024-03-01",
            "menus": [{"name": "냉면", "qty": 1, "price": 8000}],
            "entries": {"0": {"menuSales": [{"menuName": "국밥", "count": 1, "amount": 100}]}}
        }))
        .report;
        assert_eq!(top_level_wins.entries[0].menu_sales[0].menu_name, "냉면");
    }

    #[test]
    fn test_entries_summed_when_no_top_level_total() {
        let report = one(json!({
            "date": "2024-03-01",
            "entries": [
                {"platform": "BAEMIN", "platformTotalAmount": "10000", "platformTotalCount": 2,
                 "menuSales": [{"menuName": "냉면", "count": 2, "amount": 10000}]},
                {"platform": "쿠팡", "platformTotalAmount": 4000, "platformTotalCount": 1, "feeAmount": 392},
                null
            ]
        }))
        .report;
        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.total_amount, 14000.0);
        assert_eq!(report.total_count, 3.0);
        assert_eq!(report.entries[0].menu_sales[0].menu_name, "냉면");
        assert_eq!(report.entries[1].platform, PlatformType::Coupang);
        assert_eq!(report.entries[1].settlement_amount, 3608.0);
    }

    #[test]
    fn test_canonical_record_passes_through_unchanged() {
        let canonical = DailyReport {
            id: "abc".to_string(),
            date: "2024-03-15".to_string(),
            entries: vec![PlatformDailyEntry {
                platform: PlatformType::Yogiyo,
                menu_sales: vec![MenuSale {
                    menu_name: "닭강정".to_string(),
                    count: 1.0,
                    amount: 9000.0,
                }],
                platform_total_amount: 9000.0,
                platform_total_count: 1.0,
                fee_amount: 1125.0,
                settlement_amount: 7875.0,
            }],
            // Deliberately inconsistent with the entries: trusted as stored.
            total_amount: 12345.0,
            total_count: 9.0,
            memo: String::new(),
            created_at: 42,
        };
        let value = serde_json::to_value(&canonical).unwrap();
        let recovered = one(value);
        assert_eq!(recovered.report, canonical);
        assert!(!recovered.created_at_stamped);
    }

    #[test]
    fn test_defaults_for_id_memo_and_created_at() {
        let item = json!({"date": "2024-03-01", "amount": 1});
        let first = normalizer().normalize_record(&item, "sales_data", 3).unwrap();
        let second = normalizer().normalize_record(&item, "sales_data", 3).unwrap();
        assert_eq!(first.report.id, second.report.id);
        assert_eq!(first.report.memo, "복원됨 (sales_data)");
        assert_eq!(first.report.created_at, NOW);
        assert!(first.created_at_stamped);

        let kept = one(json!({
            "id": "legacy-1",
            "date": "2024-03-01",
            "note": "비 옴",
            "createdAt": 1_709_251_200_000_i64
        }));
        assert_eq!(kept.report.id, "legacy-1");
        assert_eq!(kept.report.memo, "비 옴");
        assert_eq!(kept.report.created_at, 1_709_251_200_000);
        assert!(!kept.created_at_stamped);
    }

    #[test]
    fn test_default_count_applies_only_when_absent() {
        let n = Normalizer::new().unwrap().with_default_count(1.0);
        let absent = n.normalize_record(&json!({"date": "2024-03-01"}), "k", 0).unwrap();
        assert_eq!(absent.report.total_count, 1.0);
        let present = n
            .normalize_record(&json!({"date": "2024-03-01", "cnt": 4}), "k", 0)
            .unwrap();
        assert_eq!(present.report.total_count, 4.0);
    }

    #[test]
    fn test_non_finite_amount_is_zero() {
        let report = one(json!({"date": "2024-03-01", "amount": "Infinity", "count": "many"})).report;
        assert_eq!(report.total_amount, 0.0);
        assert_eq!(report.total_count, 0.0);
    }
}
