use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use std::hash::Hash;

use crate::models::{DailyReport, MenuStat, PeriodStat, PlatformStat, PlatformType, StatsPeriod};
use crate::utils::parse_loose_date;

/// Period key for records whose date cannot be read.
pub const UNKNOWN_PERIOD: &str = "unknown";

/// Sums keyed rows, remembering the order keys were first seen.
struct Tally<K> {
    rows: Vec<(K, f64, f64)>,
    index: HashMap<K, usize>,
}

impl<K: Eq + Hash + Clone> Tally<K> {
    fn new() -> Self {
        Tally {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn add(&mut self, key: K, amount: f64, count: f64) {
        match self.index.get(&key) {
            Some(&i) => {
                self.rows[i].1 += amount;
                self.rows[i].2 += count;
            }
            None => {
                self.index.insert(key.clone(), self.rows.len());
                self.rows.push((key, amount, count));
            }
        }
    }

    fn by_amount_desc(mut self) -> Vec<(K, f64, f64)> {
        self.rows.sort_by(|a, b| b.1.total_cmp(&a.1));
        self.rows
    }
}

fn report_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_loose_date(date))
}

/// Zero-padded so that descending string order is newest first:
/// `2024-03-15`, `2024-W11`, `2024-03`, `2024`.
pub fn period_key(date: &str, period: StatsPeriod) -> String {
    let Some(parsed) = report_date(date) else {
        return UNKNOWN_PERIOD.to_string();
    };
    match period {
        StatsPeriod::Daily => date.to_string(),
        StatsPeriod::Weekly => format!("{:04}-W{:02}", parsed.year(), week_of_year(parsed)),
        StatsPeriod::Monthly => format!("{:04}-{:02}", parsed.year(), parsed.month()),
        StatsPeriod::Yearly => format!("{:04}", parsed.year()),
    }
}

/// Week 1 is the (possibly partial) week holding January 1st; weeks start on Sunday.
pub fn week_of_year(date: NaiveDate) -> u32 {
    let jan1_weekday = NaiveDate::from_ymd_opt(date.year(), 1, 1)
        .map(|jan1| jan1.weekday().num_days_from_sunday())
        .unwrap_or(0);
    let days = date.ordinal0();
    (days + jan1_weekday + 1).div_ceil(7)
}

pub fn group_by_period(reports: &[DailyReport], period: StatsPeriod) -> Vec<PeriodStat> {
    let mut tally = Tally::new();
    for report in reports {
        tally.add(period_key(&report.date, period), report.total_amount, report.total_count);
    }
    let mut rows = tally.rows;
    rows.sort_by(|a, b| b.0.cmp(&a.0));
    rows.into_iter()
        .map(|(period, amount, count)| PeriodStat { period, amount, count })
        .collect()
}

pub fn aggregate_platforms(reports: &[DailyReport]) -> Vec<PlatformStat> {
    let mut tally: Tally<PlatformType> = Tally::new();
    for entry in reports.iter().flat_map(|r| r.entries.iter()) {
        tally.add(entry.platform, entry.platform_total_amount, entry.platform_total_count);
    }
    tally
        .by_amount_desc()
        .into_iter()
        .map(|(platform, amount, count)| PlatformStat { platform, amount, count })
        .collect()
}

pub fn aggregate_menus(reports: &[DailyReport]) -> Vec<MenuStat> {
    let mut tally: Tally<String> = Tally::new();
    let sales = reports
        .iter()
        .flat_map(|r| r.entries.iter())
        .flat_map(|e| e.menu_sales.iter());
    for sale in sales {
        tally.add(sale.menu_name.clone(), sale.amount, sale.count);
    }
    tally
        .by_amount_desc()
        .into_iter()
        .map(|(menu_name, amount, count)| MenuStat { menu_name, amount, count })
        .collect()
}

pub fn month_sales(reports: &[DailyReport], year: i32, month: u32) -> f64 {
    reports
        .iter()
        .filter(|r| {
            report_date(&r.date)
                .map(|d| d.year() == year && d.month() == month)
                .unwrap_or(false)
        })
        .map(|r| r.total_amount)
        .sum()
}

/// Sales of the month containing `today` and of the month before it.
pub fn home_metrics(reports: &[DailyReport], today: NaiveDate) -> (f64, f64) {
    let (year, month) = (today.year(), today.month());
    let (prev_year, prev_month) = if month == 1 { (year - 1, 12) } else { (year, month - 1) };
    (
        month_sales(reports, year, month),
        month_sales(reports, prev_year, prev_month),
    )
}
