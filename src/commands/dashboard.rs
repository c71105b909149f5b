use crate::models::{DashboardStats, StatsPeriod};
use crate::services::state::AppState;
use crate::utils::today;
use chrono::NaiveDate;

/// Stats for the dashboard. `period` defaults to monthly, `today` to the
/// current date.
pub fn get_dashboard_stats(
    period: Option<String>,
    today_override: Option<String>,
    state: &AppState,
) -> Result<DashboardStats, String> {
    let period = match period {
        Some(raw) => raw.parse::<StatsPeriod>().map_err(|e| e.to_string())?,
        None => StatsPeriod::Monthly,
    };
    let day = today_override.unwrap_or_else(today);
    let day = NaiveDate::parse_from_str(day.trim(), "%Y-%m-%d").map_err(|_| format!("Invalid date: {}", day))?;

    state.dashboard(period, day).map_err(|e| e.to_string())
}
