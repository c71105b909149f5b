use serde_json::json;

use sales_ledger::db::{KeyValueStore, MemoryStore, CONFIG_PLATFORMS_KEY, DRAFT_KEY, REPORTS_KEY};
use sales_ledger::models::{DailyReport, PlatformType, StatsPeriod};
use sales_ledger::services::consolidator::consolidate;
use sales_ledger::services::settlement::MenuInput;
use sales_ledger::{AppState, Database, Normalizer};

fn legacy_store() -> MemoryStore {
    let canonical = json!([{
        "id": "abc", "date": "2024-03-10", "totalAmount": 100, "totalCount": 1,
        "memo": "", "createdAt": 1_700_000_000_000_i64,
        "entries": [{"platform": "STORE", "menuSales": [], "platformTotalAmount": 100,
                     "platformTotalCount": 1, "feeAmount": 0, "settlementAmount": 100}]
    }]);
    MemoryStore::with_slots([
        (REPORTS_KEY, canonical.to_string()),
        (
            "kh_ledger_v12",
            json!([
                {"id": "abc", "date": "2024-03-10", "amount": 4200, "platform": "배민"},
                {"date": "2024-03-15T10:00:00Z", "amount": "12000", "platform": "baemin"},
                {"date": "someday", "amount": 1},
                {"amount": 1}
            ])
            .to_string(),
        ),
        ("sales_backup", json!({"dt": "2024/02/01", "amt": 5000, "cnt": 3}).to_string()),
        ("ui_theme", "dark".to_string()),
    ])
}

#[test]
fn consolidation_is_idempotent() {
    let mut store = legacy_store();
    let first = consolidate(&mut store, &Normalizer::new().unwrap()).unwrap();
    let second = consolidate(&mut store, &Normalizer::new().unwrap()).unwrap();
    assert_eq!(first.reports, second.reports);
    assert_eq!(first.reports.len(), 3);
}

#[test]
fn legacy_record_replaces_canonical_with_same_id() {
    let state = AppState::load(Box::new(legacy_store())).unwrap();
    let reports = state.reports().unwrap();
    let shared: Vec<&DailyReport> = reports.iter().filter(|r| r.id == "abc").collect();
    assert_eq!(shared.len(), 1);
    assert_eq!(shared[0].total_amount, 4200.0);
    assert_eq!(shared[0].entries[0].platform, PlatformType::Baemin);
    // the legacy copy carried no createdAt
    assert_eq!(shared[0].created_at, 1_700_000_000_000);
}

#[test]
fn recovered_set_is_sorted_with_valid_dates() {
    let state = AppState::load(Box::new(legacy_store())).unwrap();
    let dates: Vec<String> = state.reports().unwrap().into_iter().map(|r| r.date).collect();
    assert_eq!(dates, vec!["2024-03-15", "2024-03-10", "2024-02-01"]);

    let reports = state.reports().unwrap();
    let aggregate_only = &reports[2];
    assert_eq!(aggregate_only.total_amount, 5000.0);
    assert_eq!(aggregate_only.total_count, 3.0);
    assert_eq!(aggregate_only.entries.len(), 1);
    assert_eq!(aggregate_only.entries[0].platform_total_amount, 5000.0);
    assert_eq!(aggregate_only.entries[0].platform_total_count, 3.0);
    assert_eq!(aggregate_only.memo, "복원됨 (sales_backup)");
}

#[test]
fn platform_totals_match_report_totals() {
    let state = AppState::load(Box::new(legacy_store())).unwrap();
    let day = chrono::NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
    let stats = state.dashboard(StatsPeriod::Yearly, day).unwrap();
    let by_platform: f64 = stats.platforms.iter().map(|p| p.amount).sum();
    let by_report: f64 = state.reports().unwrap().iter().map(|r| r.total_amount).sum();
    assert_eq!(by_platform, by_report);
    assert_eq!(stats.periods.len(), 1);
    assert_eq!(stats.periods[0].period, "2024");
    assert_eq!(stats.current_month_sales, 16200.0);
    assert_eq!(stats.previous_month_sales, 5000.0);
}

#[test]
fn draft_survives_restart_on_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.sqlite");

    {
        let state = AppState::load(Box::new(Database::new(path.clone()).unwrap())).unwrap();
        state.set_fee_rate(PlatformType::Baemin, 0.068).unwrap();
        state.set_draft_date("2024-03-15").unwrap();
        state
            .save_platform_entry(
                PlatformType::Baemin,
                &[
                    MenuInput::from_form("닭강정", "0", "0"),
                    MenuInput::from_form("국밥", "5", "30000"),
                ],
            )
            .unwrap();
    }

    let db = Database::new(path.clone()).unwrap();
    assert!(db.get(DRAFT_KEY).unwrap().is_some());
    assert!(db.get(CONFIG_PLATFORMS_KEY).unwrap().is_some());

    let state = AppState::load(Box::new(db)).unwrap();
    let draft = state.draft().unwrap();
    assert_eq!(draft.date, "2024-03-15");
    assert_eq!(draft.entries.len(), 1);
    assert_eq!(draft.entries[0].fee_amount, 2040.0);
    assert_eq!(draft.entries[0].settlement_amount, 27960.0);
    assert!(state.reports().unwrap().is_empty());

    let report = state.finalize_settlement().unwrap();
    assert_eq!(report.total_amount, 30000.0);

    let reopened = AppState::load(Box::new(Database::new(path).unwrap())).unwrap();
    assert_eq!(reopened.reports().unwrap(), vec![report]);
    assert!(reopened.draft().unwrap().entries.is_empty());
}

#[tokio::test]
async fn folder_import_reports_failures_and_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("a_backup.json"),
        json!({"reports": [{"date": "2024-04-01", "amount": 700}, {"date": "2024-04-02", "amount": 300}]})
            .to_string(),
    )
    .unwrap();
    std::fs::write(dir.path().join("b_broken.json"), "{\"reports\": [").unwrap();
    std::fs::write(dir.path().join("readme.md"), "# notes").unwrap();

    let state = AppState::load(Box::new(MemoryStore::new())).unwrap();
    let summary = state.import_folder(dir.path()).await.unwrap();
    assert_eq!(summary.imported.len(), 1);
    assert_eq!(summary.imported[0].imported, 2);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].source, "b_broken.json");
    assert_eq!(state.reports().unwrap().len(), 2);

    state.import_folder(dir.path()).await.unwrap();
    assert_eq!(state.reports().unwrap().len(), 2);

    assert!(state.import_folder(&dir.path().join("missing")).await.is_err());
}
