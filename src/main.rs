use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use sales_ledger::commands;
use sales_ledger::commands::reports::{MenuRowPayload, PlatformEntryPayload};
use sales_ledger::commands::settings::PlatformSettingsPayload;
use sales_ledger::db::{Database, MemoryStore};
use sales_ledger::services::state::{AppState, SharedStore};

#[derive(Parser)]
#[command(name = "ledger", about = "Daily sales ledger with legacy data recovery")]
struct Cli {
    /// SQLite file holding the storage slots
    #[arg(long, env = "SALES_LEDGER_DB", default_value = "sales-ledger.sqlite")]
    db: PathBuf,

    /// Use an empty in-memory store instead of the database file
    #[arg(long)]
    memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rescan every slot and consolidate the report set
    Scan,
    /// Print the canonical report set
    List,
    /// Dashboard statistics
    Stats {
        #[arg(long, default_value = "monthly")]
        period: String,
        /// Reference day for the month totals (YYYY-MM-DD)
        #[arg(long)]
        today: Option<String>,
    },
    /// Import a JSON backup file
    Import { file: PathBuf },
    /// Import every JSON file in a folder
    ImportFolder { dir: PathBuf },
    /// Write a storage dump (object of key to value) into the store and rescan
    RestoreSlots { file: PathBuf },
    /// Empty the report set
    Reset,
    #[command(subcommand)]
    Draft(DraftCommand),
    /// Commit the draft as a report
    Finalize,
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand)]
enum DraftCommand {
    Show,
    /// Save a platform entry; each menu is NAME=COUNT:AMOUNT
    Entry {
        platform: String,
        #[arg(required = true)]
        menus: Vec<String>,
    },
    Memo { memo: String },
    Date { date: String },
}

#[derive(Subcommand)]
enum SettingsCommand {
    Show,
    AddMenu { name: String },
    RemoveMenu { name: String },
    FeeRate { platform: String, rate: f64 },
    Rename { platform: String, name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sales_ledger=info,ledger=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let store: SharedStore = if cli.memory {
        Box::new(MemoryStore::new())
    } else {
        Box::new(Database::new(cli.db.clone()).map_err(|e| anyhow!("Open {}: {}", cli.db.display(), e))?)
    };
    let state = AppState::load(store)?;

    match cli.command {
        Command::Scan => print(commands::storage::scan_storage(&state)),
        Command::List => print(commands::reports::list_reports(&state)),
        Command::Stats { period, today } => {
            print(commands::dashboard::get_dashboard_stats(Some(period), today, &state))
        }
        Command::Import { file } => print(
            commands::reports::import_report_file(file.to_string_lossy().to_string(), &state).await,
        ),
        Command::ImportFolder { dir } => print(
            commands::reports::import_report_folder(dir.to_string_lossy().to_string(), &state).await,
        ),
        Command::RestoreSlots { file } => print(
            commands::storage::restore_slots(file.to_string_lossy().to_string(), &state).await,
        ),
        Command::Reset => print(commands::storage::reset_reports(&state)),
        Command::Draft(draft) => match draft {
            DraftCommand::Show => print(commands::reports::get_draft(&state)),
            DraftCommand::Entry { platform, menus } => {
                let menus = menus
                    .iter()
                    .map(|arg| parse_menu_arg(arg))
                    .collect::<Result<Vec<_>>>()?;
                print(commands::reports::save_platform_entry(
                    PlatformEntryPayload { platform, menus },
                    &state,
                ))
            }
            DraftCommand::Memo { memo } => print(commands::reports::set_draft_memo(memo, &state)),
            DraftCommand::Date { date } => print(commands::reports::set_draft_date(date, &state)),
        },
        Command::Finalize => print(commands::reports::finalize_settlement(&state)),
        Command::Settings(settings) => match settings {
            SettingsCommand::Show => print(commands::settings::get_settings(&state)),
            SettingsCommand::AddMenu { name } => print(commands::settings::add_menu(name, &state)),
            SettingsCommand::RemoveMenu { name } => print(commands::settings::remove_menu(name, &state)),
            SettingsCommand::FeeRate { platform, rate } => print(commands::settings::save_platform_settings(
                PlatformSettingsPayload {
                    platform,
                    fee_rate: Some(rate),
                    name: None,
                },
                &state,
            )),
            SettingsCommand::Rename { platform, name } => print(commands::settings::save_platform_settings(
                PlatformSettingsPayload {
                    platform,
                    fee_rate: None,
                    name: Some(name),
                },
                &state,
            )),
        },
    }
}

fn print<T: Serialize>(result: std::result::Result<T, String>) -> Result<()> {
    let value = result.map_err(|e| anyhow!(e))?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// `국밥=5:30000` or `국밥=5:30,000`; count and amount are kept as typed.
fn parse_menu_arg(arg: &str) -> Result<MenuRowPayload> {
    let (menu_name, rest) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected NAME=COUNT:AMOUNT, got {}", arg))?;
    let (count, amount) = rest.split_once(':').unwrap_or((rest, ""));
    Ok(MenuRowPayload {
        menu_name: menu_name.trim().to_string(),
        count: count.to_string(),
        amount: amount.to_string(),
    })
}
