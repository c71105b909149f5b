pub mod commands;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use db::{Database, KeyValueStore, MemoryStore};
pub use error::{LedgerError, Result};
pub use services::normalizer::Normalizer;
pub use services::state::AppState;
