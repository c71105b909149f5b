pub mod dashboard;
pub mod reports;
pub mod settings;
pub mod storage;
