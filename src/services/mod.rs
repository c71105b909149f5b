pub mod aggregator;
pub mod consolidator;
pub mod import;
pub mod normalizer;
pub mod scanner;
pub mod settlement;
pub mod state;
