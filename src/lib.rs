pub mod config;
pub mod dashboard;
pub mod display;
pub mod error;
pub mod market_data;
pub mod search;
pub mod telemetry;
