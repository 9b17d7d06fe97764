pub mod cache;
pub mod config;
pub mod documents;
pub mod error;
pub mod loans;
pub mod telemetry;
