//! Incremental daily tally generation for reporting indicators.
//!
//! Indicator queries are stored in a catalog, evaluated once per calendar day
//! since the last checkpoint, and the resulting tallies are upserted into a
//! per-day table for dashboards to read.

pub mod clock;
pub mod config;
pub mod error;
pub mod event_dates;
pub mod generator;
pub mod indicator;
pub mod repository;
pub mod store;
pub mod tally;
pub mod tally_computer;
pub mod types;
