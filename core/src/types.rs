//! Shared primitive types used across the tally engine.

/// Code identifying an indicator, e.g. `"CHN-001"`.
pub type IndicatorCode = String;

/// Primary key of a stored indicator query.
pub type RowId = i64;

/// The canonical generation run identifier (uuid v4, hyphenated).
pub type RunId = String;

/// Preference key holding the generation checkpoint.
pub const LAST_PROCESSED_DATE_KEY: &str = "REPORT_LAST_PROCESSED_DATE";

/// Calendar-day format used for date keys and checkpoints.
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";
