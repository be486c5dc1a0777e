//! The storage contract the tally generator is written against.
//!
//! RULE: The generator and tally computer never touch SQL directly.
//! ReportStore is the production implementation; tests may wrap it
//! to observe or fail individual calls.

use crate::{
    error::TallyResult,
    indicator::IndicatorQuery,
    tally::CompositeIndicatorTally,
    types::{RowId, RunId},
};
use rusqlite::types::Value;
use std::collections::BTreeMap;

pub trait ReportRepository {
    /// Every stored indicator query, keyed by row id.
    fn all_indicator_queries(&self) -> TallyResult<BTreeMap<RowId, IndicatorQuery>>;

    /// Earliest `event_date` in the operational event store, as stored.
    fn earliest_event_date(&self) -> TallyResult<Option<String>>;

    /// Execute a read-only statement, binding `:date` when declared.
    fn raw_query(&self, sql: &str, date_key: &str) -> TallyResult<QueryRows>;

    /// Insert or replace the tally identified by (code, date, sub-key).
    fn add_tally(&self, tally: &CompositeIndicatorTally) -> TallyResult<()>;

    fn last_processed_date(&self) -> TallyResult<Option<String>>;

    fn save_last_processed_date(&self, date_key: &str) -> TallyResult<()>;

    fn record_generation_run(&self, run: &GenerationRun) -> TallyResult<()>;
}

/// A finished (or aborted) generation run, as written to the run ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRun {
    pub run_id:      RunId,
    pub started_at:  String,
    pub finished_at: String,
    pub first_date:  Option<String>,
    pub last_date:   Option<String>,
    pub status:      RunStatus,
    pub attempted:   u64,
    pub failed:      u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed    => "failed",
        }
    }
}

/// Rows returned by a raw query. Consumed once, front to back.
#[derive(Debug)]
pub struct QueryRows {
    columns: Vec<String>,
    rows:    std::vec::IntoIter<Vec<Value>>,
}

impl QueryRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows: rows.into_iter() }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Rows not yet consumed.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl Iterator for QueryRows {
    type Item = Vec<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for QueryRows {}
