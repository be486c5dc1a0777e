//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! The generator and tally computer go through ReportRepository.

use crate::{
    error::{TallyError, TallyResult},
    indicator::IndicatorQuery,
    repository::{GenerationRun, QueryRows, ReportRepository},
    tally::CompositeIndicatorTally,
    types::RowId,
};
use rusqlite::{params, types::Value, Connection};
use std::collections::BTreeMap;

mod daily_tally;
mod indicator_query;
mod preference;
mod report_indicator;

pub use indicator_query::SeedReport;

pub struct ReportStore {
    conn: Connection,
}

impl ReportStore {
    pub fn open(path: &str) -> TallyResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> TallyResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order. Safe to call on an existing database.
    pub fn migrate(&self) -> TallyResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_indicators.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_daily_tallies.sql"))?;
        Ok(())
    }

    /// Run host-supplied DDL/DML, e.g. creating and filling operational tables.
    pub fn execute_batch(&self, sql: &str) -> TallyResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn insert_event(
        &self,
        base_entity_id: &str,
        event_type: &str,
        event_date: &str,
    ) -> TallyResult<()> {
        self.conn.execute(
            "INSERT INTO event (base_entity_id, event_type, event_date) VALUES (?1, ?2, ?3)",
            params![base_entity_id, event_type, event_date],
        )?;
        Ok(())
    }

    pub fn earliest_event_date(&self) -> TallyResult<Option<String>> {
        let earliest: Option<String> =
            self.conn
                .query_row("SELECT MIN(event_date) FROM event", [], |row| row.get(0))?;
        Ok(earliest)
    }

    // ── Raw queries ────────────────────────────────────────────

    /// Execute a read-only statement and collect its rows.
    /// `:date` is bound to `date_key` when the statement declares it.
    pub fn raw_query(&self, sql: &str, date_key: &str) -> TallyResult<QueryRows> {
        let mut stmt = self.conn.prepare(sql)?;
        if !stmt.readonly() {
            return Err(TallyError::Other(anyhow::anyhow!(
                "refusing to run a statement that writes: {sql}"
            )));
        }
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        if let Some(idx) = stmt.parameter_index(":date")? {
            stmt.raw_bind_parameter(idx, date_key)?;
        }

        let mut rows = stmt.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..columns.len())
                .map(|i| row.get::<_, Value>(i))
                .collect::<Result<Vec<_>, _>>()?;
            out.push(values);
        }
        Ok(QueryRows::new(columns, out))
    }

    // ── Run ledger ─────────────────────────────────────────────

    pub fn insert_generation_run(&self, run: &GenerationRun) -> TallyResult<()> {
        self.conn.execute(
            "INSERT INTO generation_run
                (run_id, started_at, finished_at, first_date, last_date, status, attempted, failed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run.run_id,
                run.started_at,
                run.finished_at,
                run.first_date,
                run.last_date,
                run.status.as_str(),
                run.attempted as i64,
                run.failed as i64,
            ],
        )?;
        Ok(())
    }

    /// `(run_id, status, last_date)` of every recorded run, oldest first.
    pub fn generation_runs(&self) -> TallyResult<Vec<(String, String, Option<String>)>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, status, last_date FROM generation_run ORDER BY started_at ASC, rowid ASC",
        )?;
        let runs = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }
}

impl ReportRepository for ReportStore {
    fn all_indicator_queries(&self) -> TallyResult<BTreeMap<RowId, IndicatorQuery>> {
        ReportStore::all_indicator_queries(self)
    }

    fn earliest_event_date(&self) -> TallyResult<Option<String>> {
        ReportStore::earliest_event_date(self)
    }

    fn raw_query(&self, sql: &str, date_key: &str) -> TallyResult<QueryRows> {
        ReportStore::raw_query(self, sql, date_key)
    }

    fn add_tally(&self, tally: &CompositeIndicatorTally) -> TallyResult<()> {
        ReportStore::add_tally(self, tally).map_err(TallyError::into_storage)
    }

    fn last_processed_date(&self) -> TallyResult<Option<String>> {
        ReportStore::last_processed_date(self)
    }

    fn save_last_processed_date(&self, date_key: &str) -> TallyResult<()> {
        ReportStore::save_last_processed_date(self, date_key).map_err(TallyError::into_storage)
    }

    fn record_generation_run(&self, run: &GenerationRun) -> TallyResult<()> {
        self.insert_generation_run(run)
    }
}
