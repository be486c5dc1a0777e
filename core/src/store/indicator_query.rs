use super::ReportStore;
use crate::{
    config::IndicatorDefinitions,
    error::TallyResult,
    indicator::{IndicatorQuery, ReportIndicator},
    types::RowId,
};
use rusqlite::{params, OptionalExtension};
use std::collections::BTreeMap;

/// What `seed_indicator_definitions` did with each definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted:  usize,
    pub replaced:  usize,
    pub unchanged: usize,
    pub skipped:   usize,
}

impl ReportStore {
    // ── Indicator queries ──────────────────────────────────────

    /// Insert a query definition and record its row id on `query`.
    /// Does not deduplicate by indicator code.
    pub fn add_indicator_query(&self, query: &mut IndicatorQuery) -> TallyResult<RowId> {
        self.conn.execute(
            "INSERT INTO indicator_queries
                (indicator_query, indicator_code, db_version, multi_result, sub_key_column)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                query.query,
                query.indicator_code,
                query.db_version,
                query.multi_result as i32,
                query.sub_key_column,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        query.id = Some(id);
        Ok(id)
    }

    pub fn all_indicator_queries(&self) -> TallyResult<BTreeMap<RowId, IndicatorQuery>> {
        let mut stmt = self.conn.prepare(
            "SELECT _id, indicator_query, indicator_code, db_version, multi_result, sub_key_column
             FROM indicator_queries ORDER BY _id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let id: RowId = row.get(0)?;
            Ok((
                id,
                IndicatorQuery {
                    id:             Some(id),
                    query:          row.get(1)?,
                    indicator_code: row.get(2)?,
                    db_version:     row.get(3)?,
                    multi_result:   row.get::<_, i32>(4)? != 0,
                    sub_key_column: row.get(5)?,
                },
            ))
        })?;
        rows.collect::<Result<BTreeMap<_, _>, _>>().map_err(Into::into)
    }

    /// Query text of the first definition stored for `indicator_code`, or `""` if none.
    pub fn find_query_by_indicator_code(&self, indicator_code: &str) -> TallyResult<String> {
        let query: Option<String> = self
            .conn
            .query_row(
                "SELECT indicator_query FROM indicator_queries
                 WHERE indicator_code = ?1 ORDER BY _id ASC LIMIT 1",
                params![indicator_code],
                |row| row.get(0),
            )
            .optional()?;
        Ok(query.unwrap_or_default())
    }

    fn delete_indicator_queries(&self, indicator_code: &str) -> TallyResult<usize> {
        let n = self.conn.execute(
            "DELETE FROM indicator_queries WHERE indicator_code = ?1",
            params![indicator_code],
        )?;
        Ok(n)
    }

    /// `(row count, highest db_version)` stored for `indicator_code`.
    fn stored_versions(&self, indicator_code: &str) -> TallyResult<(i64, Option<u32>)> {
        let versions = self.conn.query_row(
            "SELECT COUNT(*), MAX(db_version) FROM indicator_queries WHERE indicator_code = ?1",
            params![indicator_code],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(versions)
    }

    // ── Seeding ────────────────────────────────────────────────

    /// Load definitions into the catalog.
    ///
    /// - Blank code or query: logged and skipped.
    /// - Code not stored yet: inserted.
    /// - Stored with a lower db_version: old rows replaced.
    /// - Otherwise left as stored.
    ///
    /// Report indicators are inserted when their key is new.
    pub fn seed_indicator_definitions(&self, defs: &IndicatorDefinitions) -> TallyResult<SeedReport> {
        let tx = self.conn.unchecked_transaction()?;
        let mut report = SeedReport::default();

        for def in &defs.indicators {
            let mut query = def.to_query(defs.db_version);
            if let Err(e) = query.kind() {
                log::warn!("seed: skipping definition '{}': {e}", def.key);
                report.skipped += 1;
                continue;
            }

            match self.stored_versions(&query.indicator_code)? {
                (0, _) => {
                    self.add_indicator_query(&mut query)?;
                    report.inserted += 1;
                }
                (_, Some(stored)) if stored < query.db_version => {
                    let removed = self.delete_indicator_queries(&query.indicator_code)?;
                    self.add_indicator_query(&mut query)?;
                    log::info!(
                        "seed: {} upgraded v{stored} -> v{} ({removed} row(s) replaced)",
                        query.indicator_code,
                        query.db_version
                    );
                    report.replaced += 1;
                }
                _ => report.unchanged += 1,
            }

            if !def.key.trim().is_empty() && !self.report_indicator_exists(&def.key)? {
                self.add_report_indicator(&mut ReportIndicator {
                    id:             None,
                    key:            def.key.clone(),
                    description:    def.description.clone(),
                    indicator_code: def.indicator_code.clone(),
                })?;
            }
        }

        tx.commit()?;
        log::info!(
            "seed: {} inserted, {} replaced, {} unchanged, {} skipped",
            report.inserted,
            report.replaced,
            report.unchanged,
            report.skipped
        );
        Ok(report)
    }
}
