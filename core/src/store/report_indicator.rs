use super::ReportStore;
use crate::{error::TallyResult, indicator::ReportIndicator, types::RowId};
use rusqlite::params;

impl ReportStore {
    // ── Report indicators ──────────────────────────────────────

    pub fn add_report_indicator(&self, indicator: &mut ReportIndicator) -> TallyResult<RowId> {
        self.conn.execute(
            "INSERT INTO indicators (indicator_key, description, indicator_code)
             VALUES (?1, ?2, ?3)",
            params![indicator.key, indicator.description, indicator.indicator_code],
        )?;
        let id = self.conn.last_insert_rowid();
        indicator.id = Some(id);
        Ok(id)
    }

    pub fn report_indicators(&self) -> TallyResult<Vec<ReportIndicator>> {
        let mut stmt = self.conn.prepare(
            "SELECT _id, indicator_key, description, indicator_code
             FROM indicators ORDER BY _id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ReportIndicator {
                id:             Some(row.get(0)?),
                key:            row.get(1)?,
                description:    row.get(2)?,
                indicator_code: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub(super) fn report_indicator_exists(&self, key: &str) -> TallyResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM indicators WHERE indicator_key = ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
