use super::ReportStore;
use crate::{
    error::TallyResult,
    tally::{CompositeIndicatorTally, DailyTallies},
};
use rusqlite::params;
use std::collections::BTreeMap;

impl ReportStore {
    // ── Daily tallies ──────────────────────────────────────────

    /// Insert a tally, replacing the value of any tally with the same
    /// (indicator code, date, sub-key).
    pub fn add_tally(&self, tally: &CompositeIndicatorTally) -> TallyResult<()> {
        self.conn.execute(
            "INSERT INTO indicator_daily_tally
                 (indicator_code, day, has_sub_key, sub_key, indicator_value)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (indicator_code, day, has_sub_key, sub_key)
             DO UPDATE SET indicator_value = excluded.indicator_value",
            params![
                tally.indicator_code,
                tally.date,
                tally.sub_key.is_some(),
                tally.sub_key.as_deref().unwrap_or(""),
                tally.value,
            ],
        )?;
        Ok(())
    }

    /// Stored tallies grouped by day, oldest day first.
    pub fn indicators_daily_tallies(&self) -> TallyResult<Vec<DailyTallies>> {
        let mut stmt = self.conn.prepare(
            "SELECT indicator_code, day, has_sub_key, sub_key, indicator_value
             FROM indicator_daily_tally
             ORDER BY day ASC, indicator_code ASC, has_sub_key ASC, sub_key ASC",
        )?;
        let tallies = stmt
            .query_map([], |row| {
                let has_sub_key: bool = row.get(2)?;
                let sub_key: String = row.get(3)?;
                Ok(CompositeIndicatorTally {
                    indicator_code: row.get(0)?,
                    date:           row.get(1)?,
                    sub_key:        has_sub_key.then_some(sub_key),
                    value:          row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut days: Vec<DailyTallies> = Vec::new();
        for tally in tallies {
            match days.last_mut() {
                Some(day) if day.date == tally.date => {
                    day.tallies.insert(tally.key(), tally);
                }
                _ => {
                    let date = tally.date.clone();
                    let mut group = BTreeMap::new();
                    group.insert(tally.key(), tally);
                    days.push(DailyTallies { date, tallies: group });
                }
            }
        }
        Ok(days)
    }

    pub fn tally_count(&self) -> TallyResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM indicator_daily_tally",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
