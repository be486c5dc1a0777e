use super::ReportStore;
use crate::{error::TallyResult, types::LAST_PROCESSED_DATE_KEY};
use rusqlite::{params, OptionalExtension};

impl ReportStore {
    // ── Preferences ────────────────────────────────────────────

    pub fn preference(&self, key: &str) -> TallyResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM preference WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn save_preference(&self, key: &str, value: &str) -> TallyResult<()> {
        self.conn.execute(
            "INSERT INTO preference (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn last_processed_date(&self) -> TallyResult<Option<String>> {
        self.preference(LAST_PROCESSED_DATE_KEY)
    }

    pub fn save_last_processed_date(&self, date_key: &str) -> TallyResult<()> {
        self.save_preference(LAST_PROCESSED_DATE_KEY, date_key)
    }
}
