//! Tally computation — one indicator query, bound to one day, turned into values.
//!
//! Both query shapes go through `TallyComputer::compute`:
//!   - Single:      one scalar aggregate; zero rows count as 0.
//!   - MultiResult: one row per sub-key; each row is its own value.
//!
//! Results are cached per date pass so indicators sharing a query text
//! execute it once. The cache is rebuilt for every date and its keys carry
//! the date, so a value is never served for a day it was not computed for.

use crate::{
    error::{TallyError, TallyResult},
    event_dates::DateKey,
    indicator::QueryKind,
    repository::{QueryRows, ReportRepository},
    tally::TallyValue,
};
use rusqlite::types::Value;
use std::collections::HashMap;

/// Placeholder replaced textually with the ISO date before execution.
pub const DATE_PLACEHOLDER: &str = "%s";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    sql:            String,
    multi_result:   bool,
    sub_key_column: Option<String>,
    date_key:       String,
}

impl CacheKey {
    fn new(kind: &QueryKind, date_key: &str) -> Self {
        let (multi_result, sub_key_column) = match kind {
            QueryKind::Single { .. } => (false, None),
            QueryKind::MultiResult { sub_key_column, .. } => (true, sub_key_column.clone()),
        };
        Self {
            sql: cache_sql(kind.sql()),
            multi_result,
            sub_key_column,
            date_key: date_key.to_string(),
        }
    }
}

/// Results already computed during the current date pass.
#[derive(Debug, Default)]
pub struct QueryExecutionCache {
    date_key: String,
    entries:  HashMap<CacheKey, Vec<TallyValue>>,
    hits:     u64,
    misses:   u64,
}

impl QueryExecutionCache {
    pub fn for_date(date_key: &str) -> Self {
        Self {
            date_key: date_key.to_string(),
            ..Self::default()
        }
    }

    pub fn date_key(&self) -> &str {
        &self.date_key
    }

    fn get(&mut self, key: &CacheKey) -> Option<Vec<TallyValue>> {
        if key.date_key != self.date_key {
            return None;
        }
        let found = self.entries.get(key).cloned();
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    fn insert(&mut self, key: CacheKey, values: Vec<TallyValue>) {
        if key.date_key == self.date_key {
            self.entries.insert(key, values);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

pub struct TallyComputer {
    cache:     QueryExecutionCache,
    use_cache: bool,
    hits:      u64,
    misses:    u64,
}

impl Default for TallyComputer {
    fn default() -> Self {
        Self::new()
    }
}

impl TallyComputer {
    pub fn new() -> Self {
        Self {
            cache:     QueryExecutionCache::default(),
            use_cache: true,
            hits:      0,
            misses:    0,
        }
    }

    /// A computer that executes every query, for comparing against cached runs.
    pub fn without_cache() -> Self {
        Self { use_cache: false, ..Self::new() }
    }

    /// Start a new date pass, discarding everything cached for the previous one.
    pub fn begin_date(&mut self, date: &DateKey) {
        self.hits += self.cache.hits();
        self.misses += self.cache.misses();
        self.cache = QueryExecutionCache::for_date(date.key());
    }

    /// Cache hits across every date pass so far.
    pub fn hits(&self) -> u64 {
        self.hits + self.cache.hits()
    }

    pub fn misses(&self) -> u64 {
        self.misses + self.cache.misses()
    }

    /// Compute the values of `kind` for `date`, reusing this pass's results when possible.
    pub fn compute<R: ReportRepository + ?Sized>(
        &mut self,
        repo: &R,
        indicator_code: &str,
        kind: &QueryKind,
        date: &DateKey,
    ) -> TallyResult<Vec<TallyValue>> {
        if !self.use_cache {
            return execute(repo, indicator_code, kind, date);
        }
        if self.cache.date_key() != date.key() {
            self.begin_date(date);
        }

        let key = CacheKey::new(kind, date.key());
        if let Some(values) = self.cache.get(&key) {
            log::debug!("date={} indicator={indicator_code}: cache hit", date.key());
            return Ok(values);
        }
        let values = execute(repo, indicator_code, kind, date)?;
        self.cache.insert(key, values.clone());
        Ok(values)
    }
}

/// Run `kind` against `date` without consulting any cache.
pub fn execute<R: ReportRepository + ?Sized>(
    repo: &R,
    indicator_code: &str,
    kind: &QueryKind,
    date: &DateKey,
) -> TallyResult<Vec<TallyValue>> {
    let query_error = |reason: String| TallyError::QueryExecution {
        indicator_code: indicator_code.to_string(),
        date:           date.key().to_string(),
        reason,
    };

    let sql = bind_date(kind.sql(), date.key());
    let rows = repo
        .raw_query(&sql, date.key())
        .map_err(|e| query_error(e.to_string()))?;

    let values = match kind {
        QueryKind::Single { .. } => single_value(rows).map(|v| vec![v]),
        QueryKind::MultiResult { sub_key_column, .. } => {
            multi_values(rows, sub_key_column.as_deref())
        }
    };
    values.map_err(query_error)
}

fn bind_date(template: &str, date_key: &str) -> String {
    template.replace(DATE_PLACEHOLDER, date_key)
}

fn single_value(mut rows: QueryRows) -> Result<TallyValue, String> {
    if rows.columns().len() != 1 {
        return Err(format!(
            "single-result query must return one column, got {}",
            rows.columns().len()
        ));
    }
    if rows.remaining() > 1 {
        return Err(format!(
            "single-result query must return at most one row, got {}",
            rows.remaining()
        ));
    }
    let value = match rows.next() {
        Some(row) => to_f64(&row[0])?,
        None => 0.0,
    };
    Ok(TallyValue { sub_key: None, value })
}

fn multi_values(rows: QueryRows, sub_key_column: Option<&str>) -> Result<Vec<TallyValue>, String> {
    if rows.columns().len() < 2 {
        return Err("multi-result query must return a sub-key column and a value column".into());
    }
    let key_idx = match sub_key_column {
        Some(name) => rows
            .column_index(name)
            .ok_or_else(|| format!("sub-key column '{name}' not in result"))?,
        None => 0,
    };
    let value_idx = if key_idx == 0 { 1 } else { 0 };

    rows.map(|row| {
        Ok(TallyValue {
            sub_key: sub_key_text(&row[key_idx])?,
            value:   to_f64(&row[value_idx])?,
        })
    })
    .collect()
}

fn to_f64(value: &Value) -> Result<f64, String> {
    match value {
        Value::Null => Ok(0.0),
        Value::Integer(i) => Ok(*i as f64),
        Value::Real(r) => Ok(*r),
        Value::Text(t) => t
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("non-numeric result '{t}'")),
        Value::Blob(_) => Err("blob result cannot be tallied".into()),
    }
}

fn sub_key_text(value: &Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Integer(i) => Ok(Some(i.to_string())),
        Value::Real(r) => Ok(Some(r.to_string())),
        Value::Text(t) => Ok(Some(t.clone())),
        Value::Blob(_) => Err("blob sub-key is not supported".into()),
    }
}

/// Cache identity of a query text: surrounding whitespace only.
/// Interior whitespace can be significant (line comments, quoted identifiers).
fn cache_sql(sql: &str) -> String {
    sql.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_identity_keeps_interior_whitespace() {
        assert_eq!(cache_sql("  select count(*) from ec_child\n"), "select count(*) from ec_child");
        assert_ne!(cache_sql("select 1 -- c\n + 1"), cache_sql("select 1 -- c + 1"));
        assert_ne!(cache_sql("select \"a  b\" from t"), cache_sql("select \"a b\" from t"));
    }

    #[test]
    fn numeric_conversion_widens_to_f64() {
        assert_eq!(to_f64(&Value::Integer(67)).unwrap(), 67.0);
        assert_eq!(to_f64(&Value::Real(2.5)).unwrap(), 2.5);
        assert_eq!(to_f64(&Value::Null).unwrap(), 0.0);
        assert_eq!(to_f64(&Value::Text("12".into())).unwrap(), 12.0);
        assert!(to_f64(&Value::Text("twelve".into())).is_err());
    }

    #[test]
    fn single_value_of_empty_result_is_zero() {
        let rows = QueryRows::new(vec!["count(*)".into()], Vec::new());
        assert_eq!(single_value(rows).unwrap(), TallyValue { sub_key: None, value: 0.0 });
    }

    #[test]
    fn single_value_rejects_multi_row_results() {
        let rows = QueryRows::new(
            vec!["n".into()],
            vec![vec![Value::Integer(1)], vec![Value::Integer(2)]],
        );
        assert!(single_value(rows).is_err());
    }

    #[test]
    fn multi_values_honour_named_sub_key_column() {
        let rows = QueryRows::new(
            vec!["total".into(), "gender".into()],
            vec![
                vec![Value::Integer(5), Value::Text("A".into())],
                vec![Value::Integer(9), Value::Text("B".into())],
            ],
        );
        let values = multi_values(rows, Some("gender")).unwrap();
        assert_eq!(
            values,
            vec![
                TallyValue { sub_key: Some("A".into()), value: 5.0 },
                TallyValue { sub_key: Some("B".into()), value: 9.0 },
            ]
        );
    }

    #[test]
    fn date_placeholder_is_substituted() {
        assert_eq!(
            bind_date("select count(*) from event where day = '%s'", "2019-07-01"),
            "select count(*) from event where day = '2019-07-01'"
        );
    }
}
