//! Indicator definitions: the query template behind each indicator and the
//! display record shown next to its tallies.

use crate::{
    error::{TallyError, TallyResult},
    types::{IndicatorCode, RowId},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorQuery {
    /// Row id; `None` until the query has been stored.
    pub id:             Option<RowId>,
    pub query:          String,
    pub indicator_code: IndicatorCode,
    pub db_version:     u32,
    pub multi_result:   bool,
    /// Column holding the sub-key for multi-result queries.
    /// Column 0 is used when unset.
    pub sub_key_column: Option<String>,
}

impl IndicatorQuery {
    pub fn new(indicator_code: &str, query: &str) -> Self {
        Self {
            id:             None,
            query:          query.to_string(),
            indicator_code: indicator_code.to_string(),
            db_version:     1,
            multi_result:   false,
            sub_key_column: None,
        }
    }

    pub fn multi_result(mut self, sub_key_column: Option<&str>) -> Self {
        self.multi_result = true;
        self.sub_key_column = sub_key_column.map(str::to_string);
        self
    }

    pub fn with_version(mut self, db_version: u32) -> Self {
        self.db_version = db_version;
        self
    }

    /// Resolve the execution shape. Fails when the code or query text is blank.
    pub fn kind(&self) -> TallyResult<QueryKind> {
        if self.indicator_code.trim().is_empty() {
            return Err(TallyError::Configuration {
                indicator_code: self.indicator_code.clone(),
                reason: "indicator code is empty".into(),
            });
        }
        if self.query.trim().is_empty() {
            return Err(TallyError::Configuration {
                indicator_code: self.indicator_code.clone(),
                reason: "query text is empty".into(),
            });
        }
        let sql = self.query.clone();
        Ok(if self.multi_result {
            QueryKind::MultiResult {
                sql,
                sub_key_column: self.sub_key_column.clone().filter(|c| !c.trim().is_empty()),
            }
        } else {
            QueryKind::Single { sql }
        })
    }
}

/// How a query's rows turn into tallies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// One scalar aggregate for the date.
    Single { sql: String },
    /// One row per sub-dimension value; each row becomes its own tally.
    MultiResult {
        sql:            String,
        sub_key_column: Option<String>,
    },
}

impl QueryKind {
    pub fn sql(&self) -> &str {
        match self {
            QueryKind::Single { sql } | QueryKind::MultiResult { sql, .. } => sql,
        }
    }
}

/// Display definition of an indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportIndicator {
    pub id:             Option<RowId>,
    pub key:            String,
    pub description:    String,
    pub indicator_code: IndicatorCode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_query_resolves_to_single_kind() {
        let q = IndicatorQuery::new("1234", "select count(*) from ec_child");
        assert_eq!(
            q.kind().unwrap(),
            QueryKind::Single { sql: "select count(*) from ec_child".into() }
        );
    }

    #[test]
    fn multi_result_keeps_sub_key_column() {
        let q = IndicatorQuery::new("G-01", "select gender, count(*) from person group by gender")
            .multi_result(Some("gender"));
        match q.kind().unwrap() {
            QueryKind::MultiResult { sub_key_column, .. } => {
                assert_eq!(sub_key_column.as_deref(), Some("gender"));
            }
            other => panic!("expected multi-result, got {other:?}"),
        }
    }

    #[test]
    fn blank_code_or_query_is_a_configuration_error() {
        let no_code = IndicatorQuery::new("  ", "select 1");
        assert!(matches!(no_code.kind(), Err(TallyError::Configuration { .. })));

        let no_query = IndicatorQuery::new("X", "");
        assert!(matches!(no_query.kind(), Err(TallyError::Configuration { .. })));
    }
}
