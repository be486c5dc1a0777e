//! Computed tallies and their grouped read model.

use crate::types::IndicatorCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One computed value for an indicator on one day, optionally split by sub-key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeIndicatorTally {
    pub indicator_code: IndicatorCode,
    /// ISO calendar day, `YYYY-MM-DD`.
    pub date:           String,
    pub sub_key:        Option<String>,
    pub value:          f64,
}

impl CompositeIndicatorTally {
    pub fn key(&self) -> TallyKey {
        TallyKey {
            indicator_code: self.indicator_code.clone(),
            sub_key:        self.sub_key.clone(),
        }
    }
}

/// A raw result produced by the tally computer before it is bound to an indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct TallyValue {
    pub sub_key: Option<String>,
    pub value:   f64,
}

/// Identifies a tally within one day.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TallyKey {
    pub indicator_code: IndicatorCode,
    pub sub_key:        Option<String>,
}

/// Every stored tally for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyTallies {
    pub date:    String,
    pub tallies: BTreeMap<TallyKey, CompositeIndicatorTally>,
}

impl DailyTallies {
    /// Single-result tally for `indicator_code`.
    pub fn get(&self, indicator_code: &str) -> Option<&CompositeIndicatorTally> {
        self.get_sub(indicator_code, None)
    }

    pub fn get_sub(
        &self,
        indicator_code: &str,
        sub_key: Option<&str>,
    ) -> Option<&CompositeIndicatorTally> {
        self.tallies.get(&TallyKey {
            indicator_code: indicator_code.to_string(),
            sub_key:        sub_key.map(str::to_string),
        })
    }

    /// All tallies for `indicator_code`, sub-keys in ascending order.
    pub fn for_indicator<'a>(
        &'a self,
        indicator_code: &'a str,
    ) -> impl Iterator<Item = &'a CompositeIndicatorTally> + 'a {
        self.tallies
            .values()
            .filter(move |t| t.indicator_code == indicator_code)
    }
}
