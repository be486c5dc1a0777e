use crate::indicator::IndicatorQuery;
use serde::{Deserialize, Serialize};

/// One indicator as written in the definitions file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorDefinition {
    pub key: String,
    #[serde(default)]
    pub description: String,
    pub indicator_code: String,
    pub query: String,
    #[serde(default)]
    pub multi_result: bool,
    #[serde(default)]
    pub sub_key_column: Option<String>,
}

impl IndicatorDefinition {
    pub fn to_query(&self, db_version: u32) -> IndicatorQuery {
        IndicatorQuery {
            id:             None,
            query:          self.query.clone(),
            indicator_code: self.indicator_code.clone(),
            db_version,
            multi_result:   self.multi_result,
            sub_key_column: self.sub_key_column.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorDefinitions {
    /// Bumping this replaces stored queries on the next seed.
    pub db_version: u32,
    pub indicators: Vec<IndicatorDefinition>,
}

/// When a run moves the checkpoint forward.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointPolicy {
    /// Advance past the range even if some (date, indicator) pairs failed.
    /// Failed pairs are not revisited by later runs.
    #[default]
    AdvanceAlways,
    /// Hold the checkpoint back unless every pair succeeded.
    AdvanceOnFullSuccess,
}

impl std::str::FromStr for CheckpointPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "advance_always" => Ok(CheckpointPolicy::AdvanceAlways),
            "advance_on_full_success" => Ok(CheckpointPolicy::AdvanceOnFullSuccess),
            other => Err(format!("unknown checkpoint policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub checkpoint_policy: CheckpointPolicy,
}

#[derive(Debug, Clone, Deserialize)]
struct DefinitionsFile {
    db_version: u32,
    #[serde(default)]
    generator: GeneratorConfig,
    indicators: Vec<IndicatorDefinition>,
}

#[derive(Debug, Clone)]
pub struct ReportingConfig {
    pub definitions: IndicatorDefinitions,
    pub generator:   GeneratorConfig,
}

impl ReportingConfig {
    /// Load from the data/ directory.
    /// In tests, use ReportingConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/indicators/indicator-definitions.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Self::from_json(&content).map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let file: DefinitionsFile = serde_json::from_str(content)?;
        Ok(Self {
            definitions: IndicatorDefinitions {
                db_version: file.db_version,
                indicators: file.indicators,
            },
            generator: file.generator,
        })
    }

    /// Config with hardcoded definitions for use in tests.
    pub fn default_test() -> Self {
        let child_count = IndicatorDefinition {
            key:            "total_children".into(),
            description:    "Children registered".into(),
            indicator_code: "1234".into(),
            query:          "select count(*) from ec_child where date(registered_at) = '%s'".into(),
            multi_result:   false,
            sub_key_column: None,
        };
        let child_by_gender = IndicatorDefinition {
            key:            "children_by_gender".into(),
            description:    "Children registered, by gender".into(),
            indicator_code: "1235".into(),
            query:          "select gender, count(*) from ec_child \
                             where date(registered_at) = :date group by gender"
                .into(),
            multi_result:   true,
            sub_key_column: Some("gender".into()),
        };
        Self {
            definitions: IndicatorDefinitions {
                db_version: 1,
                indicators: vec![child_count, child_by_gender],
            },
            generator: GeneratorConfig::default(),
        }
    }
}
