use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Indicator '{indicator_code}' is misconfigured: {reason}")]
    Configuration {
        indicator_code: String,
        reason: String,
    },

    #[error("Query for indicator '{indicator_code}' failed on {date}: {reason}")]
    QueryExecution {
        indicator_code: String,
        date: String,
        reason: String,
    },

    #[error("Cannot parse date '{input}': {source}")]
    DateParse {
        input: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Storage failure: {0}")]
    Storage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TallyError {
    /// Reclassify an error raised while persisting as a run-aborting storage failure.
    pub fn into_storage(self) -> Self {
        match self {
            TallyError::Storage(_) => self,
            other => TallyError::Storage(other.to_string()),
        }
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, TallyError::Storage(_))
    }
}

pub type TallyResult<T> = Result<T, TallyError>;
