use thiserror::Error;

#[derive(Error, Debug)]
pub enum DineSafeError {
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Cannot cast column '{column}' at row {row} (value {value:?}): {reason}")]
    Parse {
        column: String,
        row: usize,
        value: Option<String>,
        reason: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DineSafeError {
    /// Error for a value that failed its declared cast.
    pub fn parse(column: &str, row: usize, value: Option<&str>, reason: impl Into<String>) -> Self {
        DineSafeError::Parse {
            column: column.to_string(),
            row,
            value: value.map(str::to_string),
            reason: reason.into(),
        }
    }

    /// True for errors that mean no snapshot exists yet and a refresh should run.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DineSafeError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, DineSafeError>;
