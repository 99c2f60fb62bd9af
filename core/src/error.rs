use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Table '{table}' has no column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("Table '{table}' row {row}: column '{column}' has unparseable date '{value}'")]
    InvalidDate {
        table: String,
        row: usize,
        column: String,
        value: String,
    },

    #[error("Table '{table}' row {row}: column '{column}' has non-numeric amount '{value}'")]
    InvalidAmount {
        table: String,
        row: usize,
        column: String,
        value: String,
    },

    #[error("Destination name '{name}' must be a non-reserved identifier of [A-Za-z0-9_]")]
    InvalidDestination { name: String },

    #[error("Source '{name}' not configured")]
    UnknownSource { name: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ForecastResult<T> = Result<T, ForecastError>;
