use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortfolioMcError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Data quality: {0}")]
    DataQuality(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Incomplete data: expected {expected} shard artifacts, found {found}")]
    IncompleteData { expected: usize, found: usize },

    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("I/O failure during {operation}: {reason}")]
    IoFailure { operation: String, reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PortfolioMcError {
    pub fn io(operation: impl Into<String>, reason: impl ToString) -> Self {
        PortfolioMcError::IoFailure {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for PortfolioMcError {
    fn from(e: serde_json::Error) -> Self {
        PortfolioMcError::SerializationError(e.to_string())
    }
}

impl From<csv::Error> for PortfolioMcError {
    fn from(e: csv::Error) -> Self {
        PortfolioMcError::SerializationError(e.to_string())
    }
}

impl From<std::io::Error> for PortfolioMcError {
    fn from(e: std::io::Error) -> Self {
        PortfolioMcError::io("filesystem", e)
    }
}
