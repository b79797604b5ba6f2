use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomError {
    #[error("No elements found: {0}")]
    NoElementsFound(String),

    #[error("Handle is fixed: {0}")]
    HandleIsFixed(String),

    #[error("Operation failed in {context}: {message}")]
    OperationFailed { context: String, message: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout exceeded: {0}")]
    TimeoutExceeded(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Anyhow error: {0}")]
    AnyhowError(String),
}

pub type Result<T> = std::result::Result<T, DomError>;

// Convert anyhow::Error to DomError
impl From<anyhow::Error> for DomError {
    fn from(err: anyhow::Error) -> Self {
        DomError::AnyhowError(err.to_string())
    }
}

impl DomError {
    /// Wrap any displayable error as an operation failure with context
    pub fn operation<E: std::fmt::Display>(context: &str, err: E) -> Self {
        DomError::OperationFailed {
            context: context.to_string(),
            message: err.to_string(),
        }
    }

    /// Short tag used by the error handler when logging
    pub fn kind(&self) -> &'static str {
        match self {
            DomError::NoElementsFound(_) => "NoElementsFound",
            DomError::HandleIsFixed(_) => "HandleIsFixed",
            DomError::OperationFailed { .. } => "OperationFailed",
            DomError::NetworkError(_) => "NetworkError",
            DomError::TimeoutExceeded(_) => "TimeoutExceeded",
            DomError::InvalidSelector(_) => "InvalidSelector",
            DomError::SerializationError(_) => "SerializationError",
            DomError::AnyhowError(_) => "AnyhowError",
        }
    }
}
