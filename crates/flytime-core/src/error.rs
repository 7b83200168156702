use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlytimeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlytimeError {
    /// Short error code string shown next to user-facing failures.
    pub fn code(&self) -> &'static str {
        match self {
            FlytimeError::Config(_) => "CONFIG_ERROR",
            FlytimeError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, FlytimeError>;
