use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid bucket boundaries: {0}")]
    InvalidBucketBoundaries(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Instrument already registered: {0}")]
    DuplicateInstrument(String),

    #[error("Pipeline already shut down")]
    AlreadyShutDown,

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
