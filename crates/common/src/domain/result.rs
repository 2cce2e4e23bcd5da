use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid telemetry field: {0}")]
    InvalidTelemetryField(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Publish error: {0}")]
    PublishError(anyhow::Error),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}
