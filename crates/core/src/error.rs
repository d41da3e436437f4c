use thiserror::Error;

pub type EventRankResult<T> = Result<T, EventRankError>;

#[derive(Error, Debug)]
pub enum EventRankError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Repository unavailable: {0}")]
    Repository(String),

    #[error("Action queue rejected message: {0}")]
    QueueFull(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for EventRankError {
    fn from(e: config::ConfigError) -> Self {
        EventRankError::Config(e.to_string())
    }
}
