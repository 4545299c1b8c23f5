use thiserror::Error;

/// Every failure aborts the whole request; the message is what gets reported.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Api(String),
    #[error("Failed to delete the monitor.")]
    DeleteFailed,
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;

impl MonitorError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        MonitorError::InvalidInput(msg.into())
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MonitorError::Api("Error: Request to the device timed out".to_string())
        } else {
            MonitorError::Api(err.to_string())
        }
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::Api(format!("JSON serialization/deserialization error: {err}"))
    }
}
