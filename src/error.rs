use thiserror::Error;

/// Errors that cross a manager boundary. Sensor noise and buffer
/// flush failures are absorbed where they happen and never become one
/// of these.
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Session creation failed: {0}")]
    SessionCreate(String),

    #[error("Session completion failed: {0}")]
    Completion(String),

    #[error("Checkpoint storage error: {0}")]
    Storage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
