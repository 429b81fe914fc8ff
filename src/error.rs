use std::error::Error;
use std::fmt;
use std::time::Duration;

#[derive(Debug)]
pub enum RelayError {
    // Messages errors
    MessageParseError(String),

    // Pipeline errors
    PipelineClosed,

    // Moderation errors
    ModerationFailure(String),
    ModerationTimeout(Duration),
    MalformedVerdict(String),

    // Audit errors
    AuditError(String),

    // Configuration errors
    ConfigError(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MessageParseError(msg) => write!(f, "Message parse error: {}", msg),
            Self::PipelineClosed => write!(f, "Broadcast pipeline is no longer running"),
            Self::ModerationFailure(msg) => write!(f, "Moderation failure: {}", msg),
            Self::ModerationTimeout(limit) => {
                write!(f, "Moderation timed out after {} ms", limit.as_millis())
            }
            Self::MalformedVerdict(msg) => write!(f, "Malformed moderation verdict: {}", msg),
            Self::AuditError(msg) => write!(f, "Audit log error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for RelayError {}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::AuditError(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::MessageParseError(err.to_string())
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::ModerationFailure(format!("HTTP backend: {}", err))
    }
}

// Generic result type for the relay
pub type Result<T> = std::result::Result<T, RelayError>;
