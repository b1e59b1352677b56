//! Error types for the UGV agent

use std::time::Duration;
use ugv_cam_lib::MissingFields;

/// Result type alias
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Command rejected before transmission
    #[error("Validation failed: {0}")]
    Validation(#[from] MissingFields),

    /// Endpoint unreachable
    #[error("Connection to {url} failed: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Round trip exceeded its deadline
    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout {
        url: String,
        timeout: Duration,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status
    #[error("HTTP error from {url}: {status}")]
    Status { url: String, status: u16 },

    /// Response body is not the JSON the vehicle is expected to send
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Any other transport failure
    #[error("Transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Corrupt image data from the video stream
    #[error("Frame decode failed: {0}")]
    Decode(#[source] image::ImageError),

    /// JPEG encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Agent was already closed
    #[error("Agent is closed")]
    Closed,
}

impl AgentError {
    /// Classify a `reqwest` failure. Deadline checks come first since a
    /// connect timeout is also a connect error.
    pub fn from_reqwest(url: &str, timeout: Duration, error: reqwest::Error) -> Self {
        let url = url.to_string();

        if error.is_timeout() {
            Self::Timeout {
                url,
                timeout,
                source: error,
            }
        } else if error.is_connect() {
            Self::Connection { url, source: error }
        } else if let Some(status) = error.status() {
            Self::Status {
                url,
                status: status.as_u16(),
            }
        } else {
            Self::Transport { url, source: error }
        }
    }

    /// Transport failure family: the request did not produce a usable response
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::Timeout { .. }
                | Self::Status { .. }
                | Self::MalformedResponse(_)
                | Self::Transport { .. }
        )
    }
}

impl From<toml::de::Error> for AgentError {
    fn from(error: toml::de::Error) -> Self {
        Self::Config(error.to_string())
    }
}
