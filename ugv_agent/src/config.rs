use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

pub const DEFAULT_VEHICLE_URL: &str = "http://192.168.4.1";
pub const DEFAULT_CAMERA_URL: &str = "http://192.168.4.6";

/// Endpoints, timeouts and stream parsing limits for one agent.
/// Durations are stored in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub vehicle_url: String,
    pub camera_url: String,
    pub command_path: String,
    pub stream_path: String,
    pub command_timeout_ms: u64,
    pub stream_connect_timeout_ms: u64,
    pub connect_wait_ms: u64,
    pub stop_timeout_ms: u64,
    pub jpeg_quality: u8,
    pub chunk_size: usize,
    pub max_buffer_bytes: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            vehicle_url: DEFAULT_VEHICLE_URL.to_string(),
            camera_url: DEFAULT_CAMERA_URL.to_string(),
            command_path: "/js".to_string(),
            stream_path: "/stream".to_string(),
            command_timeout_ms: 2000,
            stream_connect_timeout_ms: 10_000,
            connect_wait_ms: 10_000,
            stop_timeout_ms: 5000,
            jpeg_quality: 90,
            chunk_size: 1024,
            max_buffer_bytes: 4 * 1024 * 1024,
        }
    }
}

impl AgentConfig {
    pub fn new(vehicle_url: impl Into<String>, camera_url: impl Into<String>) -> Self {
        Self {
            vehicle_url: vehicle_url.into(),
            camera_url: camera_url.into(),
            ..Self::default()
        }
    }

    /// Defaults overlaid with `UGV_URL`, `CAMERA_URL`, `COMMAND_TIMEOUT_MS`
    /// and `JPEG_QUALITY` from the environment
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("UGV_URL") {
            self.vehicle_url = url;
        }
        if let Some(url) = lookup("CAMERA_URL") {
            self.camera_url = url;
        }
        if let Some(timeout) = lookup("COMMAND_TIMEOUT_MS").and_then(|s| s.parse::<u64>().ok()) {
            self.command_timeout_ms = timeout;
        }
        if let Some(quality) = lookup("JPEG_QUALITY").and_then(|s| s.parse::<u64>().ok()) {
            self.jpeg_quality = quality.clamp(1, 100) as u8;
        }
        self
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AgentConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.vehicle_url.trim().is_empty() {
            return Err(AgentError::Config("Vehicle URL must not be empty".to_string()));
        }

        if self.camera_url.trim().is_empty() {
            return Err(AgentError::Config("Camera URL must not be empty".to_string()));
        }

        let timeouts = [
            ("command_timeout_ms", self.command_timeout_ms),
            ("stream_connect_timeout_ms", self.stream_connect_timeout_ms),
            ("stop_timeout_ms", self.stop_timeout_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(AgentError::Config(format!("{} must be greater than zero", name)));
            }
        }

        if self.chunk_size == 0 || self.max_buffer_bytes < self.chunk_size {
            return Err(AgentError::Config(format!(
                "Invalid stream buffering: chunk_size {} with max_buffer_bytes {}",
                self.chunk_size, self.max_buffer_bytes
            )));
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(AgentError::Config(format!(
                "JPEG quality ({}) must be within 1-100",
                self.jpeg_quality
            )));
        }

        Ok(())
    }

    pub fn command_url(&self) -> String {
        join_url(&self.vehicle_url, &self.command_path)
    }

    pub fn stream_url(&self) -> String {
        join_url(&self.camera_url, &self.stream_path)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn stream_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_connect_timeout_ms)
    }

    /// How long construction waits for the camera before going on without it
    pub fn connect_wait(&self) -> Duration {
        Duration::from_millis(self.connect_wait_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    if path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}
