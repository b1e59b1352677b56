use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};
use ugv_cam_lib::Command;

/// Longest response excerpt quoted in a malformed-response error
const BODY_EXCERPT_LEN: usize = 120;

/// Synchronous request/response link to the vehicle.
///
/// Implementations send the command as is; callers validate required
/// fields beforehand.
pub trait CommandChannel: Send {
    fn send(&self, command: &Command) -> Result<Value>;
}

/// JSON POST to the vehicle's command endpoint, no retries
pub struct HttpCommandChannel {
    client: reqwest::blocking::Client,
    url: String,
    timeout: Duration,
}

impl HttpCommandChannel {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::from_reqwest(&url, timeout, e))?;

        Ok(Self {
            client,
            url,
            timeout,
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Self::new(config.command_url(), config.command_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn post(&self, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(&self.url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .map_err(|e| AgentError::from_reqwest(&self.url, self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let text = response
            .text()
            .map_err(|e| AgentError::from_reqwest(&self.url, self.timeout, e))?;

        serde_json::from_str(&text).map_err(|e| {
            let excerpt: String = text.chars().take(BODY_EXCERPT_LEN).collect();
            AgentError::MalformedResponse(format!("{} in {:?}", e, excerpt))
        })
    }
}

impl CommandChannel for HttpCommandChannel {
    fn send(&self, command: &Command) -> Result<Value> {
        let body = command.to_json();
        debug!("POST {} {}", self.url, body);

        match self.post(&body) {
            Ok(response) => {
                debug!("Response: {}", response);
                Ok(response)
            }
            Err(e) => {
                error!("Error sending {} to vehicle: {}", command.command_type, e);
                Err(e)
            }
        }
    }
}
