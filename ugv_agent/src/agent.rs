//! Agent fusing vehicle command responses with the latest camera frame.

use crate::command_channel::{CommandChannel, HttpCommandChannel};
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::frame_source::{FrameSource, FrameSourceStats};
use tracing::{debug, info, warn};
use ugv_cam_lib::{Command, Frame, Response, State};

pub struct Agent {
    channel: Box<dyn CommandChannel>,
    frames: FrameSource,
    config: AgentConfig,
    closed: bool,
}

impl Agent {
    pub fn new(vehicle_url: &str, camera_url: &str) -> Result<Self> {
        Self::from_config(AgentConfig::new(vehicle_url, camera_url))
    }

    /// HTTP command channel and MJPEG stream built from `config`
    pub fn from_config(config: AgentConfig) -> Result<Self> {
        config.validate()?;
        let channel = HttpCommandChannel::from_config(&config)?;
        let frames = FrameSource::http(&config)?;
        Self::from_parts(Box::new(channel), frames, config)
    }

    /// Start `frames`, wait for the camera and query the vehicle status.
    ///
    /// Neither a missing camera nor a failed status query is fatal; both are
    /// logged and the agent works with whatever is reachable.
    pub fn from_parts(
        channel: Box<dyn CommandChannel>,
        mut frames: FrameSource,
        config: AgentConfig,
    ) -> Result<Self> {
        frames.start()?;

        if frames.wait_for_connection(config.connect_wait()) {
            info!("Camera connected at {}", config.stream_url());
        } else {
            warn!("Could not establish connection to camera at {}", config.stream_url());
        }

        let agent = Self {
            channel,
            frames,
            config,
            closed: false,
        };

        match agent.channel.send(&Command::base_feedback()) {
            Ok(_) => info!("Connected to vehicle at {}", agent.config.command_url()),
            Err(e) => warn!(
                "Could not connect to vehicle at {}: {}",
                agent.config.command_url(),
                e
            ),
        }

        Ok(agent)
    }

    /// Send `command` and fuse the response with the latest frame.
    ///
    /// Commands missing required fields are rejected before anything is sent.
    pub fn step(&self, command: &Command) -> Result<State> {
        if self.closed {
            return Err(AgentError::Closed);
        }
        command.validate()?;

        let value = self.channel.send(command)?;
        let response = Response::from_json(&value)
            .map_err(|e| AgentError::MalformedResponse(format!("{}: {}", e, value)))?;
        debug!("{} -> {:?}", command.command_type, response);

        Ok(State::from_response(&response, self.current_image()))
    }

    /// Poll chassis feedback without issuing motion
    pub fn get_latest_state(&self) -> Result<State> {
        self.step(&Command::base_feedback())
    }

    /// Stop the vehicle and the camera worker.
    ///
    /// The frame source is stopped even when the stop command fails; that
    /// failure is returned afterwards. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let stopped = self.channel.send(&Command::stop()).map(|_| ());
        if let Err(e) = &stopped {
            warn!("Error stopping vehicle: {}", e);
        }

        self.frames.stop();
        info!("Agent closed");
        stopped
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn latest_frame(&self) -> Option<Frame> {
        self.frames.latest_frame()
    }

    pub fn is_camera_connected(&self) -> bool {
        self.frames.is_connected()
    }

    pub fn frame_stats(&self) -> FrameSourceStats {
        self.frames.stats()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn current_image(&self) -> Option<Vec<u8>> {
        let frame = self.frames.latest_frame()?;
        match frame.encode_jpeg(self.config.jpeg_quality) {
            Ok(jpeg) => Some(jpeg),
            Err(e) => {
                warn!("Failed to encode frame {}: {}", frame.frame_id, e);
                None
            }
        }
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}
